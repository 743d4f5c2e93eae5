//! Input screening: trim, truncate, then match against the rule table.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::scanner::{scanner, Finding};

/// Inputs are cut to this many characters before any rule is evaluated.
pub const MAX_INPUT_CHARS: usize = 500;

// ---------------------------------------------------------------------------
// Verdict
// ---------------------------------------------------------------------------

/// Why an input was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RejectReason {
    #[serde(rename = "Empty input")]
    EmptyInput,
    #[serde(rename = "Detected prompt injection attempt")]
    InjectionDetected,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EmptyInput => "Empty input",
            Self::InjectionDetected => "Detected prompt injection attempt",
        }
    }

    /// Message suitable for showing to the person who submitted the text.
    ///
    /// Never names the rule that fired.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::EmptyInput => "Please enter an excuse first.",
            Self::InjectionDetected => {
                "That excuse couldn't be processed. Please rephrase it and try again."
            }
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The outcome of [`sanitize`].
///
/// `text` always holds the trimmed and truncated input, whatever the verdict,
/// so callers can log what was refused. It must not be forwarded into a
/// prompt unless `safe` is true; [`into_safe_text`](Self::into_safe_text)
/// enforces that.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SanitizeResult {
    pub safe: bool,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<RejectReason>,
    /// The rule that fired. Internal only: kept out of serialized output so it
    /// never reaches an end user.
    #[serde(skip)]
    pub finding: Option<Finding>,
}

impl SanitizeResult {
    fn accepted(text: String) -> Self {
        Self {
            safe: true,
            text,
            reason: None,
            finding: None,
        }
    }

    fn empty() -> Self {
        Self {
            safe: false,
            text: String::new(),
            reason: Some(RejectReason::EmptyInput),
            finding: None,
        }
    }

    fn injection(text: String, finding: Finding) -> Self {
        Self {
            safe: false,
            text,
            reason: Some(RejectReason::InjectionDetected),
            finding: Some(finding),
        }
    }

    pub fn is_safe(&self) -> bool {
        self.safe
    }

    /// Consume the result, yielding text that may be interpolated into a
    /// prompt, or the reason it may not.
    pub fn into_safe_text(self) -> Result<SafeText, RejectReason> {
        if self.safe {
            Ok(SafeText(self.text))
        } else {
            Err(self.reason.unwrap_or(RejectReason::EmptyInput))
        }
    }
}

// ---------------------------------------------------------------------------
// SafeText
// ---------------------------------------------------------------------------

/// Text that passed [`sanitize`]. Only obtainable through
/// [`SanitizeResult::into_safe_text`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SafeText(String);

impl SafeText {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// A prefix of at most `max_chars` characters, screened again. Cutting
    /// can create a match the full text did not have: "sudoku" cut after
    /// four characters is "sudo".
    pub fn truncated(&self, max_chars: usize) -> Result<SafeText, RejectReason> {
        sanitize(truncate_chars(&self.0, max_chars)).into_safe_text()
    }
}

impl AsRef<str> for SafeText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SafeText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Screening
// ---------------------------------------------------------------------------

/// Screen untrusted text.
///
/// Never panics. Steps run in a fixed order: absence check, trim, emptiness
/// check, truncation to [`MAX_INPUT_CHARS`], then rule matching on the
/// truncated text with first-match short-circuit.
pub fn sanitize<'a>(raw: impl Into<Option<&'a str>>) -> SanitizeResult {
    let Some(raw) = raw.into() else {
        return SanitizeResult::empty();
    };

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return SanitizeResult::empty();
    }

    let text = truncate_chars(trimmed, MAX_INPUT_CHARS).to_string();

    match scanner().first_match(&text) {
        Some(finding) => SanitizeResult::injection(text, finding),
        None => SanitizeResult::accepted(text),
    }
}

/// Screen a field taken from an untrusted JSON body.
///
/// Only a JSON string is screened; a missing field, `null`, numbers, booleans,
/// arrays and objects are all treated as empty input rather than coerced.
pub fn sanitize_value(raw: Option<&serde_json::Value>) -> SanitizeResult {
    match raw {
        Some(serde_json::Value::String(s)) => sanitize(s.as_str()),
        _ => SanitizeResult::empty(),
    }
}

/// Longest prefix of `s` holding at most `max_chars` characters.
pub(crate) fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
