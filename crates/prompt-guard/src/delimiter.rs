//! Delimiter wrapping for prompt input and marker stripping for model output.

use std::sync::LazyLock;

use regex::Regex;

pub const OPEN_TAG: &str = "<user_excuse>";
pub const CLOSE_TAG: &str = "</user_excuse>";

/// Open and close forms of the content delimiter plus the stray
/// `<system>` role markers.
static MARKER_TOKENS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)</?(?:user_excuse|system)>").expect("marker regex must compile")
});

/// Enclose already-screened text in the content delimiter.
///
/// Performs no validation and no truncation. Wrapping twice nests the
/// delimiters.
pub fn wrap(text: &str) -> String {
    format!("{OPEN_TAG}\n{text}\n{CLOSE_TAG}")
}

/// Strip delimiter and role-marker tokens a model echoed back, then trim.
///
/// Removal repeats until no marker is left, so a marker spliced together by
/// an earlier removal (`<user<system>_excuse>`) is removed as well. That makes
/// `clean(clean(x)) == clean(x)`. All other text, including unrelated
/// angle-bracket content, is left untouched.
pub fn clean(text: &str) -> String {
    let mut out = text.to_string();
    while MARKER_TOKENS.is_match(&out) {
        out = MARKER_TOKENS.replace_all(&out, "").into_owned();
    }
    out.trim().to_string()
}

/// True when [`clean`] would strip at least one marker from `text`.
pub fn has_markers(text: &str) -> bool {
    MARKER_TOKENS.is_match(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_layout() {
        assert_eq!(
            wrap("I was late"),
            "<user_excuse>\nI was late\n</user_excuse>"
        );
    }

    #[test]
    fn wrap_contains_text_and_both_markers() {
        let text = "The train broke down between stations";
        let wrapped = wrap(text);
        assert!(wrapped.contains(text));
        assert!(wrapped.starts_with(OPEN_TAG));
        assert!(wrapped.ends_with(CLOSE_TAG));
    }

    #[test]
    fn wrap_nests() {
        let twice = wrap(&wrap("x"));
        assert_eq!(twice.matches(OPEN_TAG).count(), 2);
        assert_eq!(twice.matches(CLOSE_TAG).count(), 2);
    }

    #[test]
    fn clean_echoed_delimiters() {
        assert_eq!(clean("<user_excuse>\nI was late\n</user_excuse>"), "I was late");
    }

    #[test]
    fn clean_is_case_insensitive() {
        assert_eq!(
            clean("<USER_EXCUSE>Sorry</User_Excuse> <System>ok</SYSTEM>"),
            "Sorry ok"
        );
    }

    #[test]
    fn clean_inverts_wrap() {
        for s in ["My alarm didn't go off", "a < b > c", "  spaced  "] {
            assert_eq!(clean(&wrap(s)), s.trim());
        }
    }

    #[test]
    fn clean_leaves_other_markup_alone() {
        let text = "Use <b>bold</b> and a <system-note> plus <system > text";
        assert_eq!(clean(text), text);
    }

    #[test]
    fn clean_removes_spliced_markers() {
        assert_eq!(clean("<user<system>_excuse>hello"), "hello");
        assert_eq!(clean("<<system>system>x</sys</system>tem>"), "x");
    }

    #[test]
    fn clean_is_idempotent() {
        for x in [
            "",
            "   ",
            "plain",
            " <system> padded </system> ",
            "<user<system>_excuse> nested </user_excuse>",
            "\n<user_excuse>\n\n  text  \n</user_excuse>\n",
        ] {
            let once = clean(x);
            assert_eq!(clean(&once), once, "not idempotent for {x:?}");
        }
    }

    #[test]
    fn marker_detection() {
        assert!(has_markers("x </USER_EXCUSE>"));
        assert!(!has_markers("nothing here"));
    }
}
