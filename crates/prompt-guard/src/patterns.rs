//! Injection rule table.
//!
//! An ordered, immutable list of case-insensitive regexes. Each rule names the
//! phrase family it catches and the [`PatternCategory`] it belongs to. Order
//! only matters for short-circuiting: the first matching rule is the one a
//! verdict reports, but any single match rejects the input.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Category
// ---------------------------------------------------------------------------

/// The phrase family an [`InjectionPattern`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternCategory {
    /// "ignore previous instructions", "new instructions:".
    InstructionOverride,
    /// "you are now ...", "act as a different ...".
    RoleHijack,
    /// Text pretending to be a system message.
    FakeSystemMarker,
    /// "disregard your ...", "do not follow ...".
    ComplianceSuppression,
    /// Well-known jailbreak vocabulary.
    JailbreakVocabulary,
    /// Requests to print or reveal the hidden prompt.
    PromptExtraction,
    /// Privilege-escalation vocabulary.
    PrivilegeEscalation,
}

impl fmt::Display for PatternCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::InstructionOverride => "instruction_override",
            Self::RoleHijack => "role_hijack",
            Self::FakeSystemMarker => "fake_system_marker",
            Self::ComplianceSuppression => "compliance_suppression",
            Self::JailbreakVocabulary => "jailbreak_vocabulary",
            Self::PromptExtraction => "prompt_extraction",
            Self::PrivilegeEscalation => "privilege_escalation",
        };
        f.write_str(label)
    }
}

// ---------------------------------------------------------------------------
// Rule definition
// ---------------------------------------------------------------------------

/// A single detection rule.
#[derive(Debug)]
pub struct InjectionPattern {
    /// Stable snake_case identifier, used in logs and audit records.
    pub name: &'static str,
    pub category: PatternCategory,
    /// Regex source, compiled once by [`crate::scanner::Scanner`].
    pub pattern: &'static str,
}

// ---------------------------------------------------------------------------
// Rule table
// ---------------------------------------------------------------------------

/// Built-in rules, in evaluation order. Rules of one category are not
/// necessarily adjacent.
pub static PATTERNS: &[InjectionPattern] = &[
    InjectionPattern {
        name: "ignore_previous",
        category: PatternCategory::InstructionOverride,
        pattern: r"(?i)ignore\s+(all\s+)?(previous|prior|above)\s+instructions?",
    },
    InjectionPattern {
        name: "forget_instructions",
        category: PatternCategory::InstructionOverride,
        pattern: r"(?i)forget\s+(all\s+)?(previous|prior|above|your)\s+instructions?",
    },
    InjectionPattern {
        name: "you_are_now",
        category: PatternCategory::RoleHijack,
        pattern: r"(?i)you\s+are\s+now\s+",
    },
    InjectionPattern {
        name: "new_instructions",
        category: PatternCategory::InstructionOverride,
        pattern: r"(?i)new\s+instructions?:",
    },
    InjectionPattern {
        name: "system_colon",
        category: PatternCategory::FakeSystemMarker,
        pattern: r"(?i)system\s*:",
    },
    InjectionPattern {
        name: "system_bracket",
        category: PatternCategory::FakeSystemMarker,
        pattern: r"(?i)\[system\]",
    },
    InjectionPattern {
        name: "system_tag",
        category: PatternCategory::FakeSystemMarker,
        pattern: r"(?i)<\s*system\s*>",
    },
    InjectionPattern {
        name: "act_as",
        category: PatternCategory::RoleHijack,
        pattern: r"(?i)act\s+as\s+(a\s+)?(different|new|another|unrestricted)",
    },
    InjectionPattern {
        name: "disregard",
        category: PatternCategory::ComplianceSuppression,
        pattern: r"(?i)disregard\s+(your|all)\s+",
    },
    InjectionPattern {
        name: "override",
        category: PatternCategory::ComplianceSuppression,
        pattern: r"(?i)override\s+(your|all)\s+",
    },
    InjectionPattern {
        name: "do_not_follow",
        category: PatternCategory::ComplianceSuppression,
        pattern: r"(?i)do\s+not\s+(follow|obey)\s+",
    },
    InjectionPattern {
        name: "jailbreak",
        category: PatternCategory::JailbreakVocabulary,
        pattern: r"(?i)jailbreak",
    },
    InjectionPattern {
        name: "dan_mode",
        category: PatternCategory::JailbreakVocabulary,
        pattern: r"(?i)dan\s+mode",
    },
    InjectionPattern {
        name: "prompt_injection",
        category: PatternCategory::JailbreakVocabulary,
        pattern: r"(?i)prompt\s+injection",
    },
    InjectionPattern {
        name: "reveal_prompt",
        category: PatternCategory::PromptExtraction,
        pattern: r"(?i)reveal\s+(your\s+)?(system\s+)?prompt",
    },
    InjectionPattern {
        name: "print_prompt",
        category: PatternCategory::PromptExtraction,
        pattern: r"(?i)print\s+(your\s+)?(full\s+)?(system\s+)?prompt",
    },
    InjectionPattern {
        name: "ignore_the_above",
        category: PatternCategory::InstructionOverride,
        pattern: r"(?i)ignore\s+the\s+above",
    },
    InjectionPattern {
        name: "sudo",
        category: PatternCategory::PrivilegeEscalation,
        pattern: r"(?i)(?-u:\b)sudo(?-u:\b)",
    },
];
