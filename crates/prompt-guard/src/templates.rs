//! Task instructions for the three excuse prompts.
//!
//! All of them go through [`crate::preamble`], so the guard preamble is
//! identical at every call site.

use crate::intake::{DailyRequest, FixRequest, RateRequest, DEFAULT_CONTEXT};
use crate::preamble::{compose, compose_unwrapped};

const RATE_INSTRUCTIONS: &str = r#"You are a professional excuse evaluator with a PhD in Plausibility Studies.

Rate the excuse in the <user_excuse> block below.
{context_line}
Return ONLY a valid JSON object (no markdown, no explanation) with these exact fields:
{
  "grade": "A+", "A", "B", "C", "D", or "F",
  "score": number between 0-100,
  "verdict": "one sentence verdict (funny but constructive)",
  "tips": ["tip 1", "tip 2", "tip 3"],
  "believability": number between 0-100,
  "creativity": number between 0-100
}

Grading rubric:
- A+ (90-100): Masterpiece. Almost true-sounding. They'll never know.
- A (80-89): Excellent. High believability, creative, well-structured.
- B (65-79): Good attempt. Believable but a bit generic.
- C (50-64): Mediocre. Raises some eyebrows.
- D (30-49): Weak. Too obvious or too outrageous.
- F (0-29): Catastrophic fail. Just tell the truth instead.

Be witty in your verdict and tips. Return ONLY the JSON object."#;

const FIX_INSTRUCTIONS: &str = r#"You are a world-class excuse coach. A user got a "{grade}" grade for the excuse in the <user_excuse> block below (context: {context}).

Rewrite it to deserve an A or A+. Keep the same core reason but make it:
- More specific and believable (concrete details)
- Add ONE perfectly placed emotional hook
- Sound natural, not rehearsed
- Match the context ({context})

Reply ONLY with valid JSON (no markdown, no backticks):
{
  "fixed": "the improved excuse here",
  "grade": "A",
  "tip": "one sentence explaining what you changed and why it works better"
}"#;

const DAILY_INSTRUCTIONS: &str = "You are writing excuses that real humans actually use. \
Write in a casual, natural voice, like a real person talking, not an AI. \
Use contractions, slight imperfection, natural hesitation phrases (\"honestly\", \"I totally forgot\", \"it's been crazy\"). \
Context: excuse for {context}. The situation is: \"{scenario}\". \
Keep it 1-2 sentences max. Make it believable and relatable. \
Just write the excuse text directly, no preamble or quotation marks.";

/// Prompt for grading an excuse.
pub fn rate_prompt(req: &RateRequest) -> String {
    let context_line = match &req.context {
        Some(ctx) => format!("Context: {ctx}\n"),
        None => String::new(),
    };
    let instructions = RATE_INSTRUCTIONS.replace("{context_line}", &context_line);
    compose(&instructions, &req.excuse)
}

/// Prompt for rewriting an excuse into a better grade.
pub fn fix_prompt(req: &FixRequest) -> String {
    let context = req
        .context
        .as_ref()
        .map_or(DEFAULT_CONTEXT, |c| c.as_str());
    // Grade first: it comes from a fixed set and cannot contain "{context}".
    let instructions = FIX_INSTRUCTIONS
        .replace("{grade}", req.original_grade.as_str())
        .replace("{context}", context);
    compose(&instructions, &req.excuse)
}

/// Prompt for the excuse of the day. The only user field is the context
/// label, interpolated inline after screening.
pub fn daily_prompt(req: &DailyRequest) -> String {
    let instructions = DAILY_INSTRUCTIONS
        .replace("{scenario}", req.scenario.as_str())
        .replace("{context}", req.context.as_str());
    compose_unwrapped(&instructions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delimiter::{CLOSE_TAG, OPEN_TAG};
    use crate::intake::{ContextLabel, Grade, Scenario};
    use crate::preamble::SYSTEM_GUARD;
    use crate::sanitizer::sanitize;
    use serde_json::json;

    fn safe(text: &str) -> crate::sanitizer::SafeText {
        sanitize(text).into_safe_text().unwrap()
    }

    #[test]
    fn rate_prompt_wraps_excuse_after_instructions() {
        let req = RateRequest {
            excuse: safe("My alarm didn't go off"),
            context: Some(safe("work")),
        };
        let prompt = rate_prompt(&req);
        assert!(prompt.starts_with(SYSTEM_GUARD));
        assert!(prompt.contains("Context: work\n"));
        assert!(prompt.contains("Grading rubric:"));
        assert!(prompt.ends_with(&format!("{OPEN_TAG}\nMy alarm didn't go off\n{CLOSE_TAG}")));
        assert!(!prompt.contains("{context_line}"));
    }

    #[test]
    fn rate_prompt_without_context() {
        let req = RateRequest {
            excuse: safe("Traffic"),
            context: None,
        };
        assert!(!rate_prompt(&req).contains("Context:"));
    }

    #[test]
    fn fix_prompt_fills_grade_and_context() {
        let req = FixRequest::from_json(&json!({
            "excuse": "Dog ate it",
            "context": "school",
            "originalGrade": "D"
        }))
        .unwrap();
        let prompt = fix_prompt(&req);
        assert!(prompt.contains("got a \"D\" grade"));
        assert!(prompt.contains("(context: school)"));
        assert!(prompt.contains("Match the context (school)"));
        assert!(!prompt.contains("{grade}"));
        assert!(!prompt.contains("{context}"));
        assert!(prompt.ends_with(&format!("{OPEN_TAG}\nDog ate it\n{CLOSE_TAG}")));
    }

    #[test]
    fn fix_prompt_default_context_and_grade() {
        let req = FixRequest {
            excuse: safe("Dog ate it"),
            context: None,
            original_grade: Grade::default(),
        };
        let prompt = fix_prompt(&req);
        assert!(prompt.contains("got a \"C\" grade"));
        assert!(prompt.contains("(context: work)"));
    }

    #[test]
    fn daily_prompt_uses_label_and_scenario() {
        let req = DailyRequest {
            context: ContextLabel::from_raw(Some("family")),
            scenario: Scenario::SkippedGym,
        };
        let prompt = daily_prompt(&req);
        assert!(prompt.starts_with(SYSTEM_GUARD));
        assert!(prompt.contains("Context: excuse for family."));
        assert!(prompt.contains("The situation is: \"skipped gym\""));
        assert!(!prompt.contains(CLOSE_TAG));
    }

    #[test]
    fn daily_prompt_with_rejected_context_uses_default() {
        let req = DailyRequest {
            context: ContextLabel::from_raw(Some("jailbreak mode")),
            scenario: Scenario::LateToWork,
        };
        let prompt = daily_prompt(&req);
        assert!(prompt.contains("Context: excuse for work."));
        assert!(!prompt.to_lowercase().contains("jailbreak"));
    }

    #[test]
    fn same_preamble_everywhere() {
        let rate = rate_prompt(&RateRequest {
            excuse: safe("a"),
            context: None,
        });
        let fix = fix_prompt(&FixRequest {
            excuse: safe("a"),
            context: None,
            original_grade: Grade::B,
        });
        let daily = daily_prompt(&DailyRequest {
            context: ContextLabel::default(),
            scenario: Scenario::MissedACall,
        });
        for prompt in [rate, fix, daily] {
            assert!(prompt.starts_with(SYSTEM_GUARD));
        }
    }
}
