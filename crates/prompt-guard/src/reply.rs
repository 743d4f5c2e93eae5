//! Model replies for the three excuse tasks.
//!
//! A reply is untrusted text as well. Every parser runs it through [`clean`]
//! first, and each reply type has a fixed fallback so a caller always has an
//! answer to show when the model's reply cannot be used.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::delimiter::clean;
use crate::intake::{DailyRequest, Grade, Scenario};
use crate::sanitizer::SafeText;

/// Markdown code fences, with or without a `json` language tag.
static CODE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)```(?:json)?\s*").expect("fence regex must compile"));

/// Why a model reply was not usable.
#[derive(Debug, thiserror::Error)]
pub enum ReplyError {
    #[error("reply is empty")]
    Empty,

    #[error("no JSON object in reply")]
    NoJson,

    #[error("malformed reply JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("reply has no usable `{0}`")]
    Missing(&'static str),

    #[error("unknown grade {0:?}")]
    UnknownGrade(String),

    #[error("`{0}` is outside 0-100")]
    OutOfRange(&'static str),
}

fn is_false(value: &bool) -> bool {
    !*value
}

// ---------------------------------------------------------------------------
// Rating
// ---------------------------------------------------------------------------

/// A graded excuse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RatingResult {
    pub grade: Grade,
    pub score: u8,
    pub verdict: String,
    pub tips: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub believability: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creativity: Option<u8>,
    /// Set when this is the canned rating rather than the model's.
    #[serde(skip_serializing_if = "is_false")]
    pub fallback: bool,
}

impl RatingResult {
    pub fn fallback() -> Self {
        Self {
            grade: Grade::B,
            score: 72,
            verdict: "A solid attempt: believable enough to buy some time, but it won't fool a seasoned excuse-detector.".to_string(),
            tips: vec![
                "Add a specific time and location to make it more verifiable.".to_string(),
                "Mention a third-party witness or evidence to boost credibility.".to_string(),
                "Practice delivering it with just the right amount of regret.".to_string(),
            ],
            believability: Some(68),
            creativity: Some(75),
            fallback: true,
        }
    }
}

#[derive(Deserialize)]
struct RawRating {
    grade: Option<String>,
    score: Option<f64>,
    verdict: Option<String>,
    tips: Option<Vec<String>>,
    believability: Option<f64>,
    creativity: Option<f64>,
}

/// Parse a rating reply.
///
/// Fences are stripped and the outermost `{...}` is taken, so prose around
/// the object is tolerated. `grade`, `score`, a non-blank `verdict` and
/// `tips` are required; `believability` and `creativity` are optional.
pub fn parse_rating(raw: &str) -> Result<RatingResult, ReplyError> {
    let reply: RawRating = serde_json::from_str(&json_object(raw)?)?;

    let grade = reply.grade.ok_or(ReplyError::Missing("grade"))?;
    let grade = Grade::parse(&grade).ok_or(ReplyError::UnknownGrade(grade))?;
    let score = reply.score.ok_or(ReplyError::Missing("score"))?;
    let verdict = non_blank(reply.verdict).ok_or(ReplyError::Missing("verdict"))?;
    let tips = reply.tips.ok_or(ReplyError::Missing("tips"))?;

    Ok(RatingResult {
        grade,
        score: percent(score, "score")?,
        verdict,
        tips,
        believability: reply
            .believability
            .map(|v| percent(v, "believability"))
            .transpose()?,
        creativity: reply
            .creativity
            .map(|v| percent(v, "creativity"))
            .transpose()?,
        fallback: false,
    })
}

// ---------------------------------------------------------------------------
// Fix
// ---------------------------------------------------------------------------

const FALLBACK_FIX: &str = "My therapist advised me to be transparent about my limitations, \
and right now my limitation is being physically incapable of arriving on time due to an \
anxiety spiral triggered by an overdue bill notification. I've already scheduled an appointment.";

const FALLBACK_FIX_TIP: &str =
    "Added emotional depth and a resolution signal; shows self-awareness.";

/// A rewritten excuse next to the screened original.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FixResult {
    pub original: String,
    pub fixed: String,
    pub grade: Grade,
    pub tip: String,
    #[serde(skip_serializing_if = "is_false")]
    pub fallback: bool,
}

impl FixResult {
    pub fn fallback(original: &SafeText) -> Self {
        Self {
            original: original.as_str().to_string(),
            fixed: FALLBACK_FIX.to_string(),
            grade: Grade::A,
            tip: FALLBACK_FIX_TIP.to_string(),
            fallback: true,
        }
    }
}

#[derive(Deserialize)]
struct RawFix {
    fixed: Option<String>,
    grade: Option<String>,
    tip: Option<String>,
}

/// Parse a rewrite reply. Only a non-blank `fixed` is required; a missing
/// or unknown `grade` becomes `A` and a missing `tip` is empty.
pub fn parse_fix(raw: &str, original: &SafeText) -> Result<FixResult, ReplyError> {
    let reply: RawFix = serde_json::from_str(&json_object(raw)?)?;
    let fixed = non_blank(reply.fixed).ok_or(ReplyError::Missing("fixed"))?;

    Ok(FixResult {
        original: original.as_str().to_string(),
        fixed,
        grade: reply.grade.as_deref().and_then(Grade::parse).unwrap_or(Grade::A),
        tip: reply.tip.unwrap_or_default(),
        fallback: false,
    })
}

// ---------------------------------------------------------------------------
// Daily
// ---------------------------------------------------------------------------

/// Canned excuse for each daily scenario.
pub fn fallback_excuse(scenario: Scenario) -> &'static str {
    match scenario {
        Scenario::LateToWork => "Honestly, my alarm went off but I was so deep in this weird dream I just... couldn't. It's been a crazy week.",
        Scenario::SkippedGym => "I totally meant to go, but then I remembered I left my water bottle at home and it just kind of spiraled from there.",
        Scenario::MissedACall => "Ugh, I had my phone on silent and didn't notice until like an hour later. Sorry, it's been one of those days.",
        Scenario::ForgotBirthday => "I honestly thought it was next week. I've had so much going on I've completely lost track of what day it is.",
        Scenario::LateToMeeting => "I was literally on my way out the door and my neighbor stopped me, you know how that goes. I couldn't just walk away.",
    }
}

/// The excuse of the day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyExcuse {
    pub excuse: String,
    pub scenario: Scenario,
    pub date: NaiveDate,
    pub context: String,
    #[serde(skip_serializing_if = "is_false")]
    pub fallback: bool,
}

impl DailyExcuse {
    pub fn fallback(req: &DailyRequest, date: NaiveDate) -> Self {
        Self {
            excuse: fallback_excuse(req.scenario).to_string(),
            scenario: req.scenario,
            date,
            context: req.context.as_str().to_string(),
            fallback: true,
        }
    }
}

/// The daily reply is plain text; it only has to be non-empty once cleaned.
pub fn parse_daily(raw: &str, req: &DailyRequest, date: NaiveDate) -> Result<DailyExcuse, ReplyError> {
    let excuse = clean(raw);
    if excuse.is_empty() {
        return Err(ReplyError::Empty);
    }
    Ok(DailyExcuse {
        excuse,
        scenario: req.scenario,
        date,
        context: req.context.as_str().to_string(),
        fallback: false,
    })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Clean the reply, drop code fences and cut out the outermost object.
fn json_object(raw: &str) -> Result<String, ReplyError> {
    let cleaned = clean(raw);
    let unfenced = CODE_FENCE.replace_all(&cleaned, "");
    let unfenced = unfenced.trim();
    if unfenced.is_empty() {
        return Err(ReplyError::Empty);
    }
    match (unfenced.find('{'), unfenced.rfind('}')) {
        (Some(start), Some(end)) if start < end => Ok(unfenced[start..=end].to_string()),
        _ => Err(ReplyError::NoJson),
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn percent(value: f64, field: &'static str) -> Result<u8, ReplyError> {
    if (0.0..=100.0).contains(&value) {
        Ok(value.round() as u8)
    } else {
        Err(ReplyError::OutOfRange(field))
    }
}
