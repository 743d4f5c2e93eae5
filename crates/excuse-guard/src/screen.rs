//! Runs requests through the guard the way a route handler would, logging
//! and auditing each verdict.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use guard_audit::{AuditEntry, AuditEventType, AuditSink, AuditSource, VerdictRecord};
use prompt_guard::delimiter::has_markers;
use prompt_guard::{
    clean, daily_prompt, fix_prompt, parse_daily, parse_fix, parse_rating, rate_prompt, sanitize,
    sanitize_value, scanner, DailyExcuse, DailyRequest, FixRequest, FixResult, RateRequest,
    RatingResult, RejectReason, Rejection, ReplyError, SanitizeResult,
};

/// Which excuse task a request is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    Rate,
    Fix,
    Daily,
}

impl RequestKind {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Rate => "rate",
            Self::Fix => "fix",
            Self::Daily => "daily",
        }
    }
}

/// The result of screening one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outcome {
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<RejectReason>,
    /// Generic text to show the requester when rejected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

impl Outcome {
    fn accepted(prompt: String) -> Self {
        Self {
            accepted: true,
            reason: None,
            message: None,
            prompt: Some(prompt),
        }
    }

    fn rejected(rejection: &Rejection) -> Self {
        Self {
            accepted: false,
            reason: Some(rejection.reason),
            message: Some(rejection.user_message()),
            prompt: None,
        }
    }
}

/// A parsed model reply, or the canned answer that replaced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Reply {
    Rating(RatingResult),
    Fix(FixResult),
    Daily(DailyExcuse),
}

impl Reply {
    pub fn is_fallback(&self) -> bool {
        match self {
            Self::Rating(r) => r.fallback,
            Self::Fix(f) => f.fallback,
            Self::Daily(d) => d.fallback,
        }
    }
}

/// Guard front-end with an optional audit trail.
pub struct Screener {
    component: &'static str,
    audit: Option<AuditSink>,
}

impl Screener {
    pub fn new(component: &'static str, audit: Option<AuditSink>) -> Self {
        Self { component, audit }
    }

    /// Screen free text.
    pub async fn check(&self, text: &str) -> SanitizeResult {
        let result = sanitize(text);
        self.record_verdict(None, "text", &result).await;
        result
    }

    /// Strip echoed markers from model output, auditing when anything was
    /// removed.
    pub async fn clean(&self, output: &str) -> String {
        let cleaned = clean(output);
        if has_markers(output) {
            info!(
                before = output.len(),
                after = cleaned.len(),
                "stripped guard markers from model output"
            );
            self.record(AuditEntry::new(
                AuditEventType::OutputCleaned,
                self.source(None),
                serde_json::json!({
                    "chars_before": output.chars().count(),
                    "chars_after": cleaned.chars().count(),
                }),
            ))
            .await;
        }
        cleaned
    }

    /// Build the guarded prompt for a request body, or reject it.
    pub async fn screen(&self, request_id: &str, kind: RequestKind, body: &Value) -> Outcome {
        let composed = match kind {
            RequestKind::Rate => RateRequest::from_json(body).map(|req| rate_prompt(&req)),
            RequestKind::Fix => FixRequest::from_json(body).map(|req| fix_prompt(&req)),
            RequestKind::Daily => Ok(daily_prompt(&self.daily_request(request_id, body).await)),
        };

        match composed {
            Ok(prompt) => {
                debug!(request_id, kind = kind.as_str(), "prompt composed");
                self.record(AuditEntry::new(
                    AuditEventType::PromptComposed,
                    self.source(Some(request_id)),
                    serde_json::json!({
                        "kind": kind.as_str(),
                        "prompt_chars": prompt.chars().count(),
                    }),
                ))
                .await;
                Outcome::accepted(prompt)
            }
            Err(rejection) => {
                self.record_rejection(request_id, body, &rejection).await;
                Outcome::rejected(&rejection)
            }
        }
    }

    /// Parse the model's reply to a request. An unusable reply is replaced
    /// by the task's fallback; only a fix request can be refused, since its
    /// reply echoes the original excuse.
    pub async fn reply(
        &self,
        request_id: &str,
        kind: RequestKind,
        body: &Value,
        output: &str,
        date: NaiveDate,
    ) -> Result<Reply, Rejection> {
        let output = self.clean(output).await;

        let (reply, error) = match kind {
            RequestKind::Rate => match parse_rating(&output) {
                Ok(rating) => (Reply::Rating(rating), None),
                Err(err) => (Reply::Rating(RatingResult::fallback()), Some(err)),
            },
            RequestKind::Fix => {
                let req = match FixRequest::from_json(body) {
                    Ok(req) => req,
                    Err(rejection) => {
                        self.record_rejection(request_id, body, &rejection).await;
                        return Err(rejection);
                    }
                };
                match parse_fix(&output, &req.excuse) {
                    Ok(fix) => (Reply::Fix(fix), None),
                    Err(err) => (Reply::Fix(FixResult::fallback(&req.excuse)), Some(err)),
                }
            }
            RequestKind::Daily => {
                let req = self.daily_request(request_id, body).await;
                match parse_daily(&output, &req, date) {
                    Ok(daily) => (Reply::Daily(daily), None),
                    Err(err) => (Reply::Daily(DailyExcuse::fallback(&req, date)), Some(err)),
                }
            }
        };

        self.record_reply(request_id, kind, error.as_ref()).await;
        Ok(reply)
    }

    /// The daily generator substitutes the default context instead of
    /// refusing, but the refusal is still logged and audited.
    async fn daily_request(&self, request_id: &str, body: &Value) -> DailyRequest {
        let req = DailyRequest::from_json(body);
        if let Some(reason) = req.context.rejected {
            let result = sanitize_value(body.get("context"));
            warn!(request_id, %reason, "daily context refused; using default");
            self.record_verdict(Some(request_id), "context", &result)
                .await;
        }
        req
    }

    /// Re-screen the failing field to learn which rule fired; the rule name
    /// goes to logs and the audit trail only.
    async fn record_rejection(&self, request_id: &str, body: &Value, rejection: &Rejection) {
        let result = sanitize_value(body.get(rejection.field));
        self.record_verdict(Some(request_id), rejection.field, &result)
            .await;
    }

    async fn record_reply(&self, request_id: &str, kind: RequestKind, error: Option<&ReplyError>) {
        match error {
            Some(err) => warn!(
                request_id,
                kind = kind.as_str(),
                %err,
                "model reply unusable; using fallback"
            ),
            None => debug!(request_id, kind = kind.as_str(), "model reply parsed"),
        }
        self.record(AuditEntry::new(
            AuditEventType::ReplyHandled,
            self.source(Some(request_id)),
            serde_json::json!({
                "kind": kind.as_str(),
                "fallback": error.is_some(),
                "error": error.map(ToString::to_string),
            }),
        ))
        .await;
    }

    async fn record_verdict(&self, request_id: Option<&str>, field: &str, result: &SanitizeResult) {
        let (event_type, verdict) = match (&result.reason, &result.finding) {
            (None, _) => (AuditEventType::InputAccepted, VerdictRecord::accepted()),
            (Some(reason), Some(finding)) => {
                warn!(
                    request_id = request_id.unwrap_or("-"),
                    field,
                    rule = %finding.pattern_name,
                    category = %finding.category,
                    matches = scanner().scan(&result.text).len(),
                    "prompt injection pattern detected"
                );
                debug!(text = %result.text, "rejected text");
                (
                    AuditEventType::InputRejected,
                    VerdictRecord::rejected(reason.as_str())
                        .with_rule(&finding.pattern_name, finding.category.to_string()),
                )
            }
            (Some(reason), None) => {
                info!(request_id = request_id.unwrap_or("-"), field, %reason, "input refused");
                (
                    AuditEventType::InputRejected,
                    VerdictRecord::rejected(reason.as_str()),
                )
            }
        };

        let source = self.source(request_id).field(field);
        let details = serde_json::json!({ "chars": result.text.chars().count() });
        self.record(AuditEntry::new(event_type, source, details).with_verdict(verdict))
            .await;
    }

    fn source(&self, request_id: Option<&str>) -> AuditSource {
        let source = AuditSource::new(self.component);
        match request_id {
            Some(id) => source.request(id),
            None => source,
        }
    }

    async fn record(&self, entry: AuditEntry) {
        if let Some(audit) = &self.audit {
            audit.record(entry).await;
        }
    }
}
