use serde::{Deserialize, Serialize};

/// One line of the guard audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: uuid::Uuid,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub event_type: AuditEventType,
    pub source: AuditSource,
    pub details: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verdict: Option<VerdictRecord>,
}

impl AuditEntry {
    /// New entry stamped with a v4 id and the current UTC time.
    pub fn new(
        event_type: AuditEventType,
        source: AuditSource,
        details: serde_json::Value,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            timestamp: chrono::Utc::now(),
            event_type,
            source,
            details,
            verdict: None,
        }
    }

    pub fn with_verdict(mut self, verdict: VerdictRecord) -> Self {
        self.verdict = Some(verdict);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    ProcessStarted,
    ProcessStopped,
    InputAccepted,
    InputRejected,
    PromptComposed,
    OutputCleaned,
    /// A model reply was parsed, or replaced by its fallback.
    ReplyHandled,
}

/// Where an event came from: the component plus, for request-scoped
/// events, which request and which field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditSource {
    pub component: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl AuditSource {
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            request_id: None,
            field: None,
        }
    }

    pub fn request(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }
}

/// A screening verdict as recorded for operators.
///
/// Unlike what end users see, this carries the rule that fired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerdictRecord {
    pub safe: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl VerdictRecord {
    pub fn accepted() -> Self {
        Self {
            safe: true,
            reason: None,
            rule: None,
            category: None,
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            safe: false,
            reason: Some(reason.into()),
            rule: None,
            category: None,
        }
    }

    pub fn with_rule(mut self, rule: impl Into<String>, category: impl Into<String>) -> Self {
        self.rule = Some(rule.into());
        self.category = Some(category.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rejected_entry_shape() {
        let entry = AuditEntry::new(
            AuditEventType::InputRejected,
            AuditSource::new("batch").request("line-3").field("excuse"),
            json!({ "kind": "rate" }),
        )
        .with_verdict(
            VerdictRecord::rejected("Detected prompt injection attempt")
                .with_rule("ignore_previous", "instruction_override"),
        );

        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["event_type"], "input_rejected");
        assert_eq!(value["source"]["component"], "batch");
        assert_eq!(value["source"]["request_id"], "line-3");
        assert_eq!(value["source"]["field"], "excuse");
        assert_eq!(value["verdict"]["safe"], false);
        assert_eq!(value["verdict"]["rule"], "ignore_previous");
    }

    #[test]
    fn optional_fields_are_omitted() {
        let entry = AuditEntry::new(
            AuditEventType::ProcessStarted,
            AuditSource::new("excuse-guard"),
            json!({}),
        );
        let value = serde_json::to_value(&entry).unwrap();
        assert!(value.get("verdict").is_none());
        assert!(value["source"].get("request_id").is_none());
    }

    #[test]
    fn reply_event_name() {
        let value = serde_json::to_value(AuditEventType::ReplyHandled).unwrap();
        assert_eq!(value, "reply_handled");
    }

    #[test]
    fn entry_parses_back() {
        let entry = AuditEntry::new(
            AuditEventType::InputAccepted,
            AuditSource::new("check"),
            json!({ "chars": 12 }),
        )
        .with_verdict(VerdictRecord::accepted());
        let line = serde_json::to_string(&entry).unwrap();
        let parsed: AuditEntry = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed.id, entry.id);
        assert_eq!(parsed.event_type, AuditEventType::InputAccepted);
        assert_eq!(parsed.verdict, Some(VerdictRecord::accepted()));
    }
}
