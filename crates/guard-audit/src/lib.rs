//! JSON-lines audit trail for prompt guard verdicts.
//!
//! Each screened field, composed prompt and cleaned model answer can be
//! recorded as one [`AuditEntry`]. Unlike the messages shown to end users,
//! entries name the rule that fired, so operators can tune the rule table.
//!
//! ```rust,no_run
//! use guard_audit::{AuditEntry, AuditEventType, AuditSink, AuditSource, VerdictRecord};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let (sink, writer_task) = AuditSink::start("guard-audit.jsonl").await?;
//!
//! sink.record(
//!     AuditEntry::new(
//!         AuditEventType::InputRejected,
//!         AuditSource::new("rate").field("excuse"),
//!         serde_json::json!({ "chars": 54 }),
//!     )
//!     .with_verdict(
//!         VerdictRecord::rejected("Detected prompt injection attempt")
//!             .with_rule("ignore_previous", "instruction_override"),
//!     ),
//! )
//! .await;
//!
//! drop(sink);
//! let written = writer_task.await?;
//! # let _ = written;
//! # Ok(())
//! # }
//! ```

pub mod entry;
pub mod sink;
pub mod writer;

pub use entry::{AuditEntry, AuditEventType, AuditSource, VerdictRecord};
pub use sink::AuditSink;
pub use writer::{AuditWriteError, AuditWriter};
