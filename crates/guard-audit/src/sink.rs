use std::path::Path;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::entry::AuditEntry;
use crate::writer::{AuditWriteError, AuditWriter};

const CHANNEL_CAPACITY: usize = 256;

/// Flush after this many buffered entries even if the timer has not fired.
const FLUSH_BATCH: usize = 64;

const FLUSH_EVERY: Duration = Duration::from_millis(500);

/// Cloneable producer side of the audit trail.
///
/// Entries are handed to a background task that owns the [`AuditWriter`].
/// When every clone is dropped the task flushes and exits; its join handle
/// resolves to the number of entries written.
#[derive(Clone)]
pub struct AuditSink {
    tx: mpsc::Sender<AuditEntry>,
}

impl AuditSink {
    /// Open the log at `path` and spawn the writer task.
    pub async fn start(
        path: impl AsRef<Path>,
    ) -> Result<(Self, JoinHandle<u64>), AuditWriteError> {
        let writer = AuditWriter::open(path).await?;
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let handle = tokio::spawn(drain(writer, rx));
        Ok((Self { tx }, handle))
    }

    /// Queue an entry, waiting for channel capacity if needed. If the writer
    /// task is gone the entry is dropped with a warning.
    pub async fn record(&self, entry: AuditEntry) {
        if let Err(err) = self.tx.send(entry).await {
            tracing::warn!(
                event_type = ?err.0.event_type,
                "audit writer stopped; entry dropped"
            );
        }
    }
}

async fn drain(mut writer: AuditWriter, mut rx: mpsc::Receiver<AuditEntry>) -> u64 {
    let mut ticker = tokio::time::interval(FLUSH_EVERY);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut unflushed = 0usize;

    loop {
        tokio::select! {
            next = rx.recv() => {
                let Some(entry) = next else { break };
                match writer.append(&entry).await {
                    Ok(()) => unflushed += 1,
                    Err(err) => tracing::error!(
                        %err,
                        event_type = ?entry.event_type,
                        "failed to append audit entry"
                    ),
                }
                if unflushed >= FLUSH_BATCH {
                    flush(&mut writer, &mut unflushed).await;
                }
            }
            _ = ticker.tick(), if unflushed > 0 => {
                flush(&mut writer, &mut unflushed).await;
            }
        }
    }

    if unflushed > 0 {
        flush(&mut writer, &mut unflushed).await;
    }
    tracing::debug!(written = writer.written(), "audit writer finished");
    writer.written()
}

async fn flush(writer: &mut AuditWriter, unflushed: &mut usize) {
    match writer.flush().await {
        Ok(()) => *unflushed = 0,
        Err(err) => tracing::error!(%err, pending = *unflushed, "audit flush failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{AuditEventType, AuditSource};

    fn entry(event: AuditEventType) -> AuditEntry {
        AuditEntry::new(event, AuditSource::new("sink-test"), serde_json::json!({}))
    }

    #[tokio::test]
    async fn drains_everything_on_close() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");

        let (sink, handle) = AuditSink::start(&path).await.unwrap();
        let clone = sink.clone();
        sink.record(entry(AuditEventType::ProcessStarted)).await;
        clone.record(entry(AuditEventType::InputRejected)).await;
        sink.record(entry(AuditEventType::ProcessStopped)).await;
        drop(sink);
        drop(clone);

        assert_eq!(handle.await.unwrap(), 3);

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        let events: Vec<AuditEventType> = contents
            .lines()
            .map(|l| serde_json::from_str::<AuditEntry>(l).unwrap().event_type)
            .collect();
        assert_eq!(
            events,
            vec![
                AuditEventType::ProcessStarted,
                AuditEventType::InputRejected,
                AuditEventType::ProcessStopped,
            ]
        );
    }

    #[tokio::test]
    async fn batches_larger_than_flush_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");

        let (sink, handle) = AuditSink::start(&path).await.unwrap();
        for _ in 0..(FLUSH_BATCH * 2 + 5) {
            sink.record(entry(AuditEventType::InputAccepted)).await;
        }
        drop(sink);

        assert_eq!(handle.await.unwrap(), (FLUSH_BATCH * 2 + 5) as u64);
        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(contents.lines().count(), FLUSH_BATCH * 2 + 5);
    }
}
