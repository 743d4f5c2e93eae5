//! Screening of a JSON-lines request file.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use prompt_guard::RejectReason;

use crate::screen::{Outcome, RequestKind, Screener};

/// One output line.
#[derive(Debug, Serialize)]
pub struct BatchResult {
    /// 1-based line number in the input file.
    pub line: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<RequestKind>,
    #[serde(flatten)]
    pub outcome: Outcome,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub accepted: usize,
    pub rejected: usize,
}

pub async fn run_file(screener: &Screener, path: &Path) -> Result<BatchSummary> {
    let file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("failed to open batch file {}", path.display()))?;
    let summary = run(screener, BufReader::new(file), |result| {
        let line = serde_json::to_string(&result)?;
        println!("{line}");
        Ok(())
    })
    .await?;
    info!(
        file = %path.display(),
        accepted = summary.accepted,
        rejected = summary.rejected,
        "batch finished"
    );
    Ok(summary)
}

/// Screen every non-blank line of `input`, handing each result to `emit`.
pub async fn run<R, F>(screener: &Screener, input: R, mut emit: F) -> Result<BatchSummary>
where
    R: AsyncBufRead + Unpin,
    F: FnMut(BatchResult) -> Result<()>,
{
    let mut lines = input.lines();
    let mut summary = BatchSummary::default();
    let mut number = 0usize;

    while let Some(raw) = lines.next_line().await.context("failed to read batch input")? {
        number += 1;
        if raw.trim().is_empty() {
            continue;
        }

        let result = screen_line(screener, number, &raw).await;
        if result.outcome.accepted {
            summary.accepted += 1;
        } else {
            summary.rejected += 1;
        }
        emit(result)?;
    }

    Ok(summary)
}

async fn screen_line(screener: &Screener, number: usize, raw: &str) -> BatchResult {
    let request_id = format!("line-{number}");

    let body: Value = match serde_json::from_str(raw) {
        Ok(body) => body,
        Err(err) => {
            warn!(line = number, %err, "malformed batch line");
            return unusable(number);
        }
    };

    let kind = body
        .get("kind")
        .cloned()
        .and_then(|v| serde_json::from_value::<RequestKind>(v).ok());
    let Some(kind) = kind else {
        warn!(line = number, "batch line has no usable kind");
        return unusable(number);
    };

    BatchResult {
        line: number,
        kind: Some(kind),
        outcome: screener.screen(&request_id, kind, &body).await,
    }
}

/// A line that cannot be interpreted as a request is treated like a missing
/// field.
fn unusable(number: usize) -> BatchResult {
    let reason = RejectReason::EmptyInput;
    BatchResult {
        line: number,
        kind: None,
        outcome: Outcome {
            accepted: false,
            reason: Some(reason),
            message: Some(reason.user_message()),
            prompt: None,
        },
    }
}
