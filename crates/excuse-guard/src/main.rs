mod batch;
mod cli;
mod config;
mod screen;

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::{json, Value};
use tokio::io::AsyncReadExt;
use tracing::{info, warn};

use guard_audit::{AuditEntry, AuditEventType, AuditSink, AuditSource};
use prompt_guard::{wrap, PATTERNS};

use crate::cli::{Cli, Command, PromptTask, ReplyTask};
use crate::screen::{RequestKind, Screener};

/// Exit status for input the guard refused.
const EXIT_REJECTED: u8 = 2;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // 1. Parse CLI args.
    let cli = Cli::parse();

    // 2. Load config, then merge CLI overrides.
    let mut cfg = config::load(&cli.config)?;

    if let Some(ref level) = cli.log_level {
        cfg.logging.level = level.clone();
    }
    if let Some(ref path) = cli.audit_log {
        cfg.audit.path = path.clone();
    }
    if cli.no_audit {
        cfg.audit.enabled = false;
    }

    // 3. Logging goes to stderr; stdout carries command output only.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cfg.logging.level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_writer(std::io::stderr);
    if cfg.logging.json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    if cfg.defaulted {
        warn!(path = %cli.config.display(), "configuration file not found; using defaults");
    }
    info!(
        rules = PATTERNS.len(),
        audit = cfg.audit.enabled,
        "excuse-guard starting"
    );

    // 4. Audit trail.
    let audit = if cfg.audit.enabled {
        let (sink, handle) = AuditSink::start(&cfg.audit.path)
            .await
            .with_context(|| format!("failed to open audit log {}", cfg.audit.path.display()))?;
        sink.record(AuditEntry::new(
            AuditEventType::ProcessStarted,
            AuditSource::new("excuse-guard"),
            json!({
                "version": env!("CARGO_PKG_VERSION"),
                "command": command_name(&cli.command),
            }),
        ))
        .await;
        Some((sink, handle))
    } else {
        None
    };

    let screener = Screener::new(
        command_name(&cli.command),
        audit.as_ref().map(|(sink, _)| sink.clone()),
    );

    // 5. Run the command.
    let result = run(&screener, cli.command).await.map(exit_for);
    drop(screener);

    // 6. Close the audit trail.
    if let Some((sink, handle)) = audit {
        sink.record(AuditEntry::new(
            AuditEventType::ProcessStopped,
            AuditSource::new("excuse-guard"),
            json!({ "ok": result.is_ok() }),
        ))
        .await;
        drop(sink);
        let written = handle.await.context("audit writer task failed")?;
        info!(written, "audit log closed");
    }

    result
}

/// Returns whether the guard accepted the input.
async fn run(screener: &Screener, command: Command) -> Result<bool> {
    match command {
        Command::Check { text } => {
            let text = read_text(text).await?;
            let verdict = screener.check(&text).await;
            println!("{}", serde_json::to_string(&verdict)?);
            Ok(verdict.safe)
        }
        Command::Wrap { text } => {
            let text = read_text(text).await?;
            let verdict = screener.check(&text).await;
            match verdict.into_safe_text() {
                Ok(safe) => {
                    println!("{}", wrap(safe.as_str()));
                    Ok(true)
                }
                Err(reason) => {
                    eprintln!("{}", reason.user_message());
                    Ok(false)
                }
            }
        }
        Command::Clean { text } => {
            let text = read_text(text).await?;
            println!("{}", screener.clean(&text).await);
            Ok(true)
        }
        Command::Prompt { task } => {
            let (kind, body) = prompt_body(task);
            let outcome = screener.screen("cli", kind, &body).await;
            match (outcome.prompt, outcome.message) {
                (Some(prompt), _) => {
                    println!("{prompt}");
                    Ok(true)
                }
                (None, message) => {
                    eprintln!("{}", message.unwrap_or_default());
                    Ok(false)
                }
            }
        }
        Command::Reply { task } => {
            let (kind, body, output) = reply_parts(task);
            let output = read_text(output).await?;
            let today = chrono::Utc::now().date_naive();
            match screener.reply("cli", kind, &body, &output, today).await {
                Ok(reply) => {
                    println!("{}", serde_json::to_string(&reply)?);
                    Ok(true)
                }
                Err(rejection) => {
                    eprintln!("{}", rejection.user_message());
                    Ok(false)
                }
            }
        }
        Command::Batch { file } => {
            // Per-line rejections are reported in the output, not the exit status.
            batch::run_file(screener, &file).await?;
            Ok(true)
        }
    }
}

/// Shape prompt flags like the JSON body a route handler would receive, so
/// both paths share the same intake.
fn prompt_body(task: PromptTask) -> (RequestKind, Value) {
    match task {
        PromptTask::Rate { excuse, context } => (
            RequestKind::Rate,
            json!({ "excuse": excuse, "context": context }),
        ),
        PromptTask::Fix {
            excuse,
            context,
            grade,
        } => (
            RequestKind::Fix,
            json!({ "excuse": excuse, "context": context, "originalGrade": grade }),
        ),
        PromptTask::Daily { context, scenario } => (
            RequestKind::Daily,
            json!({ "context": context, "scenario": scenario }),
        ),
    }
}

/// Split reply flags into the request body the reply answers and the raw
/// model output.
fn reply_parts(task: ReplyTask) -> (RequestKind, Value, Option<String>) {
    match task {
        ReplyTask::Rate { output } => (RequestKind::Rate, json!({}), output),
        ReplyTask::Fix { excuse, output } => (RequestKind::Fix, json!({ "excuse": excuse }), output),
        ReplyTask::Daily {
            context,
            scenario,
            output,
        } => (
            RequestKind::Daily,
            json!({ "context": context, "scenario": scenario }),
            output,
        ),
    }
}

fn command_name(command: &Command) -> &'static str {
    match command {
        Command::Check { .. } => "check",
        Command::Wrap { .. } => "wrap",
        Command::Clean { .. } => "clean",
        Command::Prompt { .. } => "prompt",
        Command::Reply { .. } => "reply",
        Command::Batch { .. } => "batch",
    }
}

async fn read_text(arg: Option<String>) -> Result<String> {
    match arg {
        Some(text) => Ok(text),
        None => {
            let mut buf = String::new();
            tokio::io::stdin()
                .read_to_string(&mut buf)
                .await
                .context("failed to read stdin")?;
            Ok(buf)
        }
    }
}

fn exit_for(safe: bool) -> ExitCode {
    if safe {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_REJECTED)
    }
}
