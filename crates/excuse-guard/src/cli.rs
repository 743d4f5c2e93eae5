use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "excuse-guard",
    version,
    about = "Screen excuse text for prompt injection and build guarded prompts"
)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, global = true, default_value = "excuse-guard.yaml")]
    pub config: PathBuf,

    /// Log level (overrides config file setting)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Audit log path (overrides config file setting)
    #[arg(long, global = true)]
    pub audit_log: Option<PathBuf>,

    /// Disable the audit log for this run
    #[arg(long, global = true)]
    pub no_audit: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Screen text and print the verdict as JSON; exits 2 when rejected
    Check {
        /// Text to screen; read from stdin when omitted
        text: Option<String>,
    },
    /// Screen text and print it inside the content delimiters
    Wrap {
        /// Text to wrap; read from stdin when omitted
        text: Option<String>,
    },
    /// Strip echoed delimiter and role markers from model output
    Clean {
        /// Model output; read from stdin when omitted
        text: Option<String>,
    },
    /// Build a guarded prompt for one of the excuse tasks
    Prompt {
        #[command(subcommand)]
        task: PromptTask,
    },
    /// Parse a model reply for one of the excuse tasks and print it as JSON,
    /// substituting the task's fallback when the reply is unusable
    Reply {
        #[command(subcommand)]
        task: ReplyTask,
    },
    /// Screen a JSON-lines file of requests and print one result per line
    Batch {
        /// File with one `{"kind": "rate"|"fix"|"daily", ...}` object per line
        file: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
pub enum PromptTask {
    /// Prompt that grades an excuse
    Rate {
        #[arg(long)]
        excuse: String,
        #[arg(long)]
        context: Option<String>,
    },
    /// Prompt that rewrites an excuse for a better grade
    Fix {
        #[arg(long)]
        excuse: String,
        #[arg(long)]
        context: Option<String>,
        /// Grade the excuse received earlier (A+, A, B, C, D, F; anything else counts as C)
        #[arg(long)]
        grade: Option<String>,
    },
    /// Prompt for the excuse of the day
    Daily {
        #[arg(long)]
        context: Option<String>,
        /// late-to-work, skipped-gym, missed-a-call, forgot-birthday, late-to-meeting
        #[arg(long)]
        scenario: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum ReplyTask {
    /// Reply to a rating prompt
    Rate {
        /// Model output; read from stdin when omitted
        output: Option<String>,
    },
    /// Reply to a rewrite prompt
    Fix {
        /// The excuse that was rewritten
        #[arg(long)]
        excuse: String,
        /// Model output; read from stdin when omitted
        output: Option<String>,
    },
    /// Reply to the excuse-of-the-day prompt
    Daily {
        #[arg(long)]
        context: Option<String>,
        /// Scenario the prompt used; picked at random when omitted
        #[arg(long)]
        scenario: Option<String>,
        /// Model output; read from stdin when omitted
        output: Option<String>,
    },
}
