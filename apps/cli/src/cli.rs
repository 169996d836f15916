//! Command-line arguments.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

/// Watch server-side document executions from the terminal.
#[derive(Debug, Parser)]
#[command(name = "execwatch", version, about)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Connection flags shared by every command. Each overrides the config
/// file and `EXECWATCH_*` variables.
#[derive(Debug, Clone, Default, Args)]
pub struct GlobalArgs {
    /// Config file (default: ./execwatch.toml when present).
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// API base URL, e.g. https://api.example.com/v1.
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Tenant (organization) id.
    #[arg(long, short = 't', global = true)]
    pub tenant: Option<String>,

    /// Bearer token.
    #[arg(long, global = true)]
    pub token: Option<String>,

    /// Log at debug level (overrides EXECWATCH_LOG).
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch and classify the current status of one execution.
    Status {
        /// Execution id.
        execution_id: String,

        /// Print the raw record as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Follow one execution until it reaches a final status.
    Watch {
        /// Execution id.
        execution_id: String,

        /// Poll interval, e.g. `2s` (default from config).
        #[arg(long, value_parser = parse_duration)]
        interval: Option<Duration>,
    },

    /// Follow every execution of a document until none is active.
    List {
        /// Document id.
        document_id: String,

        /// Poll interval, e.g. `30s` (default from config).
        #[arg(long, value_parser = parse_duration)]
        interval: Option<Duration>,
    },
}

/// Parse `1500ms`, `2s`, `1m` or a bare number of seconds.
fn parse_duration(raw: &str) -> Result<Duration, String> {
    let raw = raw.trim();
    let (digits, unit) = raw
        .find(|c: char| !c.is_ascii_digit())
        .map_or((raw, ""), |at| raw.split_at(at));
    let value: u64 = digits
        .parse()
        .map_err(|_| format!("invalid duration '{raw}'"))?;
    let duration = match unit {
        "ms" => Duration::from_millis(value),
        "" | "s" => Duration::from_secs(value),
        "m" => Duration::from_secs(value.saturating_mul(60)),
        _ => return Err(format!("unknown duration unit in '{raw}' (use ms, s or m)")),
    };
    if duration.is_zero() {
        return Err("interval must be greater than zero".to_owned());
    }
    Ok(duration)
}
