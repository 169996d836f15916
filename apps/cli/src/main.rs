//! `execwatch`: follow document executions from the terminal.

mod cli;
mod commands;
mod config;

use std::process::ExitCode;

use clap::Parser;

use crate::cli::{Cli, Command};
use crate::commands::App;
use crate::config::CliConfig;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let mut log_config = execwatch_log::Config::from_env();
    if cli.global.verbose {
        log_config = log_config.with_level("debug");
    }
    let _log = execwatch_log::init_with(log_config)?;

    let config = CliConfig::load(&cli.global)?;
    tracing::debug!(?config.poller, "configuration loaded");
    let app = App::new(config)?;

    match cli.command {
        Command::Status { execution_id, json } => app.status(&execution_id, json).await,
        Command::Watch {
            execution_id,
            interval,
        } => app.watch(&execution_id, interval).await,
        Command::List {
            document_id,
            interval,
        } => app.list(&document_id, interval).await,
    }
}
