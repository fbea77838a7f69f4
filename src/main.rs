#![recursion_limit = "256"]

mod cli;
mod application;
mod domain;
mod data;
mod ml;
mod infra;
mod ui;

use anyhow::{Context, Result};
use cli::Cli;
use clap::Parser;
use std::{fs::File, sync::Mutex};
use tracing_subscriber::EnvFilter;

/// Log file used while the terminal UI owns the screen.
const TUI_LOG_FILE: &str = "reddit-summarizer.log";

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::from_default_env()
        .add_directive("reddit_summarizer=info".parse()?);

    if cli.logs_to_file() {
        let file = File::create(TUI_LOG_FILE)
            .with_context(|| format!("Cannot create log file '{TUI_LOG_FILE}'"))?;
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .init();
    }

    cli.run()
}
