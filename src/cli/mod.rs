// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// This is the entry point for all user interaction.
// It uses the `clap` crate to parse command line arguments.
// All business logic is delegated to Layer 2 (application).
//
// Four commands are supported:
//   1. `web`       — browser front-end on http://127.0.0.1:7860
//   2. `tui`       — full-screen terminal front-end
//   3. `examples`  — print the example catalogue
//   4. `summarize` — summarize one example or file and print it
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

// Declare the commands submodule
pub mod commands;

use anyhow::{Context, Result};
use clap::Parser;
use commands::{Commands, SharedArgs, SummarizeArgs, WebArgs};
use std::sync::Arc;

use crate::application::summarizer_service::{summarize_file, SummarizerService};
use crate::domain::traits::{ExampleSource, PostSummarizer};

/// The main CLI struct — clap reads the fields and generates
/// argument parsing code automatically via the Parser derive macro.
#[derive(Parser, Debug)]
#[command(
    name = "reddit-summarizer",
    version,
    about = "Summarize Reddit and arXiv posts with a LoRA fine-tuned language model."
)]
pub struct Cli {
    /// The subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// The terminal UI owns stdout, so its logs must go elsewhere.
    pub fn logs_to_file(&self) -> bool {
        matches!(self.command, Commands::Tui(_))
    }

    /// Match on the subcommand and dispatch to the correct use case.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Web(args)       => run_web(args),
            Commands::Tui(args)       => run_tui(args),
            Commands::Examples(args)  => run_examples(args),
            Commands::Summarize(args) => run_summarize(args),
        }
    }
}

fn run_web(args: WebArgs) -> Result<()> {
    let service = Arc::new(SummarizerService::new(args.load_config()?)?);
    let address = service.config().bind_address();

    if args.warm_up {
        service.warm_up()?;
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Cannot start async runtime")?;
    runtime.block_on(crate::ui::web::serve(service, &address))
}

fn run_tui(args: SharedArgs) -> Result<()> {
    let service = SummarizerService::new(args.load_config()?)?;
    crate::ui::tui::run(&service)
}

fn run_examples(args: SharedArgs) -> Result<()> {
    let service = SummarizerService::new(args.load_config()?)?;
    for (i, example) in service.examples().iter().enumerate() {
        println!("{i:>3}  {:<40} {} / {}", example.title, example.text, example.image);
    }
    Ok(())
}

fn run_summarize(args: SummarizeArgs) -> Result<()> {
    let config = args.shared.load_config()?;

    let summary = match (args.example, args.file) {
        (Some(index), _) => {
            let service = SummarizerService::new(config)?;
            let post    = service.load_example(index)?;
            println!("r/{} — {}", post.topic, post.title);
            service.summarize(&post.into())?
        }
        (None, Some(path)) => summarize_file(&config, &path)?,
        // clap requires one of the two
        (None, None) => anyhow::bail!("Pass --example or --file"),
    };

    println!("\nTL;DR: {summary}");
    Ok(())
}
