// ============================================================
// Layer 2 — Summarizer Service
// ============================================================
// The one object both front-ends share. It owns:
//
//   • the example catalogue (loaded at construction, read-only)
//   • the data directory layout
//   • the model, through a GenerationWorker created on first use
//
// Model loading is lazy and happens at most once per process:
// concurrent first callers wait on the same load, and a failed
// load leaves the cell empty so the next call tries again.
//
// Reference: once_cell documentation (sync::OnceCell)

use anyhow::Result;
use once_cell::sync::OnceCell;
use std::path::{Path, PathBuf};

use crate::application::config::AppConfig;
use crate::data::{catalogue::load_example_index, parser::parse_example_file};
use crate::domain::{
    example::{ExampleNotFound, ExampleRecord},
    post::{ParsedPost, SummaryRequest},
    traits::{ExampleSource, PostSummarizer},
};
use crate::ml::worker::GenerationWorker;

pub struct SummarizerService {
    config:   AppConfig,
    examples: Vec<ExampleRecord>,
    worker:   OnceCell<GenerationWorker>,
}

impl SummarizerService {
    /// Load the catalogue. The model is not touched until needed.
    pub fn new(config: AppConfig) -> Result<Self> {
        let examples = load_example_index(config.index_path())?;
        Ok(Self { config, examples, worker: OnceCell::new() })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn example(&self, index: usize) -> Result<&ExampleRecord> {
        self.examples.get(index).ok_or_else(|| {
            ExampleNotFound { index, count: self.examples.len() }.into()
        })
    }

    pub fn thumbnail_path(&self, index: usize) -> Result<PathBuf> {
        Ok(self.config.thumbnail_path(self.example(index)?))
    }

    /// Load the model now instead of on the first summary.
    pub fn warm_up(&self) -> Result<()> {
        self.worker().map(|_| ())
    }

    fn worker(&self) -> Result<&GenerationWorker> {
        self.worker
            .get_or_try_init(|| GenerationWorker::spawn(self.config.model_spec()))
    }
}

/// Summarize a post file outside the catalogue, loading the model for this call.
pub fn summarize_file(config: &AppConfig, path: &Path) -> Result<String> {
    let post   = parse_example_file(path)?;
    let worker = GenerationWorker::spawn(config.model_spec())?;
    worker.summarize(&SummaryRequest::from(post))
}

impl ExampleSource for SummarizerService {
    fn examples(&self) -> &[ExampleRecord] {
        &self.examples
    }

    fn load_example(&self, index: usize) -> Result<ParsedPost> {
        let record = self.example(index)?;
        parse_example_file(self.config.text_path(record))
    }
}

impl PostSummarizer for SummarizerService {
    fn summarize(&self, request: &SummaryRequest) -> Result<String> {
        tracing::info!(
            "Summarizing r/{} \"{}\" ({} chars)",
            request.topic,
            request.title,
            request.content.len()
        );
        self.worker()?.summarize(request)
    }
}
