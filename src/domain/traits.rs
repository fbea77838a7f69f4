// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// Both front-ends talk to the rest of the system only through
// these two traits. The application service implements both;
// tests implement them with in-memory fakes so the session logic
// can be exercised without a model.
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use anyhow::Result;

use crate::domain::example::ExampleRecord;
use crate::domain::post::{ParsedPost, SummaryRequest};

// ─── ExampleSource ────────────────────────────────────────────────────────────
/// Anything that can list catalogue entries and parse them on demand.
pub trait ExampleSource {
    /// The catalogue in display order.
    fn examples(&self) -> &[ExampleRecord];

    /// Parse the post text of the example at `index`.
    /// Fails if the index is out of bounds or the file is unreadable.
    fn load_example(&self, index: usize) -> Result<ParsedPost>;
}

// ─── PostSummarizer ───────────────────────────────────────────────────────────
/// Anything that can turn a post into a short summary.
pub trait PostSummarizer {
    fn summarize(&self, request: &SummaryRequest) -> Result<String>;
}
