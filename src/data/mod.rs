// ============================================================
// Layer 4 — Data Layer
// ============================================================
// Everything that turns files on disk into domain values, and
// domain values into model input text:
//
//   data/examples.json
//       │
//       ▼
//   catalogue  → ordered Vec<ExampleRecord>
//       │
//       ▼  (one record, on demand)
//   data/texts/<record.text>
//       │
//       ▼
//   parser     → ParsedPost { topic, title, content }
//       │
//       ▼  (after the user edits the fields)
//   SummaryRequest
//       │
//       ▼
//   prompt     → "SUBREDDIT: r/… TITLE: … POST: … TL;DR:"
//
// Each module is responsible for exactly one step.
//
// Reference: Rust Book §13 (Iterators and Closures)
//            serde_json / regex crate documentation

/// Reads the example catalogue
pub mod catalogue;

/// Splits a post file into topic / title / content
pub mod parser;

/// Builds the summarization prompt
pub mod prompt;
