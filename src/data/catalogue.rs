// ============================================================
// Layer 4 — Example Catalogue Loader
// ============================================================
// Reads data/examples.json, a JSON array of records:
//
//   [
//     { "image": "cat.png", "text": "cat.txt", "title": "My cat" },
//     ...
//   ]
//
// The catalogue is read once at startup. A missing or malformed
// file is fatal: the front-ends have nothing to show without it.
// An empty array is rejected for the same reason — there would be
// no valid default selection.

use anyhow::{bail, Context, Result};
use std::{fs, path::Path};

use crate::domain::example::ExampleRecord;

/// Load the ordered list of example records from `path`.
pub fn load_example_index(path: impl AsRef<Path>) -> Result<Vec<ExampleRecord>> {
    let path = path.as_ref();

    let json = fs::read_to_string(path)
        .with_context(|| format!("Cannot read example index '{}'", path.display()))?;

    let records: Vec<ExampleRecord> = serde_json::from_str(&json)
        .with_context(|| format!("Malformed example index '{}'", path.display()))?;

    if records.is_empty() {
        bail!("Example index '{}' contains no examples", path.display());
    }

    tracing::info!("Loaded {} examples from '{}'", records.len(), path.display());
    Ok(records)
}
