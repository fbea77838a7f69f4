// ============================================================
// Layer 3 — ExampleRecord Domain Type
// ============================================================
// One entry of the example catalogue (data/examples.json):
//
//   { "image": "cat.png", "text": "cat.txt", "title": "My cat" }
//
// Records are immutable once loaded and are identified by their
// position in the catalogue, never by title.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A gallery entry pointing at a thumbnail and a post text file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExampleRecord {
    /// Thumbnail file name, relative to the thumbnails directory
    pub image: String,

    /// Post text file name, relative to the texts directory
    pub text: String,

    /// Caption shown under the thumbnail
    pub title: String,
}

impl ExampleRecord {
    #[cfg(test)]
    pub fn new(
        image: impl Into<String>,
        text:  impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            image: image.into(),
            text:  text.into(),
            title: title.into(),
        }
    }
}

/// A catalogue index outside `0..count`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("No example at index {index} (catalogue has {count} examples)")]
pub struct ExampleNotFound {
    pub index: usize,
    pub count: usize,
}
