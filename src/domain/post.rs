// ============================================================
// Layer 3 — Post Domain Types
// ============================================================
// ParsedPost is what the example parser produces and what the
// editable fields of both front-ends are filled with.
//
// SummaryRequest is what the summarizer consumes. It is built
// from whatever the user left in the fields, so it may differ
// from the ParsedPost it started from.

use serde::{Deserialize, Serialize};

/// Topic used when a post does not name its subreddit.
pub const DEFAULT_TOPIC: &str = "arXiv";

/// Title used when a summary request carries none.
pub const DEFAULT_TITLE: &str = "Untitled";

/// A post split into its three fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedPost {
    /// Subreddit name without the `r/` prefix
    pub topic: String,

    /// Post title
    pub title: String,

    /// Post body
    pub content: String,
}

impl ParsedPost {
    pub fn new(
        topic:   impl Into<String>,
        title:   impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            topic:   topic.into(),
            title:   title.into(),
            content: content.into(),
        }
    }
}

/// Input of one summarization call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryRequest {
    pub content: String,

    #[serde(default = "default_title")]
    pub title: String,

    #[serde(default = "default_topic")]
    pub topic: String,
}

fn default_title() -> String { DEFAULT_TITLE.to_string() }
fn default_topic() -> String { DEFAULT_TOPIC.to_string() }

impl SummaryRequest {
    /// A request for `content` with the default title and topic.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            title:   default_title(),
            topic:   default_topic(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = topic.into();
        self
    }
}

impl From<ParsedPost> for SummaryRequest {
    fn from(post: ParsedPost) -> Self {
        Self { content: post.content, title: post.title, topic: post.topic }
    }
}
