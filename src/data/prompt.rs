// ============================================================
// Layer 4 — Prompt Template
// ============================================================
// The adapter was fine-tuned on Reddit TL;DR data laid out as:
//
//   SUBREDDIT: r/{topic}
//   TITLE: {title}
//   POST: {content}
//   TL;DR:
//
// The model continues after "TL;DR:" with the summary, so the
// template must match the training layout byte for byte.

use crate::domain::post::SummaryRequest;

/// Marker the summary is generated after.
pub const COMPLETION_MARKER: &str = "TL;DR:";

/// Build the prompt fed to the model for `request`.
pub fn build_prompt(request: &SummaryRequest) -> String {
    format!(
        "SUBREDDIT: r/{}\nTITLE: {}\nPOST: {}\n{}",
        request.topic, request.title, request.content, COMPLETION_MARKER
    )
}
