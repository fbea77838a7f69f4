// ============================================================
// Layer 4 — Example Post Parser
// ============================================================
// Example text files come in two shapes.
//
// Structured — three line-anchored, case-sensitive labels:
//
//   TOPIC: relationships
//   TITLE: My roommate keeps eating my food
//   CONTENT:
//   So this has been going on for months...
//
// Anything else (e.g. a pasted paper abstract) is unstructured and
// is taken whole as the post body, with the default topic and the
// file name as title.
//
// The structured form needs ALL three labels. TOPIC and TITLE take
// the rest of their line; CONTENT takes everything to end of file.
//
// Reference: regex crate documentation (multi-line mode)

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::{fs, path::Path};

use crate::domain::post::{ParsedPost, DEFAULT_TOPIC};

static TOPIC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^TOPIC:\s*(.*)$").expect("valid regex"));
static TITLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^TITLE:\s*(.*)$").expect("valid regex"));
static CONTENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^CONTENT:\s*([\s\S]*)$").expect("valid regex"));

/// Read and parse the post stored at `path`.
pub fn parse_example_file(path: impl AsRef<Path>) -> Result<ParsedPost> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .with_context(|| format!("Cannot read example text '{}'", path.display()))?;

    // os-style base name: the last path component, extension kept
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown");

    let post = parse_example_text(&text, file_name);
    tracing::debug!(
        "Parsed '{}' (topic='{}', {} chars of content)",
        path.display(),
        post.topic,
        post.content.len()
    );
    Ok(post)
}

/// Parse post text that was read from a file called `file_name`.
pub fn parse_example_text(text: &str, file_name: &str) -> ParsedPost {
    let stripped = text.trim();

    let capture = |re: &Regex| -> Option<String> {
        re.captures(stripped)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
    };

    match (capture(&TOPIC_RE), capture(&TITLE_RE), capture(&CONTENT_RE)) {
        (Some(topic), Some(title), Some(content)) => ParsedPost { topic, title, content },
        _ => ParsedPost::new(DEFAULT_TOPIC, file_name, stripped),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structured_post() {
        let text = "TOPIC: rust \nTITLE:  Lifetimes are hard\nCONTENT:\n  I tried to return a reference.\nIt did not compile.  \n";
        let post = parse_example_text(text, "post.txt");
        assert_eq!(post.topic, "rust");
        assert_eq!(post.title, "Lifetimes are hard");
        assert_eq!(post.content, "I tried to return a reference.\nIt did not compile.");
    }

    #[test]
    fn test_labels_in_any_order() {
        let text = "CONTENT: body first\nTITLE: t\nTOPIC: x";
        let post = parse_example_text(text, "f.txt");
        assert_eq!(post.topic, "x");
        assert_eq!(post.title, "t");
        // CONTENT runs to end of text, swallowing later labels
        assert_eq!(post.content, "body first\nTITLE: t\nTOPIC: x");
    }

    #[test]
    fn test_missing_label_falls_back() {
        let text = "TOPIC: rust\nTITLE: no content label here\n";
        let post = parse_example_text(text, "paper.txt");
        assert_eq!(post.topic, "arXiv");
        assert_eq!(post.title, "paper.txt");
        assert_eq!(post.content, "TOPIC: rust\nTITLE: no content label here");
    }

    #[test]
    fn test_labels_are_case_sensitive_and_line_anchored() {
        let text = "topic: a\ntitle: b\ncontent: c\nsee TOPIC: x";
        let post = parse_example_text(text, "lower.txt");
        assert_eq!(post.topic, "arXiv");
        assert_eq!(post.content, text);
    }

    #[test]
    fn test_fallback_prompt_has_no_blank_line() {
        let post = parse_example_text("\nWe propose LoRA.\n", "lora.txt");
        assert_eq!(post.content, "We propose LoRA.");

        let prompt = crate::data::prompt::build_prompt(&post.into());
        assert!(prompt.ends_with("POST: We propose LoRA.\nTL;DR:"), "{prompt}");
    }

    #[test]
    fn test_parse_file_uses_base_name() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("attention.txt");
        fs::write(&path, "We propose a new architecture.\n").unwrap();

        let post = parse_example_file(&path).unwrap();
        assert_eq!(post.title, "attention.txt");
        assert_eq!(post.topic, "arXiv");
        assert_eq!(post.content, "We propose a new architecture.");
    }

    #[test]
    fn test_parse_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(parse_example_file(dir.path().join("missing.txt")).is_err());
    }
}
