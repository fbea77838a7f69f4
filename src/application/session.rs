// ============================================================
// Layer 2 — Session
// ============================================================
// What one user is looking at: the selected example, the three
// editable fields and the latest summary.
//
//   choose(i)   → fields are overwritten with example i's parsed
//                 values (edits to the previous example are lost)
//   summarize() → the fields AS EDITED are summarized
//
// The selected index is always inside the catalogue.

use anyhow::Result;

use crate::domain::{
    example::{ExampleNotFound, ExampleRecord},
    post::{ParsedPost, SummaryRequest},
    traits::{ExampleSource, PostSummarizer},
};

pub struct Session<'a, S> {
    source:      &'a S,
    selected:    usize,
    pub topic:   String,
    pub title:   String,
    pub content: String,
    summary:     Option<String>,
}

impl<'a, S: ExampleSource + PostSummarizer> Session<'a, S> {
    /// A session showing the first example.
    pub fn new(source: &'a S) -> Result<Self> {
        Self::open(source, 0)
    }

    /// A session showing example `index`; no other example is read.
    pub fn open(source: &'a S, index: usize) -> Result<Self> {
        check_index(source, index)?;
        let post = source.load_example(index)?;
        Self::with_fields(source, index, post)
    }

    /// A session on example `selected` with fields the user already edited.
    pub fn with_fields(source: &'a S, selected: usize, fields: ParsedPost) -> Result<Self> {
        check_index(source, selected)?;
        Ok(Self {
            source,
            selected,
            topic:   fields.topic,
            title:   fields.title,
            content: fields.content,
            summary: None,
        })
    }

    pub fn examples(&self) -> &'a [ExampleRecord] {
        self.source.examples()
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    /// Select example `index` and fill the fields with its parsed values.
    pub fn choose(&mut self, index: usize) -> Result<()> {
        check_index(self.source, index)?;
        let post = self.source.load_example(index)?;

        self.selected = index;
        self.topic    = post.topic;
        self.title    = post.title;
        self.content  = post.content;
        self.summary  = None;
        tracing::debug!("Selected example {index}");
        Ok(())
    }

    pub fn request(&self) -> SummaryRequest {
        SummaryRequest::new(self.content.clone())
            .with_title(self.title.clone())
            .with_topic(self.topic.clone())
    }

    /// Summarize the current fields and keep the result.
    pub fn summarize(&mut self) -> Result<&str> {
        let summary = self.source.summarize(&self.request())?;
        Ok(self.summary.insert(summary).as_str())
    }
}

fn check_index<S: ExampleSource>(source: &S, index: usize) -> Result<()> {
    let count = source.examples().len();
    if index >= count {
        return Err(ExampleNotFound { index, count }.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct FakeSource {
        records:    Vec<ExampleRecord>,
        posts:      Vec<ParsedPost>,
        unreadable: Option<usize>,
        requests:   RefCell<Vec<SummaryRequest>>,
    }

    impl FakeSource {
        fn new() -> Self {
            Self {
                records: vec![
                    ExampleRecord::new("a.png", "a.txt", "A"),
                    ExampleRecord::new("b.png", "b.txt", "B"),
                ],
                posts: vec![
                    ParsedPost::new("rust", "Borrowing", "How do lifetimes work?"),
                    ParsedPost::new("arXiv", "b.txt", "An abstract."),
                ],
                unreadable: None,
                requests:   RefCell::new(Vec::new()),
            }
        }
    }

    impl ExampleSource for FakeSource {
        fn examples(&self) -> &[ExampleRecord] {
            &self.records
        }

        fn load_example(&self, index: usize) -> Result<ParsedPost> {
            if self.unreadable == Some(index) {
                anyhow::bail!("cannot read post {index}");
            }
            self.posts
                .get(index)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("no post {index}"))
        }
    }

    impl PostSummarizer for FakeSource {
        fn summarize(&self, request: &SummaryRequest) -> Result<String> {
            self.requests.borrow_mut().push(request.clone());
            Ok(format!("summary of {}", request.title))
        }
    }

    #[test]
    fn test_starts_on_first_example() {
        let source  = FakeSource::new();
        let session = Session::new(&source).unwrap();
        assert_eq!(session.selected(), 0);
        assert_eq!(session.topic, "rust");
        assert_eq!(session.title, "Borrowing");
        assert_eq!(session.content, "How do lifetimes work?");
        assert!(session.summary().is_none());
    }

    #[test]
    fn test_choose_replaces_fields() {
        let source      = FakeSource::new();
        let mut session = Session::new(&source).unwrap();
        session.title = "edited".into();

        session.choose(1).unwrap();
        assert_eq!(session.selected(), 1);
        assert_eq!(
            ParsedPost::new(session.topic.clone(), session.title.clone(), session.content.clone()),
            source.posts[1]
        );
    }

    #[test]
    fn test_choose_out_of_bounds_keeps_selection() {
        let source      = FakeSource::new();
        let mut session = Session::new(&source).unwrap();

        let err = session.choose(5).unwrap_err();
        assert!(err.downcast_ref::<ExampleNotFound>().is_some());
        assert_eq!(session.selected(), 0);
        assert_eq!(session.title, "Borrowing");
    }

    #[test]
    fn test_summarize_uses_edited_fields() {
        let source      = FakeSource::new();
        let mut session = Session::new(&source).unwrap();
        session.topic = "learnrust".into();

        assert_eq!(session.summarize().unwrap(), "summary of Borrowing");
        assert_eq!(session.summary(), Some("summary of Borrowing"));

        let sent = source.requests.borrow();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].topic, "learnrust");
        assert_eq!(sent[0].content, "How do lifetimes work?");
    }

    #[test]
    fn test_open_reads_only_the_chosen_example() {
        let mut source = FakeSource::new();
        source.unreadable = Some(0);

        assert!(Session::new(&source).is_err());
        let session = Session::open(&source, 1).unwrap();
        assert_eq!(session.selected(), 1);
        assert_eq!(session.content, "An abstract.");

        let err = Session::open(&source, 2).err().unwrap();
        assert!(err.downcast_ref::<ExampleNotFound>().is_some());
    }

    #[test]
    fn test_with_fields_validates_index() {
        let source = FakeSource::new();
        let post   = ParsedPost::new("t", "x", "y");
        assert!(Session::with_fields(&source, 2, post.clone()).is_err());
        assert_eq!(Session::with_fields(&source, 1, post).unwrap().selected(), 1);
    }
}
