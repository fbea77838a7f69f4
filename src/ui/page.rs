// ============================================================
// Layer 1 — Web Page Rendering
// ============================================================
// The web front-end is a single server-rendered page:
//
//   ┌──────────────────────────────────────────┐
//   │        Reddit post summarizer            │
//   │  [thumb] [thumb] [thumb]  ← gallery      │
//   │  Choose  Choose  Choose                  │
//   │  Subreddit name - r/ [______]            │
//   │  Title               [______]            │
//   │  Post                [______]            │
//   │  [Summarize!]                            │
//   │  ┌ summary (green panel) ┐               │
//   └──────────────────────────────────────────┘
//
// "Choose" is a plain link (GET /?example=i); "Summarize!" posts
// the form back to /summarize. No JavaScript is needed.
//
// Every piece of user or file text goes through escape_html.

use std::fmt::Write;

use crate::domain::example::ExampleRecord;

const STYLE: &str = r#"
body, html { background-color: #484445; color: #3D1B24; font-family: 'Inter', 'Fira Mono', monospace; margin: 0; }
.container { max-width: 750px; margin: 24px auto; padding: 32px 22px 48px 22px; background: #F7D7DE; border-radius: 14px; box-shadow: 0 6px 36px #d8697a33; }
h1 { color: #B6364A; text-align: center; letter-spacing: 0.5px; }
.gallery { display: flex; flex-wrap: wrap; gap: 12px; justify-content: center; }
.example { display: flex; flex-direction: column; align-items: center; width: 160px; }
.example.selected img { border-width: 3px; }
.example img { width: 150px; height: 150px; object-fit: cover; border: 1.5px solid #B6364A; border-radius: 4px; box-shadow: 0 2px 10px #d8697aaa; margin: 16px auto 6px auto; }
.example span { font-size: 0.85em; text-align: center; }
.button, button { display: inline-block; background: #B6364A; color: #FFF5F8; border-radius: 5px; border: 1.5px solid #8A2A3A; box-shadow: 0 2px 12px #ff8c6630; padding: 6px 16px; text-decoration: none; cursor: pointer; font: inherit; }
.button:hover, button:hover { background: #8A2A3A; }
label { display: block; color: #B6364A; font-weight: bold; margin-top: 14px; }
input[type=text], textarea { width: 100%; box-sizing: border-box; padding: 6px; font: inherit; }
form button { margin-top: 16px; width: 100%; }
#summary_output { color: black; background-color: #90EE90; padding: 10px; border-radius: 8px; margin-top: 16px; white-space: pre-wrap; }
"#;

/// Everything the page shows.
pub struct PageView<'a> {
    pub examples: &'a [ExampleRecord],
    pub selected: usize,
    pub topic:    &'a str,
    pub title:    &'a str,
    pub content:  &'a str,
    pub summary:  Option<&'a str>,
}

/// Escape text for use in HTML element content and attribute values.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&'  => out.push_str("&amp;"),
            '<'  => out.push_str("&lt;"),
            '>'  => out.push_str("&gt;"),
            '"'  => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c    => out.push(c),
        }
    }
    out
}

pub fn render_page(view: &PageView<'_>) -> String {
    let mut html = String::new();
    let _ = write!(
        html,
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>Reddit post summarizer</title>\n<style>{STYLE}</style>\n</head>\n<body>\n\
         <div class=\"container\">\n<h1>Reddit post summarizer</h1>\n<p>Load an example:</p>\n"
    );

    html.push_str("<div class=\"gallery\">\n");
    for (i, example) in view.examples.iter().enumerate() {
        let class = if i == view.selected { "example selected" } else { "example" };
        let title = escape_html(&example.title);
        let _ = write!(
            html,
            "<div class=\"{class}\">\
             <img src=\"/thumbnails/{i}\" alt=\"{title}\" width=\"150\" height=\"150\">\
             <span>{title}</span>\
             <a class=\"button\" id=\"choose_{i}\" href=\"/?example={i}\">Choose</a>\
             </div>\n"
        );
    }
    html.push_str("</div>\n");

    let _ = write!(
        html,
        "<form method=\"post\" action=\"/summarize\">\n\
         <input type=\"hidden\" name=\"example\" value=\"{selected}\">\n\
         <label for=\"topic\">Subreddit name - r/</label>\
         <input type=\"text\" id=\"topic\" name=\"topic\" value=\"{topic}\">\n\
         <label for=\"title\">Title</label>\
         <input type=\"text\" id=\"title\" name=\"title\" value=\"{title}\">\n\
         <label for=\"content\">Post</label>\
         <textarea id=\"content\" name=\"content\" rows=\"10\">{content}</textarea>\n\
         <button type=\"submit\">Summarize!</button>\n</form>\n",
        selected = view.selected,
        topic    = escape_html(view.topic),
        title    = escape_html(view.title),
        content  = escape_html(view.content),
    );

    if let Some(summary) = view.summary {
        let _ = write!(html, "<div id=\"summary_output\">{}</div>\n", escape_html(summary));
    }

    html.push_str("</div>\n</body>\n</html>\n");
    html
}
