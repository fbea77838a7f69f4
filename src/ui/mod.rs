// ============================================================
// Layer 1 — Interactive Front-Ends
// ============================================================
// Two ways to drive the same SummarizerService:
//
//   web.rs  — browser UI + JSON API (axum on tokio)
//   page.rs — HTML for the browser UI
//   tui.rs  — full-screen terminal UI (ratatui)
//
// Both only go through Session and the domain traits; neither
// knows how examples are stored or how the model runs.

/// HTTP server and handlers
pub mod web;

/// Server-rendered page
pub mod page;

/// Terminal UI
pub mod tui;
