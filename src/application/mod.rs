// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// This layer wires the other layers together into the object the
// front-ends use (SummarizerService) and the per-user state they
// keep (Session).
//
// Rules for this layer:
//   - No ML math or model code here
//   - No UI or printing here (that's Layer 1)
//   - No direct file parsing (that's Layer 4 and 6)
//   - Only workflow coordination
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

// Settings from defaults, config file and flags
pub mod config;

// Catalogue + lazily loaded model, shared by all front-ends
pub mod summarizer_service;

// Selected example, editable fields, latest summary
pub mod session;
