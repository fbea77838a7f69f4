// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust structs and traits describing what the summarizer
// works with: catalogue entries, parsed posts, summary requests.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O or network calls
//   - Only plain Rust structs, enums, and traits
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

// One entry of the example catalogue
pub mod example;

// A post split into topic / title / content
pub mod post;

// Core abstractions (traits) that other layers implement
pub mod traits;
