// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust types and traits describing the language-modelling
// problem: which split of the corpus we are reading, what a
// single next-token-prediction window looks like, and where raw
// token lines come from.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - Only plain Rust structs, enums, and traits

// Train / validation / test split identifiers
pub mod split;

// One (input, target) window of token ids
pub mod window;

// Core abstractions (traits) that other layers implement
pub mod traits;
