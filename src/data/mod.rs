// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything from WikiText files to tensor batches:
//
//   wiki.*.tokens
//       │
//       ▼
//   WikiTextLoader    → reads the lines of each split
//       │
//       ▼
//   Vocabulary        → word-level ids, <eos> after every line
//       │
//       ▼
//   BpttDataset       → batch_size columns, bptt-long windows
//       │
//       ▼
//   LmBatcher         → [seq_len, batch_size] Int tensors
//
// Corpus ties the three splits together behind CorpusProvider.

/// Reads WikiText split files
pub mod loader;

/// Word-level vocabulary backed by a HuggingFace tokenizer
pub mod vocabulary;

/// Implements Burn's Dataset trait for BPTT windows
pub mod dataset;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;

/// Vocabulary + train/valid/test streams
pub mod corpus;
