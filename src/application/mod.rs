// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Workflow coordination only: no tensor math here.
//
//   train_use_case    — config, corpus, backend choice
//   session           — the epoch driver and its hooks
//   evaluate_use_case — score a saved checkpoint

// The training workflow
pub mod train_use_case;

// Epoch loop, validation and final test
pub mod session;

// Offline scoring of a saved model
pub mod evaluate_use_case;
