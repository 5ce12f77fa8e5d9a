// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// All code that builds, runs or updates the network lives here.
//
//   state.rs     — recurrent state as a {single, composite} sum
//                  type with recursive detach
//
//   model.rs     — embedding → stacked LSTM → linear decoder,
//                  optional weight tying, train/eval mode
//
//   clipping.rs  — global gradient-norm clipping over a module
//
//   trainer.rs   — one epoch of truncated-BPTT training
//
//   evaluator.rs — dropout-free, gradient-free scoring pass
//
// Reference: Zaremba et al. (2014) Recurrent Neural Network Regularization
//            Kingma & Ba (2015) Adam

/// Carried hidden/cell state
pub mod state;

/// LSTM language model architecture
pub mod model;

/// Global gradient-norm clipping
pub mod clipping;

/// Training loop
pub mod trainer;

/// Evaluation loop
pub mod evaluator;
