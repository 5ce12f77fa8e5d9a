// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Cross-cutting concerns used by the ml and application layers:
//
//   checkpoint.rs — best-model weights (CompactRecorder) and the
//                   TrainConfig JSON needed to rebuild the model
//   metrics.rs    — per-epoch validation CSV
//   interrupt.rs  — Ctrl-C → shared flag polled by the loops
//   progress.rs   — indicatif bars over batch streams
//
// Checkpoints and metrics are opt-in; a default run writes nothing.

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Training metrics CSV logger
pub mod metrics;

/// Ctrl-C handling
pub mod interrupt;

/// Progress bars
pub mod progress;
