// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The training loop never reads files itself. Anything that can
// produce whitespace-tokenised lines for a corpus split can feed
// the vocabulary builder and the BPTT batcher.

use anyhow::Result;
use crate::domain::split::Split;

// ─── TokenSource ──────────────────────────────────────────────────────────────
/// Any component that can provide the raw text lines of a split.
///
/// Implementations:
///   - WikiTextLoader → reads wiki.{train,valid,test}.tokens
///   - in tests, a Vec-backed source
pub trait TokenSource {
    /// Load every line of `split`, in file order.
    fn load_lines(&self, split: Split) -> Result<Vec<String>>;
}
