// ============================================================
// Layer 3 — Token Window
// ============================================================
// A single next-token-prediction example for a recurrent LM.
//
// Both sequences are laid out time-major: element [t][b] lives
// at index t * batch_size + b. The target is the input shifted
// one step forward in time, so target[t][b] == input[t + 1][b]
// for every t except the last row.
//
//   input:  t=0 [ a0 b0 ]     target: t=0 [ a1 b1 ]
//           t=1 [ a1 b1 ]             t=1 [ a2 b2 ]
//           t=2 [ a2 b2 ]             t=2 [ a3 b3 ]

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenWindow {
    /// Input token ids, shape (seq_len, batch_size), time-major
    pub input: Vec<u32>,

    /// Next-token ids, same shape as `input`
    pub target: Vec<u32>,

    /// Number of time steps in this window
    pub seq_len: usize,

    /// Number of parallel columns (independent streams)
    pub batch_size: usize,
}

impl TokenWindow {
    pub fn new(input: Vec<u32>, target: Vec<u32>, seq_len: usize, batch_size: usize) -> Self {
        Self { input, target, seq_len, batch_size }
    }

    /// Total number of predicted tokens in the window.
    #[cfg(test)]
    pub fn token_count(&self) -> usize {
        self.seq_len * self.batch_size
    }

    /// Row `t` of the input (one id per column).
    #[cfg(test)]
    pub fn input_row(&self, t: usize) -> &[u32] {
        &self.input[t * self.batch_size..(t + 1) * self.batch_size]
    }

    /// Row `t` of the target.
    #[cfg(test)]
    pub fn target_row(&self, t: usize) -> &[u32] {
        &self.target[t * self.batch_size..(t + 1) * self.batch_size]
    }
}
