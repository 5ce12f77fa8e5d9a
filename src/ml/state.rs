// ============================================================
// Layer 5 — Recurrent State
// ============================================================
// The memory a recurrent model carries from one window to the
// next. A plain cell has a single state tensor; an LSTM carries
// a (cell, hidden) pair. Both are the same sum type, so detaching
// is one recursive walk whatever the cell needs.
//
// Every tensor is shaped [num_layers, batch_size, hidden_size].

use anyhow::{bail, Result};
use burn::prelude::*;

#[derive(Debug, Clone)]
pub enum RecurrentState<B: Backend> {
    Single(Tensor<B, 3>),
    Composite(Vec<RecurrentState<B>>),
}

impl<B: Backend> RecurrentState<B> {
    /// LSTM state: `Composite([Single(cell), Single(hidden)])`.
    pub fn lstm(cell: Tensor<B, 3>, hidden: Tensor<B, 3>) -> Self {
        Self::Composite(vec![Self::Single(cell), Self::Single(hidden)])
    }

    /// Zero LSTM state for a fresh pass.
    pub fn zeros_lstm(
        num_layers:  usize,
        batch_size:  usize,
        hidden_size: usize,
        device:      &B::Device,
    ) -> Self {
        let shape = [num_layers, batch_size, hidden_size];
        Self::lstm(Tensor::zeros(shape, device), Tensor::zeros(shape, device))
    }

    /// Cut every tensor loose from the autodiff graph. Values are
    /// unchanged; gradients stop flowing into earlier windows.
    pub fn detach(self) -> Self {
        match self {
            Self::Single(tensor)  => Self::Single(tensor.detach()),
            Self::Composite(parts) => Self::Composite(parts.into_iter().map(Self::detach).collect()),
        }
    }

    /// Unpack the `(cell, hidden)` pair an LSTM expects.
    pub fn into_lstm(self) -> Result<(Tensor<B, 3>, Tensor<B, 3>)> {
        match self {
            Self::Composite(parts) => {
                let mut parts = parts.into_iter();
                match (parts.next(), parts.next(), parts.next()) {
                    (Some(Self::Single(cell)), Some(Self::Single(hidden)), None) => Ok((cell, hidden)),
                    _ => bail!("LSTM state must be exactly a (cell, hidden) pair of tensors"),
                }
            }
            Self::Single(_) => bail!("LSTM state must be a (cell, hidden) pair, got a single tensor"),
        }
    }

    /// All leaf tensors, depth first.
    #[cfg(test)]
    pub fn tensors(&self) -> Vec<&Tensor<B, 3>> {
        match self {
            Self::Single(tensor)  => vec![tensor],
            Self::Composite(parts) => parts.iter().flat_map(Self::tensors).collect(),
        }
    }
}
