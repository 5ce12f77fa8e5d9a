// ============================================================
// Layer 4 — LM Batcher
// ============================================================
// Implements Burn's Batcher trait to turn TokenWindows into Int
// tensors of shape [seq_len, batch_size] on the target device.
//
// The training and evaluation loops hand over one window at a
// time. When several windows are given they are concatenated
// along the time axis, which only makes sense for consecutive
// windows of the same stream (equal batch_size).

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::domain::window::TokenWindow;

/// Input and next-token target for one step of the loop.
#[derive(Debug, Clone)]
pub struct LmBatch<B: Backend> {
    /// Token ids — shape: [seq_len, batch_size]
    pub input: Tensor<B, 2, Int>,

    /// Next-token ids — shape: [seq_len, batch_size]
    pub target: Tensor<B, 2, Int>,
}

impl<B: Backend> LmBatch<B> {
    pub fn seq_len(&self) -> usize {
        self.input.dims()[0]
    }

    pub fn batch_size(&self) -> usize {
        self.input.dims()[1]
    }
}

#[derive(Clone, Debug)]
pub struct LmBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> LmBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }

    fn to_tensor(&self, ids: &[u32], seq_len: usize, batch_size: usize) -> Tensor<B, 2, Int> {
        let flat: Vec<i32> = ids.iter().map(|&x| x as i32).collect();
        Tensor::<B, 1, Int>::from_ints(flat.as_slice(), &self.device)
            .reshape([seq_len, batch_size])
    }
}

impl<B: Backend> Batcher<TokenWindow, LmBatch<B>> for LmBatcher<B> {
    fn batch(&self, items: Vec<TokenWindow>) -> LmBatch<B> {
        let batch_size = items.first().map_or(0, |w| w.batch_size);
        let seq_len: usize = items.iter().map(|w| w.seq_len).sum();

        let input: Vec<u32> = items.iter().flat_map(|w| w.input.iter().copied()).collect();
        let target: Vec<u32> = items.iter().flat_map(|w| w.target.iter().copied()).collect();

        LmBatch {
            input:  self.to_tensor(&input,  seq_len, batch_size),
            target: self.to_tensor(&target, seq_len, batch_size),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    #[test]
    fn test_window_becomes_time_major_tensor() {
        let batcher = LmBatcher::<NdArray>::new(Default::default());
        let window  = TokenWindow::new(vec![1, 2, 3, 4, 5, 6], vec![3, 4, 5, 6, 7, 8], 3, 2);
        let batch   = batcher.batch(vec![window]);

        assert_eq!(batch.input.dims(), [3, 2]);
        assert_eq!(batch.seq_len(), 3);
        assert_eq!(batch.batch_size(), 2);

        let row1: Vec<i64> = batch
            .target
            .slice([1..2, 0..2])
            .into_data()
            .iter::<i64>()
            .collect();
        assert_eq!(row1, vec![5, 6]);
    }

    #[test]
    fn test_consecutive_windows_concatenate_in_time() {
        let batcher = LmBatcher::<NdArray>::new(Default::default());
        let a = TokenWindow::new(vec![0, 1], vec![2, 3], 1, 2);
        let b = TokenWindow::new(vec![2, 3, 4, 5], vec![4, 5, 6, 7], 2, 2);
        let batch = batcher.batch(vec![a, b]);
        assert_eq!(batch.input.dims(), [3, 2]);
    }
}
