// ============================================================
// Layer 4 — BPTT Dataset
// ============================================================
// Turns one flat id stream into truncated-backprop windows.
//
//   1. Pad the stream with <pad> to a multiple of batch_size
//   2. Cut it into batch_size contiguous columns of `rows` ids
//   3. Walk down the rows in steps of `bptt`
//
//   stream: 0 1 2 3 4 5 6 7 8 9 10 11     batch_size = 2, bptt = 2
//
//            col0 col1
//   row 0 [   0    6 ]   window 0: input rows 0..2, target rows 1..3
//   row 1 [   1    7 ]   window 1: input rows 2..4, target rows 3..5
//   row 2 [   2    8 ]   window 2: input row  4..5, target row  5..6
//   row 3 [   3    9 ]
//   row 4 [   4   10 ]
//   row 5 [   5   11 ]
//
// Each column is an independent slice of the corpus, so the
// recurrent state for column b carries over from one window to
// the next without crossing into another column's text.

use burn::data::dataset::Dataset;

use crate::domain::window::TokenWindow;

pub struct BpttDataset {
    /// Row-major grid: grid[t * batch_size + b]
    grid:       Vec<u32>,
    rows:       usize,
    batch_size: usize,
    bptt:       usize,
}

impl BpttDataset {
    pub fn new(mut ids: Vec<u32>, pad_id: u32, batch_size: usize, bptt: usize) -> Self {
        let batch_size = batch_size.max(1);
        let bptt       = bptt.max(1);

        let padded_len = ids.len().div_ceil(batch_size) * batch_size;
        ids.resize(padded_len, pad_id);
        let rows = padded_len / batch_size;

        let mut grid = vec![pad_id; padded_len];
        for (b, column) in ids.chunks(rows.max(1)).enumerate() {
            for (t, &id) in column.iter().enumerate() {
                grid[t * batch_size + b] = id;
            }
        }

        Self { grid, rows, batch_size, bptt }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn bptt(&self) -> usize {
        self.bptt
    }

    /// Number of time steps per column.
    #[cfg(test)]
    pub fn rows(&self) -> usize {
        self.rows
    }

    fn rows_slice(&self, from: usize, to: usize) -> Vec<u32> {
        self.grid[from * self.batch_size..to * self.batch_size].to_vec()
    }
}

impl Dataset<TokenWindow> for BpttDataset {
    fn get(&self, index: usize) -> Option<TokenWindow> {
        let start = index.checked_mul(self.bptt)?;
        if start + 1 >= self.rows {
            return None;
        }
        let seq_len = self.bptt.min(self.rows - 1 - start);

        Some(TokenWindow::new(
            self.rows_slice(start, start + seq_len),
            self.rows_slice(start + 1, start + 1 + seq_len),
            seq_len,
            self.batch_size,
        ))
    }

    fn len(&self) -> usize {
        if self.rows < 2 {
            0
        } else {
            (self.rows - 1).div_ceil(self.bptt)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_columns_are_contiguous_slices() {
        let ds = BpttDataset::new((0..12).collect(), 99, 2, 2);
        assert_eq!(ds.rows(), 6);
        let w = ds.get(0).unwrap();
        assert_eq!(w.input,  vec![0, 6, 1, 7]);
        assert_eq!(w.target, vec![1, 7, 2, 8]);
    }

    #[test]
    fn test_window_count_and_short_tail() {
        let ds = BpttDataset::new((0..12).collect(), 99, 2, 2);
        assert_eq!(ds.len(), 3);

        let last = ds.get(2).unwrap();
        assert_eq!(last.seq_len, 1);
        assert_eq!(last.input,  vec![4, 10]);
        assert_eq!(last.target, vec![5, 11]);
        assert!(ds.get(3).is_none());
    }

    #[test]
    fn test_target_is_input_shifted_by_one() {
        let ds = BpttDataset::new((0..40).collect(), 0, 4, 3);
        for i in 0..ds.len() {
            let w = ds.get(i).unwrap();
            for t in 0..w.seq_len {
                for b in 0..w.batch_size {
                    assert_eq!(w.target_row(t)[b], w.input_row(t)[b] + 1);
                }
            }
        }
    }

    #[test]
    fn test_stream_is_padded_to_batch_multiple() {
        let ds = BpttDataset::new(vec![5, 6, 7], 1, 2, 35);
        assert_eq!(ds.rows(), 2);
        let w = ds.get(0).unwrap();
        assert_eq!(w.input,  vec![5, 7]);
        assert_eq!(w.target, vec![6, 1]);
    }

    #[test]
    fn test_too_short_stream_yields_nothing() {
        let ds = BpttDataset::new(vec![3], 1, 4, 35);
        assert_eq!(ds.len(), 0);
        assert!(ds.get(0).is_none());
    }
}
