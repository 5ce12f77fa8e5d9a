// ============================================================
// Layer 5 — Evaluation Loop
// ============================================================
// Scores a stream without touching the weights.
//
// model.valid() hands back the same parameters on the inner
// (non-autodiff) backend: dropout is off and there is no graph
// to record into, for the whole pass and on every exit path.
//
// Each batch contributes seq_len * mean_loss, and the sum is
// divided by (num_batches - 1), the normalisation used by the
// classic word-language-model example.

use anyhow::{ensure, Context, Result};
use burn::{
    data::{dataloader::batcher::Batcher, dataset::Dataset},
    module::AutodiffModule,
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use crate::data::batcher::LmBatcher;
use crate::domain::window::TokenWindow;
use crate::infra::progress::BatchProgress;
use crate::ml::{model::{LanguageModel, Mode}, state::RecurrentState};

/// Mean per-token loss of `model` over `data`, in evaluation mode.
pub fn evaluate<B: AutodiffBackend>(
    model:         &LanguageModel<B>,
    data:          &dyn Dataset<TokenWindow>,
    label:         &str,
    show_progress: bool,
) -> Result<f64> {
    let model = model.valid();
    evaluate_pass(&model, data, label, show_progress)
}

fn evaluate_pass<B: Backend>(
    model:         &LanguageModel<B>,
    data:          &dyn Dataset<TokenWindow>,
    label:         &str,
    show_progress: bool,
) -> Result<f64> {
    debug_assert_eq!(model.mode(), Mode::Eval);

    let num_batches = data.len();
    ensure!(num_batches > 0, "Cannot evaluate on an empty {label} stream");

    let batcher  = LmBatcher::<B>::new(model.device());
    let progress = BatchProgress::new(num_batches, label, show_progress);

    let mut state: Option<RecurrentState<B>> = None;
    let mut total_loss = 0.0f64;

    for i in 0..num_batches {
        let window = data
            .get(i)
            .with_context(|| format!("{label} stream ended early at batch {i} of {num_batches}"))?;
        let batch    = batcher.batch(vec![window]);
        let seq_len  = batch.seq_len();
        let state_in = state.take().unwrap_or_else(|| model.init_state(batch.batch_size()));

        let (loss, next_state) = model.forward_loss(batch.input, batch.target, state_in)?;
        total_loss += seq_len as f64 * loss.into_scalar().elem::<f64>();
        state = Some(next_state.detach());
        progress.inc();
    }

    progress.finish();
    Ok(total_loss / weighted_loss_denominator(num_batches))
}

/// `num_batches - 1`, floored at 1 so a single-batch stream stays finite.
fn weighted_loss_denominator(num_batches: usize) -> f64 {
    num_batches.saturating_sub(1).max(1) as f64
}
