// ============================================================
// Layer 5 — Training Loop
// ============================================================
// One epoch of truncated-BPTT training with Adam.
//
// Per batch, in order:
//   1. detach the carried state (backprop stops at the window edge)
//   2. gradients start empty: backward() builds a fresh set every step
//   3. forward pass with the carried state
//   4. next-token cross-entropy over [seq_len * batch, vocab]
//   5. backward
//   6. clip the global gradient norm
//   7. Adam step
//   8. running loss → status line every `log_interval` batches
//
// The interrupt flag is polled between batches.

use std::time::Instant;

use anyhow::{ensure, Context, Result};
use burn::{
    data::{dataloader::batcher::Batcher, dataset::Dataset},
    optim::{GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use crate::data::batcher::{LmBatch, LmBatcher};
use crate::domain::window::TokenWindow;
use crate::infra::{interrupt::InterruptFlag, progress::BatchProgress};
use crate::ml::{
    clipping::clip_grad_norm,
    model::{LanguageModel, Mode},
    state::RecurrentState,
};

/// Knobs that stay fixed for the length of one epoch.
#[derive(Debug, Clone)]
pub struct EpochSettings {
    pub epoch:          usize,
    pub lr:             f64,
    pub log_interval:   usize,
    pub grad_clip_norm: f64,
    pub show_progress:  bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpochOutcome {
    Completed   { batches: usize },
    Interrupted { batches: usize },
}

#[derive(Debug, Clone, Copy)]
pub struct StepStats {
    pub loss:      f64,
    /// Global gradient norm before clipping
    pub grad_norm: f64,
}

/// A single forward/backward/update on one batch.
pub fn train_step<B, O>(
    model:          LanguageModel<B>,
    optim:          &mut O,
    batch:          LmBatch<B>,
    state:          RecurrentState<B>,
    lr:             f64,
    grad_clip_norm: f64,
) -> Result<(LanguageModel<B>, RecurrentState<B>, StepStats)>
where
    B: AutodiffBackend,
    O: Optimizer<LanguageModel<B>, B>,
{
    let state = state.detach();

    let (loss, state) = model.forward_loss(batch.input, batch.target, state)?;
    let loss_value: f64 = loss.clone().into_scalar().elem::<f64>();
    ensure!(loss_value.is_finite(), "Training loss became non-finite ({loss_value})");

    let grads = loss.backward();
    let mut grads = GradientsParams::from_grads(grads, &model);
    let grad_norm = clip_grad_norm::<B, _>(&model, &mut grads, grad_clip_norm);

    let model = optim.step(lr, model, grads);
    Ok((model, state, StepStats { loss: loss_value, grad_norm }))
}

/// Run `model` once over `data` in stream order.
pub fn train_epoch<B, O>(
    mut model: LanguageModel<B>,
    optim:     &mut O,
    data:      &dyn Dataset<TokenWindow>,
    settings:  &EpochSettings,
    interrupt: &InterruptFlag,
) -> Result<(LanguageModel<B>, EpochOutcome)>
where
    B: AutodiffBackend,
    O: Optimizer<LanguageModel<B>, B>,
{
    debug_assert_eq!(model.mode(), Mode::Train);

    let num_batches  = data.len();
    let log_interval = settings.log_interval.max(1);
    let batcher      = LmBatcher::<B>::new(model.device());
    let progress     = BatchProgress::new(num_batches, &format!("epoch {}", settings.epoch), settings.show_progress);

    let mut state: Option<RecurrentState<B>> = None;
    let mut total_loss = 0.0f64;
    let mut start_time = Instant::now();

    for i in 0..num_batches {
        if interrupt.is_raised() {
            progress.finish();
            tracing::debug!("Epoch {} interrupted after {} batches", settings.epoch, i);
            return Ok((model, EpochOutcome::Interrupted { batches: i }));
        }

        let window = data
            .get(i)
            .with_context(|| format!("Training stream ended early at batch {i} of {num_batches}"))?;
        let batch    = batcher.batch(vec![window]);
        let state_in = state.take().unwrap_or_else(|| model.init_state(batch.batch_size()));

        let (next_model, next_state, step) =
            train_step(model, optim, batch, state_in, settings.lr, settings.grad_clip_norm)?;
        model = next_model;
        state = Some(next_state);
        total_loss += step.loss;
        progress.inc();

        if i % log_interval == 0 && i > 0 {
            let cur_loss = total_loss / log_interval as f64;
            let ms_per_batch = start_time.elapsed().as_secs_f64() * 1000.0 / log_interval as f64;
            progress.println(&format!(
                "| epoch {:3} | {:5}/{:5} batches | lr {:.2e} | ms/batch {:5.2} | loss {:5.2} | ppl {:8.2}",
                settings.epoch, i, num_batches, settings.lr, ms_per_batch, cur_loss, cur_loss.exp(),
            ));
            tracing::debug!(epoch = settings.epoch, batch = i, loss = cur_loss, grad_norm = step.grad_norm, "training status");
            total_loss = 0.0;
            start_time = Instant::now();
        }
    }

    progress.finish();
    Ok((model, EpochOutcome::Completed { batches: num_batches }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::dataset::BpttDataset;
    use crate::ml::model::LanguageModelConfig;
    use burn::backend::{Autodiff, NdArray};
    use burn::optim::AdamConfig;

    type TestBackend = Autodiff<NdArray>;

    fn toy_model(tied: bool) -> LanguageModel<TestBackend> {
        LanguageModelConfig::new(10)
            .with_embedding_dim(4)
            .with_hidden_dim(4)
            .with_num_layers(1)
            .with_tie_weights(tied)
            .init::<TestBackend>(&Default::default())
            .unwrap()
    }

    fn adam() -> AdamConfig {
        AdamConfig::new().with_beta_1(0.0).with_beta_2(0.999).with_epsilon(1e-9)
    }

    /// Two batches of (seq_len 3, batch 2) over a vocabulary of 10.
    fn two_batches() -> BpttDataset {
        let ids: Vec<u32> = (0..14).map(|i| i % 10).collect();
        BpttDataset::new(ids, 1, 2, 3)
    }

    fn settings() -> EpochSettings {
        EpochSettings { epoch: 1, lr: 0.01, log_interval: 100, grad_clip_norm: 0.25, show_progress: false }
    }

    #[test]
    fn test_one_step_gives_finite_loss_and_moves_parameters() {
        let model  = toy_model(false);
        let before = model.parameter_snapshot();
        let mut optim = adam().init();

        let data    = two_batches();
        assert_eq!(data.len(), 2);
        let batcher = LmBatcher::<TestBackend>::new(Default::default());
        let batch   = batcher.batch(vec![data.get(0).unwrap()]);
        let state   = model.init_state(2);

        let (model, _, step) = train_step(model, &mut optim, batch, state, 0.01, 0.25).unwrap();
        assert!(step.loss.is_finite());
        assert!(step.grad_norm > 0.0);

        let after = model.parameter_snapshot();
        assert!(before.iter().zip(&after).any(|(a, b)| a != b));
    }

    #[test]
    fn test_tied_weights_stay_identical_after_update() {
        let model   = toy_model(true);
        let initial = model.embedding_weight().to_data();
        let mut optim = adam().init();
        let (model, outcome) = train_epoch(
            model, &mut optim, &two_batches(), &settings(), &InterruptFlag::new(),
        ).unwrap();

        assert_eq!(outcome, EpochOutcome::Completed { batches: 2 });
        assert_eq!(model.embedding_param_id(), model.projection_param_id());

        // the update landed, and both roles see it
        let embedding  = model.embedding_weight().to_data();
        let projection = model.projection_weight().to_data();
        assert_ne!(embedding, initial);
        assert_ne!(projection, initial);
        assert_eq!(embedding, projection);
    }

    #[test]
    fn test_raised_flag_stops_before_next_batch() {
        let interrupt = InterruptFlag::new();
        interrupt.raise();

        let model  = toy_model(false);
        let before = model.parameter_snapshot();
        let mut optim = adam().init();
        let (model, outcome) = train_epoch(
            model, &mut optim, &two_batches(), &settings(), &interrupt,
        ).unwrap();

        assert_eq!(outcome, EpochOutcome::Interrupted { batches: 0 });
        assert_eq!(model.parameter_snapshot(), before);
    }

    #[test]
    fn test_non_finite_loss_is_an_error() {
        let device = Default::default();
        let model  = toy_model(false);
        let mut optim = adam().init();
        let batcher = LmBatcher::<TestBackend>::new(device);
        let batch   = batcher.batch(vec![two_batches().get(0).unwrap()]);
        let state   = model.init_state(2);

        // NaN learning rate poisons the weights on the first update.
        let (model, state, _) = train_step(model, &mut optim, batch.clone(), state, f64::NAN, 0.25).unwrap();
        let err = train_step(model, &mut optim, batch, state, 0.01, 0.25).err().unwrap();
        assert!(err.to_string().contains("non-finite"));
    }
}
