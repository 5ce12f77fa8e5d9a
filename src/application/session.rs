// ============================================================
// Layer 2 — Training Session
// ============================================================
// The epoch driver.
//
//   Idle ──► Running(1) ──► … ──► Running(N) ──► Completed
//                 │                     │
//                 └──── Interrupted ◄───┘ ──► Completed
//
// Every epoch trains on the train stream and then scores the
// valid stream. Ctrl-C ends the epoch loop but never the run:
// the test stream is always scored before returning.
//
// Optional hooks, both off by default:
//   save-best  checkpoint on every improvement, reload before test
//   anneal     lr /= 4 when validation loss does not improve

use std::time::Instant;

use anyhow::{ensure, Result};
use burn::{optim::Optimizer, tensor::backend::AutodiffBackend};

use crate::application::train_use_case::TrainConfig;
use crate::data::corpus::CorpusProvider;
use crate::domain::split::Split;
use crate::infra::{
    checkpoint::{BestCheckpoint, CheckpointManager},
    interrupt::InterruptFlag,
    metrics::{EpochMetrics, MetricsLogger},
};
use crate::ml::{
    evaluator::evaluate,
    model::LanguageModel,
    trainer::{train_epoch, EpochOutcome, EpochSettings},
};

const ANNEAL_FACTOR: f64 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Idle,
    Running { epoch: usize },
    Interrupted,
    Completed,
}

/// What a finished run hands back to the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingReport {
    /// Epochs that went through both training and validation
    pub epochs_completed: usize,
    pub interrupted:      bool,
    pub best_val_loss:    Option<f64>,
    pub final_lr:         f64,
    pub test_loss:        f64,
}

impl TrainingReport {
    pub fn test_ppl(&self) -> f64 {
        self.test_loss.exp()
    }
}

pub struct TrainingSession<B, O, C>
where
    B: AutodiffBackend,
    O: Optimizer<LanguageModel<B>, B>,
    C: CorpusProvider,
{
    config:        TrainConfig,
    model:         LanguageModel<B>,
    optim:         O,
    corpus:        C,
    interrupt:     InterruptFlag,
    lr:            f64,
    best_val_loss: Option<f64>,
    /// Checkpoint written by this session, if any
    saved:         Option<BestCheckpoint>,
    state:         DriverState,
    checkpoints:   Option<CheckpointManager>,
    metrics:       Option<MetricsLogger>,
}

impl<B, O, C> TrainingSession<B, O, C>
where
    B: AutodiffBackend,
    O: Optimizer<LanguageModel<B>, B>,
    C: CorpusProvider,
{
    pub fn new(
        config:    TrainConfig,
        model:     LanguageModel<B>,
        optim:     O,
        corpus:    C,
        interrupt: InterruptFlag,
    ) -> Self {
        let lr = config.lr;
        Self {
            config,
            model,
            optim,
            corpus,
            interrupt,
            lr,
            best_val_loss: None,
            saved:         None,
            state:         DriverState::Idle,
            checkpoints:   None,
            metrics:       None,
        }
    }

    /// Enable the save-best hook.
    pub fn with_checkpoints(mut self, checkpoints: CheckpointManager) -> Self {
        self.checkpoints = Some(checkpoints);
        self
    }

    pub fn with_metrics(mut self, metrics: MetricsLogger) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn corpus(&self) -> &C {
        &self.corpus
    }

    #[cfg(test)]
    pub fn state(&self) -> DriverState {
        self.state
    }

    #[cfg(test)]
    pub fn lr(&self) -> f64 {
        self.lr
    }

    fn enter(&mut self, next: DriverState) {
        match next {
            DriverState::Running { epoch } => tracing::debug!("Driver: epoch {epoch}"),
            other => tracing::debug!("Driver: {:?} -> {:?}", self.state, other),
        }
        self.state = next;
    }

    /// Train for the configured number of epochs, then score the test set.
    pub fn run(mut self) -> Result<TrainingReport> {
        let mut epochs_completed = 0;

        for epoch in 1..=self.config.epochs {
            if self.interrupt.is_raised() {
                self.enter(DriverState::Interrupted);
                break;
            }
            self.enter(DriverState::Running { epoch });

            let epoch_start = Instant::now();
            let settings = EpochSettings {
                epoch,
                lr:             self.lr,
                log_interval:   self.config.log_interval,
                grad_clip_norm: self.config.clip,
                show_progress:  self.config.progress,
            };

            let (model, outcome) = train_epoch(
                self.model,
                &mut self.optim,
                self.corpus.stream(Split::Train),
                &settings,
                &self.interrupt,
            )?;
            self.model = model;

            match outcome {
                EpochOutcome::Completed { batches } => {
                    tracing::debug!("Epoch {epoch} trained on {batches} batches");
                }
                EpochOutcome::Interrupted { batches } => {
                    tracing::debug!("Epoch {epoch} stopped after {batches} batches");
                    self.enter(DriverState::Interrupted);
                    break;
                }
            }

            let val_loss = evaluate(
                &self.model,
                self.corpus.stream(Split::Valid),
                "valid",
                self.config.progress,
            )?;
            let elapsed = epoch_start.elapsed().as_secs_f64();

            println!("{}", "-".repeat(89));
            println!(
                "| end of epoch {:3} | time: {:5.2}s | valid loss {:5.2} | valid ppl {:8.2}",
                epoch, elapsed, val_loss, val_loss.exp(),
            );
            println!("{}", "-".repeat(89));

            epochs_completed += 1;
            self.record_validation(EpochMetrics::new(epoch, self.lr, elapsed, val_loss))?;
        }

        let interrupted = self.state == DriverState::Interrupted;
        if interrupted {
            println!("{}", "-".repeat(89));
            println!("Exiting from training early");
        }

        self.restore_best()?;

        let test_loss = evaluate(
            &self.model,
            self.corpus.stream(Split::Test),
            "test",
            self.config.progress,
        )?;
        println!("{}", "=".repeat(89));
        println!(
            "| End of training | test loss {:5.2} | test ppl {:8.2}",
            test_loss, test_loss.exp(),
        );
        println!("{}", "=".repeat(89));

        self.enter(DriverState::Completed);

        Ok(TrainingReport {
            epochs_completed,
            interrupted,
            best_val_loss: self.best_val_loss,
            final_lr:      self.lr,
            test_loss,
        })
    }

    /// Apply the per-epoch hooks to a fresh validation score.
    fn record_validation(&mut self, metrics: EpochMetrics) -> Result<()> {
        if let Some(logger) = &self.metrics {
            logger.log(&metrics)?;
        }

        if metrics.is_improvement(self.best_val_loss) {
            self.best_val_loss = Some(metrics.val_loss);
            if let Some(checkpoints) = &self.checkpoints {
                let best = BestCheckpoint { epoch: metrics.epoch, val_loss: metrics.val_loss };
                checkpoints.save_model(&self.model, best)?;
                self.saved = Some(best);
            }
        } else if self.config.anneal {
            self.lr /= ANNEAL_FACTOR;
            tracing::info!("Validation loss did not improve, lr annealed to {:.2e}", self.lr);
        }
        Ok(())
    }

    /// With save-best on, test with the best weights rather than the last.
    fn restore_best(&mut self) -> Result<()> {
        let Some(checkpoints) = &self.checkpoints else {
            return Ok(());
        };
        // Only weights saved by this run count; the directory may hold older ones.
        let Some(saved) = self.saved else {
            tracing::info!("No checkpoint was saved, testing the current weights");
            return Ok(());
        };
        let on_disk = checkpoints.best()?;
        ensure!(
            on_disk == saved,
            "Checkpoint in '{}' was overwritten during training (expected epoch {}, found epoch {})",
            checkpoints.dir().display(), saved.epoch, on_disk.epoch
        );
        let device = self.model.device();
        self.model = checkpoints.load_model(self.model.clone(), &device)?;
        Ok(())
    }
}
