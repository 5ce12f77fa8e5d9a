// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates a training run in order:
//
//   Step 1: Validate the configuration    (fatal before any work)
//   Step 2: Read the WikiText splits      (Layer 4 - data)
//   Step 3: Build vocabulary + streams    (Layer 4 - data)
//   Step 4: Install the Ctrl-C listener   (Layer 6 - infra)
//   Step 5: Pick the backend and seed it
//   Step 6: Build model + Adam            (Layer 5 - ml)
//   Step 7: Optional artifacts            (Layer 6 - infra)
//   Step 8: Run the training session      (Layer 2 - session)

use anyhow::{ensure, Result};
use burn::{
    backend::{Autodiff, NdArray, Wgpu},
    optim::AdamConfig,
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use serde::{Deserialize, Serialize};

use crate::application::session::{TrainingReport, TrainingSession};
use crate::data::{
    corpus::{Corpus, CorpusProvider},
    loader::WikiTextLoader,
};
use crate::infra::{
    checkpoint::CheckpointManager,
    interrupt::{install_ctrl_c_handler, InterruptFlag},
    metrics::MetricsLogger,
};
use crate::ml::model::{LanguageModel, LanguageModelConfig};

// ─── Device ──────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    /// Autodiff<NdArray>
    #[default]
    Cpu,
    /// Autodiff<Wgpu>
    Wgpu,
}

// ─── Training Configuration ──────────────────────────────────────────────────
// All hyperparameters for a training run. Fixed at process start.
// Serialisable so `evaluate` can rebuild the same architecture.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub data_dir:     String,
    pub artifact_dir: String,
    pub batch_size:   usize,
    /// Time steps per truncated-BPTT window
    pub bptt:         usize,
    pub epochs:       usize,
    pub lr:           f64,
    pub log_interval: usize,
    /// Embedding size
    pub emsize:       usize,
    /// Hidden units per LSTM layer
    pub nhid:         usize,
    pub nlayers:      usize,
    pub dropout:      f64,
    pub tied:         bool,
    /// Ceiling on the global gradient norm
    pub clip:         f64,
    pub device:       DeviceKind,
    pub seed:         Option<u64>,
    pub save_best:    bool,
    pub anneal:       bool,
    pub log_metrics:  bool,
    pub progress:     bool,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            data_dir:     "data/wikitext-2".to_string(),
            artifact_dir: "artifacts".to_string(),
            batch_size:   64,
            bptt:         35,
            epochs:       50,
            lr:           0.001,
            log_interval: 100,
            emsize:       64,
            nhid:         64,
            nlayers:      1,
            dropout:      0.2,
            tied:         false,
            clip:         0.25,
            device:       DeviceKind::Cpu,
            seed:         None,
            save_best:    false,
            anneal:       false,
            log_metrics:  false,
            progress:     true,
        }
    }
}

impl TrainConfig {
    /// Reject settings that cannot produce a valid run.
    pub fn validate(&self) -> Result<()> {
        ensure!(self.batch_size > 0,   "batch size must be at least 1");
        ensure!(self.bptt > 0,         "bptt must be at least 1");
        ensure!(self.log_interval > 0, "log interval must be at least 1");
        ensure!(self.emsize > 0 && self.nhid > 0, "embedding and hidden sizes must be positive");
        ensure!(self.nlayers > 0,      "the model needs at least one LSTM layer");
        ensure!(
            self.lr.is_finite() && self.lr > 0.0,
            "learning rate must be a positive number, got {}", self.lr
        );
        ensure!(
            (0.0..1.0).contains(&self.dropout),
            "dropout must be in [0, 1), got {}", self.dropout
        );
        ensure!(
            self.clip.is_finite() && self.clip > 0.0,
            "gradient clip norm must be positive, got {}", self.clip
        );
        ensure!(
            !self.tied || self.emsize == self.nhid,
            "When using the tied flag, nhid ({}) must be equal to emsize ({})",
            self.nhid, self.emsize
        );
        Ok(())
    }

    pub fn model_config(&self, vocab_size: usize) -> LanguageModelConfig {
        LanguageModelConfig::new(vocab_size)
            .with_embedding_dim(self.emsize)
            .with_hidden_dim(self.nhid)
            .with_num_layers(self.nlayers)
            .with_dropout(self.dropout)
            .with_tie_weights(self.tied)
    }

    /// Adam with beta1 = 0: no momentum on the first moment.
    pub fn optimizer(&self) -> AdamConfig {
        AdamConfig::new()
            .with_beta_1(0.0)
            .with_beta_2(0.999)
            .with_epsilon(1e-9)
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Execute the full training pipeline end to end
    pub fn execute(&self) -> Result<TrainingReport> {
        let cfg = &self.config;

        // ── Step 1: Fail fast on bad settings ───────────────────────────────
        cfg.validate()?;

        // ── Steps 2-3: Corpus ───────────────────────────────────────────────
        tracing::info!("Loading WikiText from '{}'", cfg.data_dir);
        let loader = WikiTextLoader::new(&cfg.data_dir);
        let corpus = Corpus::load(&loader, cfg.batch_size, cfg.bptt)?;
        tracing::info!("Vocabulary size: {}", corpus.vocab_size());

        // ── Step 4: Ctrl-C ──────────────────────────────────────────────────
        let interrupt = InterruptFlag::new();
        install_ctrl_c_handler(interrupt.clone())?;

        // ── Step 5: Backend dispatch ────────────────────────────────────────
        match cfg.device {
            DeviceKind::Cpu  => self.run::<Autodiff<NdArray>>(corpus, interrupt, Default::default()),
            DeviceKind::Wgpu => self.run::<Autodiff<Wgpu>>(corpus, interrupt, Default::default()),
        }
    }

    fn run<B: AutodiffBackend>(
        &self,
        corpus:    Corpus,
        interrupt: InterruptFlag,
        device:    B::Device,
    ) -> Result<TrainingReport> {
        let cfg = &self.config;

        if let Some(seed) = cfg.seed {
            B::seed(seed);
        }

        // ── Step 6: Model + optimizer ───────────────────────────────────────
        let model = cfg.model_config(corpus.vocab_size()).init::<B>(&device)?;
        tracing::info!(
            "Model: vocab {}, {} layer(s), emsize {}, nhid {}, tied {}, {} parameters",
            model.vocab_size(), model.num_layers(), cfg.emsize, cfg.nhid, model.is_tied(), model.num_params()
        );
        let optim = cfg.optimizer().init::<B, LanguageModel<B>>();

        // ── Step 7: Artifacts, only when asked for ──────────────────────────
        let mut session = TrainingSession::new(cfg.clone(), model, optim, corpus, interrupt);

        if cfg.save_best {
            let checkpoints = CheckpointManager::create(&cfg.artifact_dir)?;
            tracing::info!("Saving the best model to '{}'", checkpoints.dir().display());
            checkpoints.save_config(cfg)?;
            session.corpus().vocabulary().save(checkpoints.vocabulary_path())?;
            session = session.with_checkpoints(checkpoints);
        }
        if cfg.log_metrics {
            let metrics = MetricsLogger::new(&cfg.artifact_dir)?;
            tracing::info!("Logging epoch metrics to '{}'", metrics.csv_path().display());
            session = session.with_metrics(metrics);
        }

        // ── Step 8: Train ───────────────────────────────────────────────────
        session.run()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = TrainConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.batch_size, 64);
        assert_eq!(cfg.epochs, 50);
        assert_eq!(cfg.log_interval, 100);
        assert_eq!(cfg.clip, 0.25);
        assert!(!cfg.tied);
        assert!(!cfg.save_best && !cfg.anneal && !cfg.log_metrics);
    }

    #[test]
    fn test_tied_with_mismatched_sizes_is_rejected() {
        let cfg = TrainConfig { tied: true, nhid: 32, ..TrainConfig::default() };
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("tied"));
    }

    #[test]
    fn test_zero_sizes_are_rejected() {
        for cfg in [
            TrainConfig { batch_size: 0, ..TrainConfig::default() },
            TrainConfig { bptt: 0, ..TrainConfig::default() },
            TrainConfig { log_interval: 0, ..TrainConfig::default() },
            TrainConfig { nlayers: 0, ..TrainConfig::default() },
            TrainConfig { dropout: 1.0, ..TrainConfig::default() },
            TrainConfig { lr: f64::NAN, ..TrainConfig::default() },
        ] {
            assert!(cfg.validate().is_err(), "{cfg:?}");
        }
    }

    #[test]
    fn test_model_config_carries_hyperparameters() {
        let cfg = TrainConfig { emsize: 32, nhid: 32, nlayers: 2, tied: true, ..TrainConfig::default() };
        let mc  = cfg.model_config(100);
        assert_eq!(mc.vocab_size, 100);
        assert_eq!(mc.embedding_dim, 32);
        assert_eq!(mc.hidden_dim, 32);
        assert_eq!(mc.num_layers, 2);
        assert!(mc.tie_weights);
    }

    #[test]
    fn test_device_serialises_lowercase() {
        let json = serde_json::to_string(&DeviceKind::Wgpu).unwrap();
        assert_eq!(json, "\"wgpu\"");
    }
}
