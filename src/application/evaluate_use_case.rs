// ============================================================
// Layer 2 — Evaluate Use Case
// ============================================================
// Scores a saved model on one split:
//   1. Read train_config.json and tokenizer.json
//   2. Rebuild the stream with the saved vocabulary
//   3. Rebuild the model and load model_best
//   4. Run the evaluation loop

use anyhow::{ensure, Result};
use burn::{
    backend::{Autodiff, NdArray, Wgpu},
    data::dataset::Dataset,
    tensor::backend::AutodiffBackend,
};

use crate::application::train_use_case::{DeviceKind, TrainConfig};
use crate::data::{
    corpus::Corpus,
    dataset::BpttDataset,
    loader::WikiTextLoader,
    vocabulary::Vocabulary,
};
use crate::domain::{split::Split, traits::TokenSource};
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::evaluator::evaluate;

pub struct EvaluateUseCase {
    checkpoints: CheckpointManager,
    /// Overrides the data directory recorded at training time
    data_dir:    Option<String>,
    split:       Split,
    device:      Option<DeviceKind>,
    progress:    bool,
}

impl EvaluateUseCase {
    pub fn new(artifact_dir: &str, split: Split) -> Self {
        Self {
            checkpoints: CheckpointManager::open(artifact_dir),
            data_dir:    None,
            split,
            device:      None,
            progress:    true,
        }
    }

    pub fn with_data_dir(mut self, data_dir: Option<String>) -> Self {
        self.data_dir = data_dir;
        self
    }

    pub fn with_device(mut self, device: Option<DeviceKind>) -> Self {
        self.device = device;
        self
    }

    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    /// Returns the mean per-token loss on the chosen split.
    pub fn execute(&self) -> Result<f64> {
        let cfg        = self.checkpoints.load_config()?;
        let vocabulary = Vocabulary::from_file(self.checkpoints.vocabulary_path())?;

        let data_dir = self.data_dir.as_deref().unwrap_or(&cfg.data_dir);
        let lines    = WikiTextLoader::new(data_dir).load_lines(self.split)?;
        let stream   = Corpus::batchify(&vocabulary, &lines, cfg.batch_size, cfg.bptt)?;
        ensure!(
            stream.len() > 0,
            "The {} split is too short for batch size {}", self.split, cfg.batch_size
        );

        match self.device.unwrap_or(cfg.device) {
            DeviceKind::Cpu  => self.run::<Autodiff<NdArray>>(&cfg, vocabulary.len(), &stream, Default::default()),
            DeviceKind::Wgpu => self.run::<Autodiff<Wgpu>>(&cfg, vocabulary.len(), &stream, Default::default()),
        }
    }

    fn run<B: AutodiffBackend>(
        &self,
        cfg:        &TrainConfig,
        vocab_size: usize,
        stream:     &BpttDataset,
        device:     B::Device,
    ) -> Result<f64> {
        let model = cfg.model_config(vocab_size).init::<B>(&device)?;
        let model = self.checkpoints.load_model(model, &device)?;

        let label = self.split.to_string();
        let loss  = evaluate(&model, stream, &label, self.progress)?;

        println!("{}", "=".repeat(89));
        println!("| {} loss {:5.2} | {} ppl {:8.2}", label, loss, label, loss.exp());
        println!("{}", "=".repeat(89));
        Ok(loss)
    }
}
