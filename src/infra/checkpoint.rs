// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores model weights using Burn's CompactRecorder.
//
// Only used when best-model saving is switched on, and by the
// `evaluate` command. The default training run writes nothing.
//
// File layout:
//   artifacts/
//     model_best.mpk      ← weights with the lowest valid loss
//     best.json           ← epoch and valid loss of that save
//     train_config.json   ← hyperparameters to rebuild the model
//     tokenizer.json      ← vocabulary used for training

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::{Path, PathBuf}};
use burn::{
    prelude::*,
    record::{CompactRecorder, Recorder},
};

use crate::application::train_use_case::TrainConfig;
use crate::ml::model::LanguageModel;

const MODEL_FILE:  &str = "model_best";
/// MODEL_FILE plus the extension CompactRecorder appends
const MODEL_RECORD_FILE: &str = "model_best.mpk";
const BEST_FILE:   &str = "best.json";
const CONFIG_FILE: &str = "train_config.json";
const VOCAB_FILE:  &str = "tokenizer.json";

/// Which epoch the saved weights come from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BestCheckpoint {
    pub epoch:    usize,
    pub val_loss: f64,
}

/// Manages saving and loading of model checkpoints.
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Create the manager for a new run, creating `dir` if needed.
    /// A best model left by an earlier run is removed.
    pub fn create(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create artifact directory '{}'", dir.display()))?;

        for stale in [BEST_FILE, MODEL_RECORD_FILE] {
            let path = dir.join(stale);
            if path.exists() {
                fs::remove_file(&path)
                    .with_context(|| format!("Cannot remove stale '{}'", path.display()))?;
                tracing::debug!("Removed stale '{}'", path.display());
            }
        }
        Ok(Self { dir })
    }

    /// Open an existing artifact directory for reading.
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn vocabulary_path(&self) -> PathBuf {
        self.dir.join(VOCAB_FILE)
    }

    /// Overwrite the best-model checkpoint.
    pub fn save_model<B: Backend>(&self, model: &LanguageModel<B>, best: BestCheckpoint) -> Result<()> {
        let path = self.dir.join(MODEL_FILE);

        CompactRecorder::new()
            .record(model.clone().into_record(), path.clone())
            .with_context(|| {
                format!("Failed to save checkpoint to '{}'", path.display())
            })?;

        let best_path = self.dir.join(BEST_FILE);
        fs::write(&best_path, serde_json::to_string(&best)?)
            .with_context(|| format!("Failed to write '{}'", best_path.display()))?;

        tracing::debug!("Saved checkpoint: epoch {}, valid loss {:.4}", best.epoch, best.val_loss);
        Ok(())
    }

    /// Load the best weights into `model` (which must have the same architecture).
    pub fn load_model<B: Backend>(
        &self,
        model:  LanguageModel<B>,
        device: &B::Device,
    ) -> Result<LanguageModel<B>> {
        let best = self.best()?;
        let path = self.dir.join(MODEL_FILE);

        tracing::info!("Loading checkpoint from epoch {} (valid loss {:.2})", best.epoch, best.val_loss);

        let record = CompactRecorder::new()
            .load(path.clone(), device)
            .with_context(|| {
                format!("Cannot load checkpoint '{}'. Was it trained with --save-best?",
                    path.display())
            })?;

        Ok(model.load_record(record))
    }

    /// Metadata of the saved checkpoint.
    pub fn best(&self) -> Result<BestCheckpoint> {
        let path = self.dir.join(BEST_FILE);
        let s = fs::read_to_string(&path)
            .with_context(|| format!("Cannot find '{}'. Has a model been saved?", path.display()))?;
        Ok(serde_json::from_str(&s)?)
    }

    /// Save the training configuration to JSON.
    pub fn save_config(&self, cfg: &TrainConfig) -> Result<()> {
        let path = self.dir.join(CONFIG_FILE);
        let json = serde_json::to_string_pretty(cfg)?;

        fs::write(&path, json)
            .with_context(|| {
                format!("Cannot write config to '{}'", path.display())
            })?;

        tracing::debug!("Saved training config to '{}'", path.display());
        Ok(())
    }

    /// Load the training configuration from JSON.
    pub fn load_config(&self) -> Result<TrainConfig> {
        let path = self.dir.join(CONFIG_FILE);

        let json = fs::read_to_string(&path)
            .with_context(|| {
                format!(
                    "Cannot read config from '{}'. \
                     Make sure you have run 'train --save-best' first.",
                    path.display()
                )
            })?;

        Ok(serde_json::from_str(&json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::model::LanguageModelConfig;
    use burn::backend::NdArray;

    #[test]
    fn test_model_round_trip_restores_weights() {
        let dir     = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::create(dir.path()).unwrap();
        let device  = Default::default();
        let config  = LanguageModelConfig::new(10).with_embedding_dim(4).with_hidden_dim(4);

        let saved = config.init::<NdArray>(&device).unwrap();
        assert!(manager.best().is_err());
        manager.save_model(&saved, BestCheckpoint { epoch: 3, val_loss: 4.5 }).unwrap();
        assert!(dir.path().join(MODEL_RECORD_FILE).exists());

        let fresh  = config.init::<NdArray>(&device).unwrap();
        let loaded = manager.load_model(fresh, &device).unwrap();

        // CompactRecorder stores half precision.
        for (a, b) in saved.parameter_snapshot().iter().zip(loaded.parameter_snapshot()) {
            assert!((a - b).abs() < 1e-3);
        }
        assert_eq!(manager.best().unwrap().epoch, 3);
    }

    #[test]
    fn test_config_round_trip() {
        let dir     = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::create(dir.path()).unwrap();
        let cfg     = TrainConfig { epochs: 7, tied: true, ..TrainConfig::default() };
        manager.save_config(&cfg).unwrap();

        let loaded = manager.load_config().unwrap();
        assert_eq!(loaded.epochs, 7);
        assert!(loaded.tied);
    }

    #[test]
    fn test_create_removes_best_model_of_earlier_run() {
        let dir    = tempfile::tempdir().unwrap();
        let device = Default::default();
        let model  = LanguageModelConfig::new(10)
            .with_embedding_dim(4)
            .with_hidden_dim(4)
            .init::<NdArray>(&device)
            .unwrap();
        let cfg    = TrainConfig::default();

        let first = CheckpointManager::create(dir.path()).unwrap();
        first.save_config(&cfg).unwrap();
        first.save_model(&model, BestCheckpoint { epoch: 5, val_loss: 3.0 }).unwrap();

        let second = CheckpointManager::create(dir.path()).unwrap();
        assert!(second.best().is_err());
        assert!(!dir.path().join(MODEL_RECORD_FILE).exists());
        // the config is rewritten by every run, so it is left alone
        assert!(second.load_config().is_ok());
    }

    #[test]
    fn test_missing_checkpoint_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::open(dir.path());
        assert!(manager.best().is_err());
    }
}
