// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Appends one CSV row per epoch when --log-metrics is on.
//
// Output file: artifacts/metrics.csv
//
//   epoch,lr,elapsed_secs,val_loss,val_ppl
//   1,0.001000,41.203100,5.812300,334.720000
//   2,0.001000,40.987400,5.501200,245.010000

use anyhow::{Context, Result};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};
use serde::{Deserialize, Serialize};

const HEADER: &str = "epoch,lr,elapsed_secs,val_loss,val_ppl";

/// Validation summary of one finished epoch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub epoch:        usize,
    /// Learning rate the epoch was trained with
    pub lr:           f64,
    pub elapsed_secs: f64,
    pub val_loss:     f64,
}

impl EpochMetrics {
    pub fn new(epoch: usize, lr: f64, elapsed_secs: f64, val_loss: f64) -> Self {
        Self { epoch, lr, elapsed_secs, val_loss }
    }

    pub fn val_ppl(&self) -> f64 {
        self.val_loss.exp()
    }

    /// True if this epoch beats the best validation loss so far.
    /// `None` means no epoch has been scored yet.
    pub fn is_improvement(&self, best_val_loss: Option<f64>) -> bool {
        best_val_loss.map_or(true, |best| self.val_loss < best)
    }
}

/// Logs epoch metrics to a CSV file for later analysis.
pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Writes the header if the file doesn't exist yet, so
    /// consecutive runs append to the same log.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create '{}'", dir.display()))?;

        let csv_path = dir.join("metrics.csv");
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)
                .with_context(|| format!("Cannot create '{}'", csv_path.display()))?;
            writeln!(f, "{HEADER}")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    pub fn log(&self, m: &EpochMetrics) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot open '{}'", self.csv_path.display()))?;

        writeln!(
            f,
            "{},{:.6},{:.6},{:.6},{:.6}",
            m.epoch,
            m.lr,
            m.elapsed_secs,
            m.val_loss,
            m.val_ppl(),
        )?;

        tracing::debug!("Logged epoch {} metrics: val_loss={:.4}", m.epoch, m.val_loss);
        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_improvement() {
        let m = EpochMetrics::new(2, 1e-3, 1.0, 2.3);
        assert!(m.is_improvement(None));
        assert!(m.is_improvement(Some(3.0)));
        assert!(!m.is_improvement(Some(2.0)));
        // equal is not better
        assert!(!m.is_improvement(Some(2.3)));
    }

    #[test]
    fn test_rows_are_appended_after_header() {
        let dir    = tempfile::tempdir().unwrap();
        let logger = MetricsLogger::new(dir.path()).unwrap();
        logger.log(&EpochMetrics::new(1, 1e-3, 2.5, 0.0)).unwrap();
        logger.log(&EpochMetrics::new(2, 2.5e-4, 2.0, 1.0)).unwrap();

        // reopening must not duplicate the header
        let again = MetricsLogger::new(dir.path()).unwrap();
        let text  = fs::read_to_string(again.csv_path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], HEADER);
        assert_eq!(lines[1], "1,0.001000,2.500000,0.000000,1.000000");
        assert!(lines[2].starts_with("2,0.000250,2.000000,1.000000,2.718"));
    }
}
