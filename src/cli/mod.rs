// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Entry point for all user interaction. Parses arguments with
// clap and hands off to Layer 2 (application).
//
//   1. `train`    — train on WikiText, report test perplexity
//   2. `evaluate` — score a saved checkpoint

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, EvalArgs, TrainArgs};

#[derive(Parser, Debug)]
#[command(
    name = "lstm-lm",
    version,
    about = "Train an LSTM word-level language model on WikiText-2."
)]
pub struct Cli {
    /// The subcommand to run (train or evaluate)
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Route the subcommand to its use case.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)    => Self::run_train(args),
            Commands::Evaluate(args) => Self::run_evaluate(args),
        }
    }

    fn run_train(args: TrainArgs) -> Result<()> {
        use crate::application::train_use_case::TrainUseCase;

        let report = TrainUseCase::new(args.into()).execute()?;
        tracing::info!(
            epochs      = report.epochs_completed,
            interrupted = report.interrupted,
            best_val    = report.best_val_loss,
            final_lr    = report.final_lr,
            test_ppl    = report.test_ppl(),
            "Training finished"
        );
        Ok(())
    }

    fn run_evaluate(args: EvalArgs) -> Result<()> {
        use crate::application::evaluate_use_case::EvaluateUseCase;

        tracing::info!("Evaluating checkpoint in '{}'", args.artifact_dir);
        EvaluateUseCase::new(&args.artifact_dir, args.split.into())
            .with_data_dir(args.data_dir)
            .with_device(args.device.map(Into::into))
            .with_progress(!args.no_progress)
            .execute()?;
        Ok(())
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::train_use_case::{DeviceKind, TrainConfig};
    use crate::domain::split::Split;

    #[test]
    fn test_train_defaults_match_config_defaults() {
        let cli = Cli::try_parse_from(["lstm-lm", "train"]).unwrap();
        let Commands::Train(args) = cli.command else { panic!("expected train") };
        let cfg: TrainConfig = args.into();
        let def = TrainConfig::default();

        assert_eq!(cfg.data_dir, def.data_dir);
        assert_eq!(cfg.batch_size, def.batch_size);
        assert_eq!(cfg.bptt, def.bptt);
        assert_eq!(cfg.epochs, def.epochs);
        assert_eq!(cfg.lr, def.lr);
        assert_eq!(cfg.emsize, def.emsize);
        assert_eq!(cfg.nhid, def.nhid);
        assert_eq!(cfg.dropout, def.dropout);
        assert_eq!(cfg.clip, def.clip);
        assert_eq!(cfg.device, DeviceKind::Cpu);
        assert!(cfg.progress);
    }

    #[test]
    fn test_train_flags() {
        let cli = Cli::try_parse_from([
            "lstm-lm", "train", "--tied", "--emsize", "128", "--nhid", "128",
            "--device", "wgpu", "--seed", "7", "--anneal", "--no-progress",
        ]).unwrap();
        let Commands::Train(args) = cli.command else { panic!("expected train") };
        let cfg: TrainConfig = args.into();

        assert!(cfg.tied && cfg.anneal && !cfg.progress);
        assert_eq!(cfg.emsize, 128);
        assert_eq!(cfg.device, DeviceKind::Wgpu);
        assert_eq!(cfg.seed, Some(7));
        cfg.validate().unwrap();
    }

    #[test]
    fn test_evaluate_split() {
        let cli = Cli::try_parse_from(["lstm-lm", "evaluate", "--split", "valid"]).unwrap();
        let Commands::Evaluate(args) = cli.command else { panic!("expected evaluate") };
        assert_eq!(Split::from(args.split), Split::Valid);
        assert_eq!(args.artifact_dir, "artifacts");
        assert!(args.device.is_none());
    }

    #[test]
    fn test_unknown_device_is_rejected() {
        assert!(Cli::try_parse_from(["lstm-lm", "train", "--device", "tpu"]).is_err());
    }
}
