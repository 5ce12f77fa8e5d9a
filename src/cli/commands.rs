// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the two subcommands, `train` and `evaluate`, and
// all their configurable flags.

use clap::{Args, Subcommand, ValueEnum};

use crate::application::train_use_case::{DeviceKind, TrainConfig};
use crate::domain::split::Split;

/// The two top-level subcommands available to the user
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train the LSTM language model on a WikiText corpus
    Train(TrainArgs),

    /// Score a model saved with `train --save-best`
    Evaluate(EvalArgs),
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceArg {
    /// NdArray backend
    Cpu,
    /// GPU via wgpu
    Wgpu,
}

impl From<DeviceArg> for DeviceKind {
    fn from(d: DeviceArg) -> Self {
        match d {
            DeviceArg::Cpu  => DeviceKind::Cpu,
            DeviceArg::Wgpu => DeviceKind::Wgpu,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitArg {
    Valid,
    Test,
}

impl From<SplitArg> for Split {
    fn from(s: SplitArg) -> Self {
        match s {
            SplitArg::Valid => Split::Valid,
            SplitArg::Test  => Split::Test,
        }
    }
}

/// All arguments for the `train` command.
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Directory holding wiki.{train,valid,test}.tokens
    #[arg(long, default_value = "data/wikitext-2")]
    pub data_dir: String,

    /// Where --save-best and --log-metrics write their files
    #[arg(long, default_value = "artifacts")]
    pub artifact_dir: String,

    #[arg(long, default_value_t = 64)]
    pub batch_size: usize,

    /// Sequence length of one truncated-BPTT window
    #[arg(long, default_value_t = 35)]
    pub bptt: usize,

    #[arg(long, default_value_t = 50)]
    pub epochs: usize,

    /// Initial learning rate for Adam
    #[arg(long, default_value_t = 0.001)]
    pub lr: f64,

    /// Print a status line every N batches
    #[arg(long, default_value_t = 100)]
    pub log_interval: usize,

    /// Size of word embeddings
    #[arg(long, default_value_t = 64)]
    pub emsize: usize,

    /// Number of hidden units per layer
    #[arg(long, default_value_t = 64)]
    pub nhid: usize,

    #[arg(long, default_value_t = 1)]
    pub nlayers: usize,

    /// Dropout applied to embeddings, between layers and to the output
    #[arg(long, default_value_t = 0.2)]
    pub dropout: f64,

    /// Share the embedding and decoder weights (needs emsize == nhid)
    #[arg(long)]
    pub tied: bool,

    /// Gradient clipping: ceiling on the global norm
    #[arg(long, default_value_t = 0.25)]
    pub clip: f64,

    #[arg(long, value_enum, default_value_t = DeviceArg::Cpu)]
    pub device: DeviceArg,

    /// Seed the backend RNG for reproducible runs
    #[arg(long)]
    pub seed: Option<u64>,

    /// Checkpoint the best model and test with it
    #[arg(long)]
    pub save_best: bool,

    /// Divide the learning rate by 4 when validation loss stops improving
    #[arg(long)]
    pub anneal: bool,

    /// Append per-epoch validation metrics to metrics.csv
    #[arg(long)]
    pub log_metrics: bool,

    /// Hide progress bars
    #[arg(long)]
    pub no_progress: bool,
}

/// Convert CLI TrainArgs into the application-layer TrainConfig.
/// The application layer never sees clap types.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            data_dir:     a.data_dir,
            artifact_dir: a.artifact_dir,
            batch_size:   a.batch_size,
            bptt:         a.bptt,
            epochs:       a.epochs,
            lr:           a.lr,
            log_interval: a.log_interval,
            emsize:       a.emsize,
            nhid:         a.nhid,
            nlayers:      a.nlayers,
            dropout:      a.dropout,
            tied:         a.tied,
            clip:         a.clip,
            device:       a.device.into(),
            seed:         a.seed,
            save_best:    a.save_best,
            anneal:       a.anneal,
            log_metrics:  a.log_metrics,
            progress:     !a.no_progress,
        }
    }
}

/// All arguments for the `evaluate` command
#[derive(Args, Debug)]
pub struct EvalArgs {
    /// Directory written by `train --save-best`
    #[arg(long, default_value = "artifacts")]
    pub artifact_dir: String,

    /// Override the data directory recorded at training time
    #[arg(long)]
    pub data_dir: Option<String>,

    #[arg(long, value_enum, default_value_t = SplitArg::Test)]
    pub split: SplitArg,

    /// Override the device recorded at training time
    #[arg(long, value_enum)]
    pub device: Option<DeviceArg>,

    /// Hide progress bars
    #[arg(long)]
    pub no_progress: bool,
}
