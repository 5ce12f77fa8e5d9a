// ============================================================
// Layer 6 — Interrupt Flag
// ============================================================
// Ctrl-C during training must not kill the process: it ends the
// epoch loop and the driver still scores the test set. The
// signal is caught on a background thread running a tiny tokio
// runtime, which flips a shared flag the training loop polls
// between batches.
//
// A second Ctrl-C exits immediately.

use anyhow::{Context, Result};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// Exit status conventionally used after SIGINT.
const SIGINT_EXIT_CODE: i32 = 130;

#[derive(Debug, Clone, Default)]
pub struct InterruptFlag {
    raised: Arc<AtomicBool>,
}

impl InterruptFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the flag. Returns true if it was already raised.
    pub fn raise(&self) -> bool {
        self.raised.swap(true, Ordering::SeqCst)
    }

    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::SeqCst)
    }
}

/// Listen for Ctrl-C for the rest of the process lifetime.
pub fn install_ctrl_c_handler(flag: InterruptFlag) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Cannot start signal listener runtime")?;

    std::thread::Builder::new()
        .name("ctrl-c".to_string())
        .spawn(move || {
            runtime.block_on(async move {
                loop {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        tracing::error!("Failed to listen for Ctrl-C: {}", e);
                        return;
                    }
                    if flag.raise() {
                        tracing::warn!("Second interrupt, exiting now");
                        std::process::exit(SIGINT_EXIT_CODE);
                    }
                    tracing::info!("Interrupt received, finishing after the current batch");
                }
            });
        })
        .context("Cannot spawn signal listener thread")?;

    Ok(())
}
