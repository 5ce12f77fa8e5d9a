// ============================================================
// Layer 6 — Batch Progress Bar
// ============================================================
// A progress bar over the batches of one pass. Status lines are
// printed with the bar suspended so they land above it, and are
// still printed when the bar itself is hidden.

use indicatif::{ProgressBar, ProgressStyle};

pub struct BatchProgress {
    bar: ProgressBar,
}

impl BatchProgress {
    pub fn new(total: usize, label: &str, visible: bool) -> Self {
        let bar = if visible {
            ProgressBar::new(total as u64)
        } else {
            ProgressBar::hidden()
        };
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{prefix:>10} [{bar:40.cyan/blue}] {pos}/{len} ({elapsed}<{eta})")
        {
            bar.set_style(style.progress_chars("=> "));
        }
        bar.set_prefix(label.to_string());
        Self { bar }
    }

    pub fn inc(&self) {
        self.bar.inc(1);
    }

    /// Print a line above the bar.
    pub fn println(&self, line: &str) {
        self.bar.suspend(|| println!("{line}"));
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl Drop for BatchProgress {
    fn drop(&mut self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }
}
