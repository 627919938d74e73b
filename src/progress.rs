//! Progress reporting for plan execution

use crate::ui;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use reconcile::{ProgressCallback, Reconciliation};

/// Progress bar over every operation in a plan, printing one line per result
pub struct ApplyProgress {
    bar: ProgressBar,
    wave: usize,
}

impl ApplyProgress {
    pub fn new(total: usize, quiet: bool) -> Self {
        let bar = if quiet {
            ProgressBar::hidden()
        } else {
            let bar = ProgressBar::new(total as u64);
            if let Ok(style) = ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            {
                bar.set_style(style.progress_chars("=>-"));
            }
            bar
        };
        Self { bar, wave: 0 }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }

    fn line(&self, symbol: &str, id: &str, detail: &str) {
        self.bar
            .println(format!("  {symbol} {} {}", ui::shorten(id, 90), detail.dimmed()));
    }
}

impl ProgressCallback for ApplyProgress {
    fn on_wave_start(&mut self, count: usize) {
        self.wave += 1;
        self.bar
            .set_message(format!("wave {} ({})", self.wave, ui::plural(count, "resource")));
    }

    fn on_operation_complete(&mut self, id: &str, result: &Reconciliation) {
        let detail = if result.residual.has_drift() {
            format!("{} (still differs: {})", result.outcome, result.residual.field_names())
        } else {
            result.outcome.to_string()
        };
        self.line(&ui::outcome_symbol(result.outcome).to_string(), id, &detail);
        self.bar.inc(1);
    }

    fn on_operation_failed(&mut self, id: &str, error: &reconcile::Error) {
        self.line(&"✗".red().to_string(), id, &error.to_string());
        self.bar.inc(1);
    }

    fn on_operation_skipped(&mut self, id: &str, reason: &str) {
        self.line(&"○".dimmed().to_string(), id, &format!("skipped: {reason}"));
        self.bar.inc(1);
    }

    fn on_wave_complete(&mut self) {}
}
