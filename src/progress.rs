//! Progress reporting for migration runs.

use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use tracing::{info, warn};

use crate::types::{Key, MigrationReport};

/// Receives per-key outcomes from the transfer engine.
///
/// Indices are 1-based positions in the source enumeration.
pub trait ProgressReporter: Send {
    /// Called once before the first key, after enumeration.
    fn on_start(&mut self, _total: usize, _resume_offset: usize) {}

    /// A key was restored on the destination.
    fn on_copied(&mut self, index: usize, total: usize, key: &Key);

    /// The destination already held the key; it was left untouched.
    fn on_conflict(&mut self, _index: usize, _total: usize, _key: &Key) {}

    /// The key disappeared from the source before it could be read.
    fn on_vanished(&mut self, _index: usize, _total: usize, _key: &Key) {}

    /// Called after the last key of a successful run.
    fn on_finish(&mut self, _report: &MigrationReport) {}
}

/// Writes one log line per key.
#[derive(Debug, Default)]
pub struct LogReporter;

impl ProgressReporter for LogReporter {
    fn on_start(&mut self, total: usize, resume_offset: usize) {
        info!("GOT ALL KEYS: {}", total);
        if resume_offset > 0 {
            info!("Skipping the first {} keys", resume_offset);
        }
    }

    fn on_copied(&mut self, index: usize, total: usize, key: &Key) {
        info!("COPIED KEY {}/{} {}", index, total, key);
    }

    fn on_conflict(&mut self, _index: usize, _total: usize, key: &Key) {
        warn!("Key already exists: {}", key);
    }

    fn on_vanished(&mut self, _index: usize, _total: usize, key: &Key) {
        info!("Key vanished before dump: {}", key);
    }

    fn on_finish(&mut self, report: &MigrationReport) {
        info!(
            "COPIED ALL KEYS: {} copied, {} already present, {} vanished",
            report.copied, report.conflicts, report.vanished
        );
    }
}

/// Terminal progress bar.
pub struct BarReporter {
    pb: ProgressBar,
}

impl Default for BarReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl BarReporter {
    /// Creates a hidden bar; its length is set on [`ProgressReporter::on_start`].
    pub fn new() -> Self {
        let pb = ProgressBar::new(0);
        if let Ok(style) = ProgressStyle::default_bar().template(
            "{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg} | {elapsed_precise} elapsed, ETA {eta_precise}",
        ) {
            pb.set_style(style.progress_chars("█▓▒░ "));
        }
        Self { pb }
    }

    /// Log writer that draws above this bar instead of through it.
    pub fn log_writer(&self) -> BarLogWriter {
        BarLogWriter {
            pb: self.pb.clone(),
        }
    }
}

/// Writes log output to stderr with the progress bar suspended.
#[derive(Clone)]
pub struct BarLogWriter {
    pb: ProgressBar,
}

impl Write for BarLogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pb.suspend(|| io::stderr().write(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        self.pb.suspend(|| io::stderr().flush())
    }
}

impl ProgressReporter for BarReporter {
    fn on_start(&mut self, total: usize, resume_offset: usize) {
        self.pb.set_length(total as u64);
        self.pb.set_position(resume_offset.min(total) as u64);
        self.pb.set_message(format!("📦 Copying {} keys", total));
    }

    fn on_copied(&mut self, index: usize, _total: usize, key: &Key) {
        self.pb.set_position(index as u64);
        self.pb.set_message(format!("| ✅ {}", key));
    }

    fn on_conflict(&mut self, index: usize, _total: usize, key: &Key) {
        self.pb.set_position(index as u64);
        self.pb.println(format!("Key already exists: {}", key));
    }

    fn on_vanished(&mut self, index: usize, _total: usize, _key: &Key) {
        self.pb.set_position(index as u64);
    }

    fn on_finish(&mut self, report: &MigrationReport) {
        self.pb.finish_with_message(format!(
            "✅ Copied {} keys ({} already present, {} vanished)",
            report.copied, report.conflicts, report.vanished
        ));
    }
}

impl Drop for BarReporter {
    fn drop(&mut self) {
        if !self.pb.is_finished() {
            self.pb.abandon_with_message("❌ Migration stopped");
        }
    }
}
