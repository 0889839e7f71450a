//! Progress reporting for transfer operations
//!
//! This module provides the observer interface fed with byte/step counts
//! during uploads, downloads and status polling, plus a console
//! implementation rendering a progress bar. Reporters are purely
//! observational and have no control-flow effect on the transfer.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};

/// Observer for transfer progress
///
/// `update` is invoked at each transfer chunk boundary and at each poll tick.
/// The total may be unknown (e.g. a download without a Content-Length).
pub trait ProgressReporter: Send + Sync {
    /// Report the current progress count
    ///
    /// # Arguments
    /// * `current` - Units completed so far (bytes, or percent for poll ticks)
    /// * `total` - Total units if known
    fn update(&self, current: u64, total: Option<u64>);

    /// Called once when the transfer reaches a terminal state
    fn finish(&self) {}
}

/// Reporter that discards all updates (the default)
#[derive(Debug, Default)]
pub struct NullProgressReporter;

impl ProgressReporter for NullProgressReporter {
    fn update(&self, _current: u64, _total: Option<u64>) {}
}

/// Reporter rendering a console progress bar
///
/// Starts as a spinner and switches to a bounded bar as soon as a total is
/// known. Displays transfer speed computed from elapsed time.
pub struct ConsoleProgressReporter {
    /// Progress bar handle
    bar: ProgressBar,
    /// Whether the bar has been given a length yet
    bounded: AtomicBool,
    /// Last reported count
    current: AtomicU64,
    /// Start time of the operation
    start_time: Instant,
}

impl ConsoleProgressReporter {
    /// Create a new console reporter
    ///
    /// # Arguments
    /// * `message` - Label shown next to the spinner/bar
    ///
    /// # Returns
    /// * `Self` - New reporter instance
    pub fn new(message: &str) -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {prefix} {pos} {msg}")
                .unwrap(),
        );
        bar.set_prefix(message.to_string());

        Self {
            bar,
            bounded: AtomicBool::new(false),
            current: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }
}

impl ProgressReporter for ConsoleProgressReporter {
    fn update(&self, current: u64, total: Option<u64>) {
        self.current.store(current, Ordering::Relaxed);

        if let Some(total) = total {
            if !self.bounded.swap(true, Ordering::Relaxed) {
                self.bar.set_style(
                    ProgressStyle::default_bar()
                        .template("{spinner:.green} {prefix} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                        .unwrap()
                        .progress_chars("#>-"),
                );
            }
            self.bar.set_length(total);
        }

        self.bar.set_position(current);

        // Calculate and display speed
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            let speed = current as f64 / elapsed;
            self.bar.set_message(format!("({speed:.0}/sec)"));
        }
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_reporter_accepts_updates() {
        let reporter = NullProgressReporter;
        reporter.update(10, Some(100));
        reporter.update(100, None);
        reporter.finish();
    }

    #[test]
    fn test_console_reporter_with_total() {
        let reporter = ConsoleProgressReporter::new("upload");
        reporter.update(512, Some(1024));
        reporter.update(1024, Some(1024));
        reporter.finish();
        // Progress updated successfully (no panic means success)
    }

    #[test]
    fn test_console_reporter_without_total() {
        let reporter = ConsoleProgressReporter::new("export");
        reporter.update(42, None);
        reporter.finish();
    }
}
