//! Progress reporting for downloads (bytes done, percentage, rate).
//!
//! The fetcher calls a `ProgressObserver` synchronously from its streaming
//! loop after every chunk written.

use std::time::{Duration, Instant};

/// Snapshot of download progress for one fetch.
#[derive(Debug, Clone)]
pub struct ProgressStats {
    /// Display name (usually the destination file name).
    pub name: String,
    /// Bytes written so far in the current attempt.
    pub bytes_done: u64,
    /// `Content-Length` declared by the server, if any.
    pub total_bytes: Option<u64>,
    /// Elapsed time since the attempt started (seconds).
    pub elapsed_secs: f64,
}

impl ProgressStats {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bytes_done: 0,
            total_bytes: None,
            elapsed_secs: 0.0,
        }
    }

    /// Download rate in bytes per second (0 if elapsed is 0).
    pub fn bytes_per_sec(&self) -> f64 {
        if self.elapsed_secs <= 0.0 {
            return 0.0;
        }
        self.bytes_done as f64 / self.elapsed_secs
    }

    /// Percentage complete in [0, 100]; `None` without a declared length.
    pub fn percent(&self) -> Option<f64> {
        match self.total_bytes {
            Some(0) => Some(100.0),
            Some(total) => Some((self.bytes_done as f64 / total as f64 * 100.0).min(100.0)),
            None => None,
        }
    }

    /// True once the declared length has been reached.
    pub fn is_complete(&self) -> bool {
        matches!(self.total_bytes, Some(total) if self.bytes_done >= total)
    }
}

/// Receives progress updates during a fetch.
pub trait ProgressObserver {
    fn on_progress(&mut self, stats: &ProgressStats);
}

/// Observer that ignores every update.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn on_progress(&mut self, _stats: &ProgressStats) {}
}

/// Logs progress through `tracing` at most once per interval, and on completion.
#[derive(Debug)]
pub struct LogProgress {
    interval: Duration,
    last: Option<Instant>,
}

impl LogProgress {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);

    pub fn new() -> Self {
        Self::with_interval(Self::DEFAULT_INTERVAL)
    }

    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    fn due(&mut self, stats: &ProgressStats) -> bool {
        let now = Instant::now();
        let due = match self.last {
            None => true,
            Some(prev) => now.duration_since(prev) >= self.interval,
        };
        if due || stats.is_complete() {
            self.last = Some(now);
            return true;
        }
        false
    }
}

impl Default for LogProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressObserver for LogProgress {
    fn on_progress(&mut self, stats: &ProgressStats) {
        if !self.due(stats) {
            return;
        }
        let rate_mib = stats.bytes_per_sec() / 1_048_576.0;
        match (stats.percent(), stats.total_bytes) {
            (Some(pct), Some(total)) => tracing::info!(
                "{}: {:.1}% ({}/{} bytes) @ {:.1} MiB/s",
                stats.name,
                pct,
                stats.bytes_done,
                total,
                rate_mib
            ),
            _ => tracing::info!(
                "{}: {} bytes downloaded @ {:.1} MiB/s",
                stats.name,
                stats.bytes_done,
                rate_mib
            ),
        }
    }
}
