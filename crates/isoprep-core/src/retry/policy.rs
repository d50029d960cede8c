use std::time::Duration;

/// High-level classification of a failed attempt.
///
/// Every kind is retried; the kind is kept so the final `DownloadError`
/// and the per-attempt log lines say what went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Operation timed out (connect/read) or server sent 408.
    Timeout,
    /// Server asked us to slow down (429, 503).
    Throttled,
    /// Network-level failure (connection reset, DNS, short read).
    Connection,
    /// Other 5xx status.
    Http5xx(u16),
    /// Any other non-2xx status.
    Http(u16),
    /// Local write failure while streaming the body.
    Io,
    /// Anything curl reported that we do not recognize.
    Other,
}

/// Decision returned by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Out of attempts.
    NoRetry,
    /// Retry after the given delay.
    RetryAfter(Duration),
}

/// Pure exponential backoff: `base_delay * 2^attempt`, no jitter, no cap.
///
/// With the default one second base this sleeps 1s, 2s, 4s between the
/// four attempts allowed by `max_retries = 3`.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Total number of attempts including the first.
    pub fn total_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Backoff before retrying after the 0-based `attempt` failed.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = 1u32 << attempt.min(16);
        self.base_delay.saturating_mul(exp)
    }

    /// Decide what to do after the 0-based `attempt` failed.
    pub fn decide(&self, attempt: u32) -> RetryDecision {
        if attempt >= self.max_retries {
            return RetryDecision::NoRetry;
        }
        RetryDecision::RetryAfter(self.backoff(attempt))
    }
}
