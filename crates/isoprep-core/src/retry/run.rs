//! Retry loop: run a closure until success or the policy says stop.

use super::classify;
use super::error::FetchError;
use super::policy::{ErrorKind, RetryDecision, RetryPolicy};
use std::time::Duration;

/// Transient per-call state; lives only for one `run_with_retry`.
#[derive(Debug, Clone, Default)]
pub struct RetryState {
    /// 0-based index of the attempt about to run (or that just failed).
    pub attempt: u32,
    /// Rendered message of the most recent failure.
    pub last_error: Option<String>,
    /// Delay slept before the current attempt, if any.
    pub next_delay: Option<Duration>,
}

/// Last error plus the state at the time retries ran out.
#[derive(Debug)]
pub struct RetryFailure {
    pub error: FetchError,
    pub kind: ErrorKind,
    pub attempts: u32,
}

/// Runs `f` until it succeeds or the retry policy says to stop.
/// On failure, sleeps for the backoff duration then tries again.
/// `f` is responsible for cleaning up after its own failed attempt.
pub fn run_with_retry<T, F>(policy: &RetryPolicy, mut f: F) -> Result<T, RetryFailure>
where
    F: FnMut(&RetryState) -> Result<T, FetchError>,
{
    let mut state = RetryState::default();
    loop {
        match f(&state) {
            Ok(v) => return Ok(v),
            Err(e) => {
                let kind = classify::classify(&e);
                tracing::warn!(
                    attempt = state.attempt + 1,
                    total = policy.total_attempts(),
                    ?kind,
                    "attempt failed: {}",
                    e
                );
                match policy.decide(state.attempt) {
                    RetryDecision::NoRetry => {
                        return Err(RetryFailure {
                            error: e,
                            kind,
                            attempts: state.attempt + 1,
                        })
                    }
                    RetryDecision::RetryAfter(d) => {
                        tracing::info!("retrying in {:?}", d);
                        std::thread::sleep(d);
                        state.last_error = Some(e.to_string());
                        state.next_delay = Some(d);
                        state.attempt += 1;
                    }
                }
            }
        }
    }
}
