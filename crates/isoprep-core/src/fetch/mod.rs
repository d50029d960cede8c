//! Streaming HTTP(S) download with bounded retries.
//!
//! The fetcher only moves bytes: it never looks at digests. Callers verify
//! the destination after `fetch` returns.

mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use transport::{BodySink, CurlTransport, GetRequest, HttpTransport};

use crate::error::{AssetError, AssetResult, DownloadError};
use crate::progress::{ProgressObserver, ProgressStats};
use crate::retry::{run_with_retry, FetchError, RetryPolicy};
use crate::storage::{self, StorageWriter};
use std::path::Path;
use std::time::{Duration, Instant};

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
/// Default receive chunk size.
pub const DEFAULT_CHUNK_SIZE: usize = 8192;

/// Knobs for `RetryingFetcher`.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub retry: RetryPolicy,
    pub timeout: Duration,
    pub chunk_size: usize,
    pub user_agent: String,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            timeout: DEFAULT_TIMEOUT,
            chunk_size: DEFAULT_CHUNK_SIZE,
            user_agent: concat!("isoprep/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Writes the body into a `.part` file and forwards progress.
struct FileSink<'a> {
    writer: StorageWriter,
    observer: &'a mut dyn ProgressObserver,
    stats: ProgressStats,
    started: Instant,
}

impl BodySink for FileSink<'_> {
    fn content_length(&mut self, len: Option<u64>) {
        self.stats.total_bytes = len;
    }

    fn write_chunk(&mut self, data: &[u8]) -> std::io::Result<()> {
        self.writer.write_chunk(data)?;
        self.stats.bytes_done = self.writer.written();
        self.stats.elapsed_secs = self.started.elapsed().as_secs_f64();
        self.observer.on_progress(&self.stats);
        Ok(())
    }
}

/// Downloads URLs to local paths, retrying with exponential backoff.
pub struct RetryingFetcher<T: HttpTransport = CurlTransport> {
    transport: T,
    options: FetchOptions,
}

impl RetryingFetcher<CurlTransport> {
    pub fn new(options: FetchOptions) -> Self {
        Self::with_transport(CurlTransport::new(), options)
    }
}

impl<T: HttpTransport> RetryingFetcher<T> {
    pub fn with_transport(transport: T, options: FetchOptions) -> Self {
        Self { transport, options }
    }

    pub fn options(&self) -> &FetchOptions {
        &self.options
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Download `url` to `destination`, returning the number of bytes written.
    ///
    /// Each attempt streams into `destination.part`; a failed attempt removes
    /// both the temp file and anything at `destination` before backing off.
    /// Fails with `AssetError::Download` once `max_retries + 1` attempts have
    /// failed, or `AssetError::Io` if the parent directory cannot be created.
    pub fn fetch(
        &mut self,
        url: &str,
        destination: &Path,
        observer: &mut dyn ProgressObserver,
    ) -> AssetResult<u64> {
        if let Some(parent) = destination.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let policy = self.options.retry;
        let total = policy.total_attempts();
        let result = run_with_retry(&policy, |state| {
            tracing::info!(
                url,
                attempt = state.attempt + 1,
                total,
                "downloading to {}",
                destination.display()
            );
            let outcome = self.attempt(url, destination, &mut *observer);
            if outcome.is_err() {
                storage::discard(destination);
            }
            outcome
        });
        match result {
            Ok(bytes) => {
                tracing::info!(url, bytes, "downloaded {}", destination.display());
                Ok(bytes)
            }
            Err(failure) => Err(AssetError::Download(DownloadError {
                url: url.to_string(),
                attempts: failure.attempts,
                kind: failure.kind,
                source: failure.error,
            })),
        }
    }

    fn attempt(
        &mut self,
        url: &str,
        destination: &Path,
        observer: &mut dyn ProgressObserver,
    ) -> Result<u64, FetchError> {
        let tmp = storage::temp_path(destination);
        let writer = StorageWriter::create(&tmp, self.options.chunk_size)?;
        let name = destination
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| url.to_string());
        let mut sink = FileSink {
            writer,
            observer,
            stats: ProgressStats::new(name),
            started: Instant::now(),
        };
        let request = GetRequest {
            url,
            timeout: self.options.timeout,
            user_agent: &self.options.user_agent,
            chunk_size: self.options.chunk_size,
        };
        if let Err(e) = self.transport.get(&request, &mut sink) {
            let _ = sink.writer.discard();
            return Err(e);
        }
        Ok(sink.writer.finalize(destination)?)
    }
}
