//! Error taxonomy for asset acquisition.
//!
//! Download failures are retried inside the fetcher; every
//! other variant aborts the current `resolve` call as soon as it is observed.

use crate::retry::{ErrorKind, FetchError};
use std::path::PathBuf;
use thiserror::Error;

/// A download that still failed after the retry policy was exhausted.
#[derive(Debug, Error)]
#[error("failed to download {url} after {attempts} attempt(s): {source}")]
pub struct DownloadError {
    pub url: String,
    /// Number of attempts made (first attempt included).
    pub attempts: u32,
    /// Classification of the last failure.
    pub kind: ErrorKind,
    #[source]
    pub source: FetchError,
}

/// Errors surfaced by the cache and resolver.
#[derive(Debug, Error)]
pub enum AssetError {
    #[error(transparent)]
    Download(#[from] DownloadError),

    /// Digest/size mismatch or rejected script content. The offending file
    /// has already been deleted when this is returned.
    #[error("integrity check failed for {}: {reason}", path.display())]
    Integrity { path: PathBuf, reason: String },

    /// Bad declaration: both or neither source, malformed URL or checksum,
    /// missing local file.
    #[error("invalid asset configuration: {0}")]
    Configuration(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl AssetError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        AssetError::Configuration(msg.into())
    }
}

pub type AssetResult<T> = Result<T, AssetError>;

/// Failure of a whole resolution run, naming the asset that aborted it.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("asset declarations rejected: {0}")]
    Declarations(#[source] AssetError),

    /// The staging tree drifted from its manifest.
    #[error("staging tree rejected: {0}")]
    Staging(#[source] AssetError),

    #[error("asset '{name}' failed: {source}")]
    Asset { name: String, source: AssetError },
}

impl ResolveError {
    /// The underlying asset error, regardless of where it was raised.
    pub fn asset_error(&self) -> &AssetError {
        match self {
            ResolveError::Declarations(e) | ResolveError::Staging(e) => e,
            ResolveError::Asset { source, .. } => source,
        }
    }
}
