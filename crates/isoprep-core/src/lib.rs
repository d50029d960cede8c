pub mod config;
pub mod logging;

pub mod build_config;
pub mod cache;
pub mod checksum;
pub mod descriptor;
pub mod error;
pub mod fetch;
pub mod fetch_head;
pub mod manifest;
pub mod progress;
pub mod resolver;
pub mod retry;
pub mod scanner;
pub mod script_check;
pub mod storage;
pub mod url_model;

pub use cache::{AssetCache, CacheOptions, CachedAsset, Provenance};
pub use descriptor::{AssetDescriptor, AssetKind, AssetSource};
pub use error::{AssetError, AssetResult, DownloadError, ResolveError};
pub use fetch::{FetchOptions, RetryingFetcher};
pub use resolver::{AssetResolver, ResolveMode, ResolvedAssets};
