//! Resolved asset record and per-asset lifecycle states.

use crate::descriptor::AssetKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Where a cached file came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    /// Downloaded from a URL.
    Remote,
    /// Copied from a declared local path.
    Local,
    /// Adopted from a scanned staging tree.
    Scanned,
}

/// A verified file in the cache, ready to be handed downstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedAsset {
    pub name: String,
    pub local_path: PathBuf,
    /// Measured SHA-256 (lower-case hex).
    pub sha256: String,
    pub size_bytes: u64,
    pub kind: AssetKind,
    pub provenance: Provenance,
}

/// Lifecycle of one asset during a resolve: `Declared → Cached` on a hit,
/// `Declared → Fetching → Verifying → Cached` otherwise, or `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AssetState {
    Declared,
    Fetching,
    Verifying,
    Cached,
    Failed,
}

impl fmt::Display for AssetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AssetState::Declared => "declared",
            AssetState::Fetching => "fetching",
            AssetState::Verifying => "verifying",
            AssetState::Cached => "cached",
            AssetState::Failed => "failed",
        })
    }
}

pub(crate) fn transition(name: &str, state: AssetState) {
    tracing::debug!(name, state = %state, "asset state");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cached_asset_json_shape() {
        let a = CachedAsset {
            name: "setup".into(),
            local_path: PathBuf::from("/cache/scripts/setup.sh"),
            sha256: "ab".repeat(32),
            size_bytes: 42,
            kind: AssetKind::Script,
            provenance: Provenance::Scanned,
        };
        let v: serde_json::Value = serde_json::to_value(&a).unwrap();
        assert_eq!(v["kind"], "script");
        assert_eq!(v["provenance"], "scanned");
        assert_eq!(v["local_path"], "/cache/scripts/setup.sh");
        assert_eq!(v["size_bytes"], 42);
    }
}
