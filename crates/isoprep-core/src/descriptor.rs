//! Asset descriptors: what to obtain and how to check it.

use crate::checksum;
use crate::error::{AssetError, AssetResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Category of an asset; decides its cache directory and scan rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Package,
    Script,
    Iso,
}

impl AssetKind {
    pub const ALL: [AssetKind; 3] = [AssetKind::Package, AssetKind::Script, AssetKind::Iso];

    /// Subdirectory name under both the cache root and the staging root.
    pub fn dir_name(self) -> &'static str {
        match self {
            AssetKind::Package => "packages",
            AssetKind::Script => "scripts",
            AssetKind::Iso => "iso",
        }
    }

    /// Value of the `type` field in scan output and manifests.
    pub fn scan_type(self) -> &'static str {
        match self {
            AssetKind::Package => "deb",
            AssetKind::Script => "script",
            AssetKind::Iso => "iso",
        }
    }

    /// Human label used in manifest verification messages.
    pub fn label(self) -> &'static str {
        match self {
            AssetKind::Package => "Package",
            AssetKind::Script => "Script",
            AssetKind::Iso => "ISO file",
        }
    }

    /// Extensions (with leading dot) picked up by the scanner.
    pub fn default_extensions(self) -> &'static [&'static str] {
        match self {
            AssetKind::Package => &[".deb"],
            AssetKind::Script => &[".sh", ".py", ".pl", ".rb"],
            AssetKind::Iso => &[".iso"],
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AssetKind::Package => "package",
            AssetKind::Script => "script",
            AssetKind::Iso => "iso",
        })
    }
}

/// Where an asset comes from. Exactly one per descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetSource {
    Remote(String),
    Local(PathBuf),
}

impl AssetSource {
    pub fn is_remote(&self) -> bool {
        matches!(self, AssetSource::Remote(_))
    }
}

impl fmt::Display for AssetSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetSource::Remote(url) => f.write_str(url),
            AssetSource::Local(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Declared intent to obtain one asset. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetDescriptor {
    name: String,
    source: AssetSource,
    expected_sha256: Option<String>,
    expected_size_bytes: Option<u64>,
    kind: AssetKind,
    must_be_executable: bool,
}

impl AssetDescriptor {
    pub fn remote(name: impl Into<String>, url: impl Into<String>, kind: AssetKind) -> Self {
        Self::new(name.into(), AssetSource::Remote(url.into()), kind)
    }

    pub fn local(name: impl Into<String>, path: impl AsRef<Path>, kind: AssetKind) -> Self {
        Self::new(name.into(), AssetSource::Local(path.as_ref().to_path_buf()), kind)
    }

    fn new(name: String, source: AssetSource, kind: AssetKind) -> Self {
        Self {
            name,
            source,
            expected_sha256: None,
            expected_size_bytes: None,
            kind,
            must_be_executable: false,
        }
    }

    /// Build from optional URL / local path, rejecting both or neither.
    pub fn from_parts(
        name: impl Into<String>,
        kind: AssetKind,
        url: Option<String>,
        local_path: Option<PathBuf>,
    ) -> AssetResult<Self> {
        let name = name.into();
        match (url, local_path) {
            (Some(url), None) => Ok(Self::remote(name, url, kind)),
            (None, Some(path)) => Ok(Self::local(name, path, kind)),
            (Some(_), Some(_)) => Err(AssetError::config(format!(
                "{} '{}' declares both a URL and a local path",
                kind, name
            ))),
            (None, None) => Err(AssetError::config(format!(
                "{} '{}' declares neither a URL nor a local path",
                kind, name
            ))),
        }
    }

    /// Attach an expected SHA-256 (64 hex chars, stored lowercase).
    pub fn with_sha256(mut self, sha256: impl AsRef<str>) -> AssetResult<Self> {
        let sha = sha256.as_ref().trim();
        if !checksum::is_sha256_hex(sha) {
            return Err(AssetError::config(format!(
                "{} '{}': checksum must be a 64-character SHA256 hex digest",
                self.kind, self.name
            )));
        }
        self.expected_sha256 = Some(sha.to_ascii_lowercase());
        Ok(self)
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.expected_size_bytes = Some(size);
        self
    }

    pub fn executable(mut self, yes: bool) -> Self {
        self.must_be_executable = yes;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &AssetSource {
        &self.source
    }

    pub fn expected_sha256(&self) -> Option<&str> {
        self.expected_sha256.as_deref()
    }

    pub fn expected_size_bytes(&self) -> Option<u64> {
        self.expected_size_bytes
    }

    pub fn kind(&self) -> AssetKind {
        self.kind
    }

    pub fn must_be_executable(&self) -> bool {
        self.must_be_executable
    }
}
