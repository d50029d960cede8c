//! Asset-relevant slice of the build configuration.
//!
//! The build configuration JSON carries much more (users, network,
//! encryption...) that other stages own; unknown fields are ignored here.
//! All validation happens in `to_descriptors`, before any I/O.

use crate::descriptor::{AssetDescriptor, AssetKind};
use crate::error::{AssetError, AssetResult};
use crate::url_model;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name given to the base ISO descriptor.
pub const BASE_ISO_NAME: &str = "base_iso";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackageDeclarations {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deb_urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deb_local_paths: Vec<PathBuf>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptDeclaration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    #[serde(default = "default_true")]
    pub executable: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FirstBootDeclarations {
    #[serde(default)]
    pub scripts: Vec<ScriptDeclaration>,
}

/// Asset declarations read from the build configuration JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssetDeclarations {
    #[serde(default)]
    pub packages: PackageDeclarations,
    #[serde(default)]
    pub first_boot: FirstBootDeclarations,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_iso_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_iso_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_iso_checksum: Option<String>,
}

fn stem_of(name: &str) -> Option<String> {
    let stem = Path::new(name).file_stem()?.to_string_lossy().into_owned();
    if stem.is_empty() {
        None
    } else {
        Some(stem)
    }
}

fn checked_url(url: &str, what: &str) -> AssetResult<()> {
    url_model::parse_http_url(url)
        .map(|_| ())
        .map_err(|e| AssetError::config(format!("{}: {}", what, e)))
}

impl AssetDeclarations {
    /// Read declarations from a build configuration JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_str(&data).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// True when any asset is declared by local path.
    pub fn has_local_paths(&self) -> bool {
        !self.packages.deb_local_paths.is_empty()
            || self.first_boot.scripts.iter().any(|s| s.local_path.is_some())
            || self.base_iso_path.is_some()
    }

    /// Validate every declaration and turn it into a descriptor, in order:
    /// remote packages, local packages, scripts, base ISO.
    pub fn to_descriptors(&self) -> AssetResult<Vec<AssetDescriptor>> {
        let mut out = Vec::new();

        for (i, url) in self.packages.deb_urls.iter().enumerate() {
            checked_url(url, "invalid .deb URL")?;
            let file = url_model::filename_from_url_path(url).unwrap_or_default();
            if !file.ends_with(".deb") {
                return Err(AssetError::config(format!(
                    "URL must point to .deb file: {}",
                    url
                )));
            }
            let name = stem_of(&file).unwrap_or_else(|| format!("package_{}", i));
            out.push(AssetDescriptor::remote(name, url, AssetKind::Package));
        }

        let offset = self.packages.deb_urls.len();
        for (i, path) in self.packages.deb_local_paths.iter().enumerate() {
            let name = path
                .file_name()
                .and_then(|n| stem_of(&n.to_string_lossy()))
                .unwrap_or_else(|| format!("package_{}", offset + i));
            out.push(AssetDescriptor::local(name, path, AssetKind::Package));
        }

        for (i, script) in self.first_boot.scripts.iter().enumerate() {
            out.push(script.to_descriptor(i)?);
        }

        if self.base_iso_url.is_some() || self.base_iso_path.is_some() {
            if let Some(url) = &self.base_iso_url {
                checked_url(url, "invalid base ISO URL")?;
            }
            let mut iso = AssetDescriptor::from_parts(
                BASE_ISO_NAME,
                AssetKind::Iso,
                self.base_iso_url.clone(),
                self.base_iso_path.clone(),
            )?;
            if let Some(sum) = &self.base_iso_checksum {
                iso = iso.with_sha256(sum)?;
            }
            out.push(iso);
        } else if self.base_iso_checksum.is_some() {
            return Err(AssetError::config(
                "base_iso_checksum given without base_iso_url or base_iso_path",
            ));
        }

        Ok(out)
    }
}

impl ScriptDeclaration {
    fn to_descriptor(&self, index: usize) -> AssetResult<AssetDescriptor> {
        let name = self
            .name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .or_else(|| {
                let file = match (&self.url, &self.local_path) {
                    (Some(url), _) => url_model::filename_from_url_path(url),
                    (None, Some(p)) => p.file_name().map(|n| n.to_string_lossy().into_owned()),
                    (None, None) => None,
                };
                file.and_then(|f| stem_of(&f))
            })
            .unwrap_or_else(|| format!("script_{}", index));

        if let Some(url) = &self.url {
            checked_url(url, &format!("invalid script URL for '{}'", name))?;
        }
        let mut desc = AssetDescriptor::from_parts(
            name,
            AssetKind::Script,
            self.url.clone(),
            self.local_path.clone(),
        )?
        .executable(self.executable);
        if let Some(sum) = &self.checksum {
            desc = desc.with_sha256(sum)?;
        }
        Ok(desc)
    }
}
