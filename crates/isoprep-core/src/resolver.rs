//! Turns asset declarations into verified local files.
//!
//! One `ResolveMode` is chosen per run and never mixed: declared local
//! paths, a staged tree under the staging root, or remote URLs.

use crate::build_config::AssetDeclarations;
use crate::cache::{AssetCache, CachedAsset, Provenance};
use crate::descriptor::{AssetDescriptor, AssetKind, AssetSource};
use crate::error::{AssetError, ResolveError};
use crate::fetch::{CurlTransport, HttpTransport};
use crate::scanner::LocalAssetScanner;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolveMode {
    /// Copy the local paths named in the declarations.
    LocalPaths,
    /// Adopt whatever is staged under the staging root.
    Staged,
    /// Download the declared URLs.
    Remote,
}

impl ResolveMode {
    /// Local paths if any are declared, else the staging tree if it holds
    /// anything, else remote.
    pub fn select(decls: &AssetDeclarations, staging_root: &Path) -> Self {
        if decls.has_local_paths() {
            ResolveMode::LocalPaths
        } else if LocalAssetScanner::new(staging_root).has_assets() {
            ResolveMode::Staged
        } else {
            ResolveMode::Remote
        }
    }
}

impl fmt::Display for ResolveMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ResolveMode::LocalPaths => "local-paths",
            ResolveMode::Staged => "staged",
            ResolveMode::Remote => "remote",
        })
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedAssets {
    pub mode: ResolveMode,
    pub assets: BTreeMap<String, CachedAsset>,
}

#[derive(Serialize)]
struct Handoff<'a> {
    mode: ResolveMode,
    paths: BTreeMap<&'a str, &'a Path>,
    assets: &'a BTreeMap<String, CachedAsset>,
}

impl ResolvedAssets {
    /// Name → verified local path.
    pub fn paths(&self) -> BTreeMap<&str, &Path> {
        self.assets
            .iter()
            .map(|(name, a)| (name.as_str(), a.local_path.as_path()))
            .collect()
    }

    pub fn of_kind(&self, kind: AssetKind) -> impl Iterator<Item = &CachedAsset> {
        self.assets.values().filter(move |a| a.kind == kind)
    }

    /// Write the mapping as JSON for the next build stage.
    pub fn write_handoff(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let handoff = Handoff {
            mode: self.mode,
            paths: self.paths(),
            assets: &self.assets,
        };
        let json = serde_json::to_string_pretty(&handoff)?;
        std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
        tracing::info!(path = %path.display(), "handoff written");
        Ok(())
    }
}

pub struct AssetResolver<T: HttpTransport = CurlTransport> {
    cache: AssetCache<T>,
    staging_root: PathBuf,
    force: bool,
}

impl<T: HttpTransport> AssetResolver<T> {
    pub fn new(cache: AssetCache<T>, staging_root: impl Into<PathBuf>) -> Self {
        Self {
            cache,
            staging_root: staging_root.into(),
            force: false,
        }
    }

    /// Re-obtain every asset even when a valid cached copy exists.
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn cache(&self) -> &AssetCache<T> {
        &self.cache
    }

    pub fn staging_root(&self) -> &Path {
        &self.staging_root
    }

    /// Resolve everything `decls` names, in `mode` or the auto-selected one.
    /// The first failing asset aborts the run; no partial result is returned.
    pub fn resolve(
        &mut self,
        decls: &AssetDeclarations,
        mode: Option<ResolveMode>,
    ) -> Result<ResolvedAssets, ResolveError> {
        let mode = mode.unwrap_or_else(|| ResolveMode::select(decls, &self.staging_root));
        tracing::info!(%mode, "resolving assets");

        let assets = match mode {
            ResolveMode::Staged => {
                let descriptors = self.staged_descriptors()?;
                let mut assets = self.cache.resolve_many(&descriptors, self.force)?;
                for a in assets.values_mut() {
                    a.provenance = Provenance::Scanned;
                }
                assets
            }
            ResolveMode::LocalPaths | ResolveMode::Remote => {
                let descriptors = decls.to_descriptors().map_err(ResolveError::Declarations)?;
                check_sources_match(&descriptors, mode)?;
                preflight(&descriptors)?;
                self.cache.resolve_many(&descriptors, self.force)?
            }
        };

        tracing::info!(%mode, count = assets.len(), "assets resolved");
        Ok(ResolvedAssets { mode, assets })
    }

    /// Descriptors for every scanned file, pinned to its scanned digest and size.
    fn staged_descriptors(&self) -> Result<Vec<AssetDescriptor>, ResolveError> {
        let scanner = LocalAssetScanner::new(&self.staging_root);
        let manifest = scanner.default_manifest_path();
        if manifest.exists() {
            let drift = scanner.verify_against_manifest(&manifest);
            if !drift.is_empty() {
                return Err(ResolveError::Staging(AssetError::Integrity {
                    path: manifest,
                    reason: drift.join("; "),
                }));
            }
            tracing::info!(path = %manifest.display(), "staging tree matches manifest");
        }

        let scan = scanner.scan_all();
        if scan.is_empty() {
            tracing::warn!(root = %self.staging_root.display(), "staging tree is empty");
        }

        let mut taken = HashSet::new();
        let mut out = Vec::with_capacity(scan.len());
        for kind in AssetKind::ALL {
            for info in scan.of_kind(kind) {
                let stem = Path::new(&info.name)
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| info.name.clone());
                let name = if taken.contains(&stem) {
                    info.name.clone()
                } else {
                    stem
                };
                taken.insert(name.clone());
                let d = AssetDescriptor::local(name, scanner.absolute_path(info), kind)
                    .with_sha256(&info.sha256)
                    .map_err(ResolveError::Staging)?
                    .with_size(info.size)
                    .executable(kind == AssetKind::Script);
                out.push(d);
            }
        }
        Ok(out)
    }
}

/// Every declaration must be servable in `mode`. A declaration of the other
/// source kind would otherwise be dropped from the result.
fn check_sources_match(descriptors: &[AssetDescriptor], mode: ResolveMode) -> Result<(), ResolveError> {
    let want_remote = mode == ResolveMode::Remote;
    match descriptors.iter().find(|d| d.source().is_remote() != want_remote) {
        Some(d) => Err(ResolveError::Asset {
            name: d.name().to_string(),
            source: AssetError::config(format!(
                "{} is declared as {} but this run resolves in {} mode",
                d.kind().label(),
                d.source(),
                mode
            )),
        }),
        None => Ok(()),
    }
}

/// Every local source must exist before anything is copied.
fn preflight(descriptors: &[AssetDescriptor]) -> Result<(), ResolveError> {
    for d in descriptors {
        if let AssetSource::Local(p) = d.source() {
            if !p.is_file() {
                return Err(ResolveError::Asset {
                    name: d.name().to_string(),
                    source: AssetError::config(format!(
                        "local path does not exist: {}",
                        p.display()
                    )),
                });
            }
        }
    }
    Ok(())
}
