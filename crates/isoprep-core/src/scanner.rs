//! Discovery and hashing of a staged local asset tree.
//!
//! The staging root holds `packages/`, `scripts/` and `iso/`. Only the
//! immediate entries of each are considered. Recorded paths start with the
//! root directory's own name, so a manifest written for `local_assets/`
//! lists `local_assets/packages/foo.deb`.

use crate::build_config::{AssetDeclarations, ScriptDeclaration};
use crate::checksum;
use crate::descriptor::AssetKind;
use crate::manifest::{Manifest, ManifestEntry, MANIFEST_FILE_NAME};
use crate::storage;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// Default staging root, relative to the working directory.
pub const DEFAULT_STAGING_DIR: &str = "local_assets";

/// One scanned file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetInfo {
    /// `<root name>/<kind dir>/<file>`, `/`-separated.
    pub path: String,
    pub name: String,
    pub size: u64,
    pub md5: String,
    pub sha256: String,
    /// "deb", "script" or "iso".
    #[serde(rename = "type")]
    pub asset_type: String,
    pub executable: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanResult {
    pub packages: Vec<AssetInfo>,
    pub scripts: Vec<AssetInfo>,
    pub iso_files: Vec<AssetInfo>,
}

impl ScanResult {
    pub fn of_kind(&self, kind: AssetKind) -> &[AssetInfo] {
        match kind {
            AssetKind::Package => &self.packages,
            AssetKind::Script => &self.scripts,
            AssetKind::Iso => &self.iso_files,
        }
    }

    pub fn len(&self) -> usize {
        self.packages.len() + self.scripts.len() + self.iso_files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn total_size(&self) -> u64 {
        AssetKind::ALL
            .iter()
            .flat_map(|k| self.of_kind(*k))
            .map(|a| a.size)
            .sum()
    }

    /// Human-readable summary for terminal output.
    pub fn render_summary(&self, root: &Path) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Local assets under {}", root.display());
        for kind in AssetKind::ALL {
            let assets = self.of_kind(kind);
            let _ = writeln!(out, "\n{} ({} found)", kind.label(), assets.len());
            for a in assets {
                let exec = if kind == AssetKind::Script {
                    if a.executable {
                        " [executable]"
                    } else {
                        " [not executable]"
                    }
                } else {
                    ""
                };
                let _ = writeln!(out, "  {}{}", a.name, exec);
                let _ = writeln!(out, "    path:   {}", a.path);
                let _ = writeln!(out, "    size:   {} bytes", a.size);
                let _ = writeln!(out, "    md5:    {}", a.md5);
                let _ = writeln!(out, "    sha256: {}", a.sha256);
            }
        }
        let _ = writeln!(
            out,
            "\nTotal: {} files, {:.2} MiB",
            self.len(),
            self.total_size() as f64 / 1_048_576.0
        );
        out
    }
}

pub struct LocalAssetScanner {
    root: PathBuf,
}

impl Default for LocalAssetScanner {
    fn default() -> Self {
        Self::new(DEFAULT_STAGING_DIR)
    }
}

impl LocalAssetScanner {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn kind_dir(&self, kind: AssetKind) -> PathBuf {
        self.root.join(kind.dir_name())
    }

    /// `<root>/manifest.json`.
    pub fn default_manifest_path(&self) -> PathBuf {
        self.root.join(MANIFEST_FILE_NAME)
    }

    /// Name recorded as the first path component. Taken from the
    /// canonical root so `.` or `a/..` still yield the directory's real name.
    fn root_name(&self) -> String {
        std::fs::canonicalize(&self.root)
            .ok()
            .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .unwrap_or_else(|| self.root.display().to_string())
    }

    /// Filesystem location of a scanned asset.
    pub fn absolute_path(&self, info: &AssetInfo) -> PathBuf {
        let mut parts = Path::new(&info.path).components();
        parts.next();
        self.root.join(parts.as_path())
    }

    fn relative(&self, path: &Path) -> String {
        let inner = path.strip_prefix(&self.root).unwrap_or(path);
        std::iter::once(self.root_name())
            .chain(
                inner
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned()),
            )
            .collect::<Vec<_>>()
            .join("/")
    }

    fn inspect(&self, path: &Path, kind: AssetKind) -> std::io::Result<AssetInfo> {
        let meta = std::fs::metadata(path)?;
        let (md5, sha256) = checksum::digest_pair(path)?;
        Ok(AssetInfo {
            path: self.relative(path),
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            size: meta.len(),
            md5,
            sha256,
            asset_type: kind.scan_type().to_string(),
            executable: storage::is_executable(&meta),
        })
    }

    fn candidates(&self, kind: AssetKind, extensions: &[&str]) -> std::io::Result<Vec<PathBuf>> {
        let mut out = Vec::new();
        for entry in std::fs::read_dir(self.kind_dir(kind))?.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let ext = path
                .extension()
                .map(|e| format!(".{}", e.to_string_lossy()))
                .unwrap_or_default();
            if extensions.contains(&ext.as_str()) {
                out.push(path);
            }
        }
        Ok(out)
    }

    /// True if any kind directory holds a file the scan would pick up.
    /// Lists directories only; nothing is hashed.
    pub fn has_assets(&self) -> bool {
        AssetKind::ALL.iter().any(|k| {
            self.candidates(*k, k.default_extensions())
                .map(|c| !c.is_empty())
                .unwrap_or(false)
        })
    }

    /// Hash every regular file directly under the kind directory whose
    /// extension (with leading dot) is in `extensions`. Sorted by path.
    pub fn scan(&self, kind: AssetKind, extensions: &[&str]) -> Vec<AssetInfo> {
        let dir = self.kind_dir(kind);
        let paths = match self.candidates(kind, extensions) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(dir = %dir.display(), "cannot scan directory: {}", e);
                return Vec::new();
            }
        };
        tracing::info!(dir = %dir.display(), "scanning for {} files", kind.scan_type());

        let mut found = Vec::new();
        for path in paths {
            match self.inspect(&path, kind) {
                Ok(info) => {
                    tracing::info!(
                        "found {}: {} ({} bytes, md5 {})",
                        info.asset_type,
                        info.name,
                        info.size,
                        &info.md5[..8]
                    );
                    found.push(info);
                }
                Err(e) => tracing::error!(path = %path.display(), "error processing file: {}", e),
            }
        }
        found.sort_by(|a, b| a.path.cmp(&b.path));
        found
    }

    pub fn scan_all(&self) -> ScanResult {
        ScanResult {
            packages: self.scan(AssetKind::Package, AssetKind::Package.default_extensions()),
            scripts: self.scan(AssetKind::Script, AssetKind::Script.default_extensions()),
            iso_files: self.scan(AssetKind::Iso, AssetKind::Iso.default_extensions()),
        }
    }

    pub fn write_manifest(&self, scan: &ScanResult, path: &Path) -> Result<()> {
        Manifest::from_scan(scan, &self.root).save(path)
    }

    /// Re-scan and compare against the manifest at `path`. Returns one
    /// message per problem; empty means the tree matches.
    pub fn verify_against_manifest(&self, path: &Path) -> Vec<String> {
        if !path.exists() {
            return vec![format!("Manifest file not found: {}", path.display())];
        }
        let manifest = match Manifest::load(path) {
            Ok(m) => m,
            Err(e) => return vec![format!("Error reading manifest: {:#}", e)],
        };

        let current = self.scan_all();
        let mut errors = Vec::new();
        let sections: [(AssetKind, &[ManifestEntry]); 3] = [
            (AssetKind::Package, manifest.packages.as_slice()),
            (AssetKind::Script, manifest.scripts.as_slice()),
            (AssetKind::Iso, manifest.iso_files.as_slice()),
        ];
        for (kind, recorded) in sections {
            let now: HashMap<&str, &AssetInfo> = current
                .of_kind(kind)
                .iter()
                .map(|a| (a.path.as_str(), a))
                .collect();
            for entry in recorded {
                match now.get(entry.path.as_str()) {
                    None => errors.push(format!("{} missing: {}", kind.label(), entry.path)),
                    Some(a) if !a.sha256.eq_ignore_ascii_case(&entry.sha256) => errors.push(
                        format!("{} checksum mismatch: {}", kind.label(), entry.path),
                    ),
                    Some(_) => {}
                }
            }
        }
        errors
    }

    /// Declarations that adopt the scanned assets by local path.
    pub fn config_snippet(&self, scan: &ScanResult, include_checksums: bool) -> AssetDeclarations {
        let mut decls = AssetDeclarations::default();
        decls.packages.deb_local_paths = scan
            .packages
            .iter()
            .map(|a| PathBuf::from(&a.path))
            .collect();
        decls.first_boot.scripts = scan
            .scripts
            .iter()
            .map(|a| ScriptDeclaration {
                name: None,
                url: None,
                local_path: Some(PathBuf::from(&a.path)),
                checksum: include_checksums.then(|| a.sha256.clone()),
                executable: true,
            })
            .collect();
        if let Some(iso) = scan.iso_files.first() {
            decls.base_iso_path = Some(PathBuf::from(&iso.path));
            if include_checksums {
                decls.base_iso_checksum = Some(iso.sha256.clone());
            }
        }
        decls
    }
}
