//! On-disk manifest of a scanned asset tree (`manifest.json`).

use crate::scanner::{AssetInfo, ScanResult};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// File name used when a manifest path is not given explicitly.
pub const MANIFEST_FILE_NAME: &str = "manifest.json";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestSummary {
    pub total_packages: usize,
    pub total_scripts: usize,
    pub total_iso_files: usize,
    pub total_size_bytes: u64,
}

/// One file recorded in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub path: String,
    pub name: String,
    pub size: u64,
    pub md5: String,
    pub sha256: String,
    #[serde(rename = "type")]
    pub asset_type: String,
    /// Only recorded for scripts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executable: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_directory: Option<String>,
    /// Seconds since the Unix epoch, UTC. Never written by `from_scan`, so
    /// an unchanged tree always produces the same bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<u64>,
    pub summary: ManifestSummary,
    pub packages: Vec<ManifestEntry>,
    pub scripts: Vec<ManifestEntry>,
    /// Absent in manifests written before ISO scanning existed.
    #[serde(default)]
    pub iso_files: Vec<ManifestEntry>,
}

fn entry(info: &AssetInfo, with_executable: bool) -> ManifestEntry {
    ManifestEntry {
        path: info.path.clone(),
        name: info.name.clone(),
        size: info.size,
        md5: info.md5.clone(),
        sha256: info.sha256.clone(),
        asset_type: info.asset_type.clone(),
        executable: with_executable.then_some(info.executable),
    }
}

impl Manifest {
    pub fn from_scan(scan: &ScanResult, base_directory: &Path) -> Self {
        Self {
            base_directory: Some(base_directory.display().to_string()),
            generated_at: None,
            summary: ManifestSummary {
                total_packages: scan.packages.len(),
                total_scripts: scan.scripts.len(),
                total_iso_files: scan.iso_files.len(),
                total_size_bytes: scan.total_size(),
            },
            packages: scan.packages.iter().map(|a| entry(a, false)).collect(),
            scripts: scan.scripts.iter().map(|a| entry(a, true)).collect(),
            iso_files: scan.iso_files.iter().map(|a| entry(a, false)).collect(),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_str(&data).with_context(|| format!("parsing {}", path.display()))
    }

    /// Write pretty JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
        tracing::info!(path = %path.display(), "asset manifest saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_manifest_without_iso_files_and_extra_keys() {
        let json = r#"{
            "scan_time": "/home/build",
            "summary": {"total_packages": 1, "total_scripts": 0, "total_iso_files": 0, "total_size_bytes": 13},
            "packages": [{"path": "local_assets/packages/a.deb", "name": "a.deb", "size": 13,
                          "md5": "m", "sha256": "s", "type": "deb"}],
            "scripts": []
        }"#;
        let m: Manifest = serde_json::from_str(json).unwrap();
        assert_eq!(m.packages.len(), 1);
        assert_eq!(m.packages[0].asset_type, "deb");
        assert!(m.packages[0].executable.is_none());
        assert!(m.iso_files.is_empty());
        assert!(m.generated_at.is_none());
    }

    #[test]
    fn executable_written_for_scripts_only() {
        let info = |t: &str| AssetInfo {
            path: format!("x/{}", t),
            name: t.to_string(),
            size: 1,
            md5: "m".into(),
            sha256: "s".into(),
            asset_type: t.to_string(),
            executable: true,
        };
        let scan = ScanResult {
            packages: vec![info("deb")],
            scripts: vec![info("script")],
            iso_files: vec![],
        };
        let v = serde_json::to_value(Manifest::from_scan(&scan, Path::new("x"))).unwrap();
        assert!(v["packages"][0].get("executable").is_none());
        assert_eq!(v["scripts"][0]["executable"], true);
        assert_eq!(v["scripts"][0]["type"], "script");
        assert_eq!(v["summary"]["total_size_bytes"], 2);
    }

    #[test]
    fn saving_the_same_scan_twice_is_byte_identical() {
        let tmp = tempfile::tempdir().unwrap();
        let scan = ScanResult {
            packages: vec![AssetInfo {
                path: "local_assets/packages/a.deb".into(),
                name: "a.deb".into(),
                size: 13,
                md5: "m".into(),
                sha256: "s".into(),
                asset_type: "deb".into(),
                executable: false,
            }],
            ..ScanResult::default()
        };
        let first = tmp.path().join("first.json");
        let second = tmp.path().join("second.json");

        Manifest::from_scan(&scan, Path::new("local_assets")).save(&first).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(1100));
        Manifest::from_scan(&scan, Path::new("local_assets")).save(&second).unwrap();

        assert_eq!(std::fs::read(&first).unwrap(), std::fs::read(&second).unwrap());
        assert_eq!(Manifest::load(&first).unwrap(), Manifest::from_scan(&scan, Path::new("local_assets")));
    }
}
