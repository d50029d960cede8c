//! `isoprep verify` – compare a staging tree against its manifest.

use anyhow::Result;
use isoprep_core::scanner::LocalAssetScanner;
use std::path::Path;

pub fn run_verify(root: &Path, manifest: Option<&Path>) -> Result<()> {
    let scanner = LocalAssetScanner::new(root);
    let manifest = manifest
        .map(Path::to_path_buf)
        .unwrap_or_else(|| scanner.default_manifest_path());
    let errors = scanner.verify_against_manifest(&manifest);
    if errors.is_empty() {
        println!("All assets verified against {}", manifest.display());
        return Ok(());
    }
    println!("Verification failed:");
    for e in &errors {
        println!("  - {}", e);
    }
    anyhow::bail!("{} problem(s) found in {}", errors.len(), root.display())
}
