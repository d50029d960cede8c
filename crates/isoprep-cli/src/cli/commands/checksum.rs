//! `isoprep checksum` – digest of a single file.

use anyhow::{Context, Result};
use isoprep_core::checksum::{self, HashAlgorithm};
use std::path::Path;

/// Print `<digest>  <path>` like sha256sum/md5sum.
pub fn run_checksum(path: &Path, algorithm: HashAlgorithm) -> Result<()> {
    let digest = checksum::digest(path, algorithm)
        .with_context(|| format!("hashing {}", path.display()))?;
    println!("{}  {}", digest, path.display());
    Ok(())
}
