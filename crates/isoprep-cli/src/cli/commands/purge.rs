//! `isoprep purge` – age-based cache cleanup.

use anyhow::{Context, Result};
use isoprep_core::cache::purge_cache_older_than;
use std::path::Path;

pub fn run_purge(cache_root: &Path, days: u64) -> Result<()> {
    let removed = purge_cache_older_than(cache_root, days)
        .with_context(|| format!("purging {}", cache_root.display()))?;
    println!(
        "Removed {} cached file(s) older than {} day(s) from {}",
        removed,
        days,
        cache_root.display()
    );
    Ok(())
}
