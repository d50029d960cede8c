//! Age-based cleanup of cache directories.

use crate::descriptor::AssetKind;
use crate::storage;
use std::io;
use std::path::Path;
use std::time::{Duration, SystemTime};

const SECS_PER_DAY: u64 = 24 * 60 * 60;

/// Remove regular files directly under each kind directory of `root` whose
/// mtime is more than `days` old. Missing directories are skipped.
pub(crate) fn purge_older_than(root: &Path, days: u64) -> io::Result<usize> {
    let cutoff = SystemTime::now()
        .checked_sub(Duration::from_secs(days.saturating_mul(SECS_PER_DAY)))
        .unwrap_or(SystemTime::UNIX_EPOCH);
    let mut removed = 0;
    for kind in AssetKind::ALL {
        let dir = root.join(kind.dir_name());
        let entries = match std::fs::read_dir(&dir) {
            Ok(e) => e,
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e),
        };
        for entry in entries {
            let entry = entry?;
            let meta = entry.metadata()?;
            if !meta.is_file() {
                continue;
            }
            if meta.modified()? < cutoff && storage::remove_if_exists(&entry.path())? {
                tracing::info!(path = %entry.path().display(), "removed stale cache file");
                removed += 1;
            }
        }
    }
    Ok(removed)
}
