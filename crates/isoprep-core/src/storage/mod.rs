//! Temp-file lifecycle for downloads and local copies.
//!
//! Content is streamed into `<final>.part` and only renamed onto the final
//! path once complete, so a reader never observes a half-written asset.

mod writer;

pub use writer::StorageWriter;

use std::io;
use std::path::{Path, PathBuf};

/// Temporary file suffix used before atomic rename.
pub const TEMP_SUFFIX: &str = ".part";

/// Path for the temp file: appends `.part` to the final path (e.g. `file.iso` → `file.iso.part`).
pub fn temp_path(final_path: &Path) -> PathBuf {
    let mut o = final_path.as_os_str().to_owned();
    o.push(TEMP_SUFFIX);
    PathBuf::from(o)
}

/// Remove a file if present. Returns whether something was removed.
pub fn remove_if_exists(path: &Path) -> io::Result<bool> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Best-effort removal of a final path and its temp sibling after a failure.
pub fn discard(final_path: &Path) {
    for p in [temp_path(final_path), final_path.to_path_buf()] {
        if let Err(e) = remove_if_exists(&p) {
            tracing::warn!(path = %p.display(), "could not remove partial file: {}", e);
        }
    }
}

/// Set `0o755` on a file. No-op on non-Unix targets.
pub fn set_executable(path: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))?;
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}

/// Whether any execute bit is set.
pub fn is_executable(meta: &std::fs::Metadata) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        meta.permissions().mode() & 0o111 != 0
    }
    #[cfg(not(unix))]
    {
        let _ = meta;
        false
    }
}

/// Copy `src` to `dest` through a `.part` file and rename into place.
pub fn copy_atomic(src: &Path, dest: &Path) -> io::Result<u64> {
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = temp_path(dest);
    let copied = match std::fs::copy(src, &tmp) {
        Ok(n) => n,
        Err(e) => {
            let _ = remove_if_exists(&tmp);
            return Err(e);
        }
    };
    if let Err(e) = std::fs::rename(&tmp, dest) {
        let _ = remove_if_exists(&tmp);
        return Err(e);
    }
    Ok(copied)
}
