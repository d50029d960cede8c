//! Sequential writer for `.part` download files.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Writer for a temp download file. Appends chunks in order and is
/// renamed onto the final path by `finalize`.
pub struct StorageWriter {
    file: BufWriter<File>,
    temp_path: PathBuf,
    written: u64,
}

impl StorageWriter {
    /// Create (or truncate) the temp file at `temp_path`.
    pub fn create(temp_path: &Path, buffer_size: usize) -> io::Result<Self> {
        let file = File::options()
            .write(true)
            .create(true)
            .truncate(true)
            .open(temp_path)?;
        Ok(StorageWriter {
            file: BufWriter::with_capacity(buffer_size.max(4096), file),
            temp_path: temp_path.to_path_buf(),
            written: 0,
        })
    }

    /// Append `data` at the current end.
    pub fn write_chunk(&mut self, data: &[u8]) -> io::Result<()> {
        self.file.write_all(data)?;
        self.written += data.len() as u64;
        Ok(())
    }

    /// Bytes written so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Flush, sync and atomically rename the temp file to `final_path`.
    /// Consumes the writer and closes the file.
    pub fn finalize(self, final_path: &Path) -> io::Result<u64> {
        let StorageWriter {
            file,
            temp_path,
            written,
        } = self;
        let file = file.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        drop(file);
        std::fs::rename(&temp_path, final_path)?;
        Ok(written)
    }

    /// Drop the writer and delete the temp file.
    pub fn discard(self) -> io::Result<()> {
        let temp_path = self.temp_path.clone();
        drop(self.file);
        super::remove_if_exists(&temp_path).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::temp_path;

    #[test]
    fn write_then_finalize() {
        let dir = tempfile::tempdir().unwrap();
        let final_path = dir.path().join("output.bin");
        let tp = temp_path(&final_path);

        let mut w = StorageWriter::create(&tp, 8192).unwrap();
        w.write_chunk(b"hello ").unwrap();
        w.write_chunk(b"world").unwrap();
        assert_eq!(w.written(), 11);
        assert_eq!(w.finalize(&final_path).unwrap(), 11);

        assert!(!tp.exists());
        assert_eq!(std::fs::read(&final_path).unwrap(), b"hello world");
    }

    #[test]
    fn discard_removes_temp() {
        let dir = tempfile::tempdir().unwrap();
        let tp = dir.path().join("x.part");
        let mut w = StorageWriter::create(&tp, 0).unwrap();
        w.write_chunk(b"partial").unwrap();
        w.discard().unwrap();
        assert!(!tp.exists());
    }
}
