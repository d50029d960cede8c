//! Content digests and integrity checks.
//!
//! SHA-256 is the integrity check for everything new. MD5 is only computed
//! alongside it for manifest consumers that still expect it, and is never
//! used on its own to accept a file.

use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::str::FromStr;

const BUF_SIZE: usize = 64 * 1024;

/// Supported digest algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Sha256,
    Md5,
}

impl FromStr for HashAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sha256" | "sha-256" => Ok(HashAlgorithm::Sha256),
            "md5" => Ok(HashAlgorithm::Md5),
            other => Err(format!("unsupported hash algorithm: {}", other)),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HashAlgorithm::Sha256 => f.write_str("sha256"),
            HashAlgorithm::Md5 => f.write_str("md5"),
        }
    }
}

/// Read `path` in fixed-size chunks, feeding each chunk to `update`.
fn stream_chunks(path: &Path, mut update: impl FnMut(&[u8])) -> io::Result<()> {
    let mut f = File::open(path)?;
    let mut buf = vec![0u8; BUF_SIZE];
    loop {
        let n = f.read(&mut buf)?;
        if n == 0 {
            break;
        }
        update(&buf[..n]);
    }
    Ok(())
}

/// Compute the digest of a file as lowercase hex.
/// Memory use is bounded by the chunk size regardless of file size.
pub fn digest(path: &Path, algorithm: HashAlgorithm) -> io::Result<String> {
    match algorithm {
        HashAlgorithm::Sha256 => sha256_path(path),
        HashAlgorithm::Md5 => {
            let mut ctx = md5::Context::new();
            stream_chunks(path, |chunk| ctx.consume(chunk))?;
            Ok(format!("{:x}", ctx.compute()))
        }
    }
}

/// Compute SHA-256 of a file and return the digest as lowercase hex.
pub fn sha256_path(path: &Path) -> io::Result<String> {
    let mut hasher = Sha256::new();
    stream_chunks(path, |chunk| hasher.update(chunk))?;
    Ok(hex::encode(hasher.finalize()))
}

/// MD5 and SHA-256 from a single read of the file: `(md5, sha256)`.
pub fn digest_pair(path: &Path) -> io::Result<(String, String)> {
    let mut md5_ctx = md5::Context::new();
    let mut sha = Sha256::new();
    stream_chunks(path, |chunk| {
        md5_ctx.consume(chunk);
        sha.update(chunk);
    })?;
    Ok((format!("{:x}", md5_ctx.compute()), hex::encode(sha.finalize())))
}

/// Measured identity of a file that passed `check`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDigest {
    pub size: u64,
    pub sha256: String,
}

/// Why a file failed `check`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrityMismatch {
    Missing,
    Unreadable(String),
    Size { expected: u64, actual: u64 },
    Sha256 { expected: String, actual: String },
}

impl fmt::Display for IntegrityMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntegrityMismatch::Missing => write!(f, "file is missing"),
            IntegrityMismatch::Unreadable(e) => write!(f, "file is unreadable: {}", e),
            IntegrityMismatch::Size { expected, actual } => {
                write!(f, "size mismatch: expected {}, got {}", expected, actual)
            }
            IntegrityMismatch::Sha256 { expected, actual } => {
                write!(f, "SHA256 mismatch: expected {}, got {}", expected, actual)
            }
        }
    }
}

/// Measure `path` and compare it against whatever was declared.
///
/// Size is compared first since it needs no read. An undeclared check
/// always passes. The SHA-256 is always measured so callers get a
/// trustworthy digest even when none was declared.
pub fn check(
    path: &Path,
    expected_sha256: Option<&str>,
    expected_size: Option<u64>,
) -> Result<FileDigest, IntegrityMismatch> {
    let meta = match std::fs::metadata(path) {
        Ok(m) if m.is_file() => m,
        Ok(_) => return Err(IntegrityMismatch::Missing),
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(IntegrityMismatch::Missing),
        Err(e) => return Err(IntegrityMismatch::Unreadable(e.to_string())),
    };
    let size = meta.len();
    if let Some(expected) = expected_size {
        if size != expected {
            return Err(IntegrityMismatch::Size {
                expected,
                actual: size,
            });
        }
    }
    let sha256 = sha256_path(path).map_err(|e| IntegrityMismatch::Unreadable(e.to_string()))?;
    if let Some(expected) = expected_sha256 {
        if !sha256.eq_ignore_ascii_case(expected.trim()) {
            return Err(IntegrityMismatch::Sha256 {
                expected: expected.to_string(),
                actual: sha256,
            });
        }
    }
    Ok(FileDigest { size, sha256 })
}

/// True if the file exists and every declared check passes. Never errors.
pub fn verify(path: &Path, expected_sha256: Option<&str>, expected_size: Option<u64>) -> bool {
    match check(path, expected_sha256, expected_size) {
        Ok(_) => true,
        Err(reason) => {
            tracing::warn!(path = %path.display(), "verification failed: {}", reason);
            false
        }
    }
}

/// True if `s` looks like a SHA-256 hex digest.
pub fn is_sha256_hex(s: &str) -> bool {
    s.len() == 64 && s.bytes().all(|b| b.is_ascii_hexdigit())
}
