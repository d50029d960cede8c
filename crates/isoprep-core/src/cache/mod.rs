//! Content-verified asset cache.
//!
//! Layout: `<root>/{packages,scripts,iso}/<file>`. A file already in the
//! cache that passes its declared checks is returned with no network I/O;
//! anything that fails verification is deleted, never handed out.

mod asset;
mod purge;

pub use asset::{CachedAsset, Provenance};

use asset::{transition, AssetState};

use crate::checksum::{self, FileDigest};
use crate::descriptor::{AssetDescriptor, AssetKind, AssetSource};
use crate::error::{AssetError, AssetResult, ResolveError};
use crate::fetch::{CurlTransport, HttpTransport, RetryingFetcher};
use crate::progress::{LogProgress, ProgressObserver};
use crate::script_check::{self, SyntaxCheck};
use crate::storage;
use crate::url_model;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

/// Behavior switches for `AssetCache`.
#[derive(Debug, Clone, Copy)]
pub struct CacheOptions {
    /// Run the script content check on newly obtained scripts.
    pub validate_scripts: bool,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            validate_scripts: true,
        }
    }
}

/// Delete files older than `days` from every kind directory under `root`.
pub fn purge_cache_older_than(root: &Path, days: u64) -> std::io::Result<usize> {
    purge::purge_older_than(root, days)
}

pub struct AssetCache<T: HttpTransport = CurlTransport> {
    root: PathBuf,
    fetcher: RetryingFetcher<T>,
    options: CacheOptions,
    progress: Box<dyn ProgressObserver>,
}

impl<T: HttpTransport> AssetCache<T> {
    pub fn new(root: impl Into<PathBuf>, fetcher: RetryingFetcher<T>) -> Self {
        Self {
            root: root.into(),
            fetcher,
            options: CacheOptions::default(),
            progress: Box::new(LogProgress::new()),
        }
    }

    pub fn with_options(mut self, options: CacheOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_progress(mut self, observer: Box<dyn ProgressObserver>) -> Self {
        self.progress = observer;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn fetcher(&self) -> &RetryingFetcher<T> {
        &self.fetcher
    }

    /// Where `descriptor` lives in the cache.
    pub fn cache_path(&self, descriptor: &AssetDescriptor) -> PathBuf {
        self.root
            .join(descriptor.kind().dir_name())
            .join(url_model::derive_cache_filename(
                descriptor.source(),
                descriptor.name(),
            ))
    }

    /// True if the cache holds a copy of `descriptor` that passes its checks.
    pub fn contains(&self, descriptor: &AssetDescriptor) -> bool {
        let path = self.cache_path(descriptor);
        path.is_file()
            && checksum::check(
                &path,
                descriptor.expected_sha256(),
                descriptor.expected_size_bytes(),
            )
            .is_ok()
    }

    /// Return a verified local copy of `descriptor`, fetching or copying it
    /// into the cache when needed. `force` skips the cache-hit shortcut.
    pub fn resolve(&mut self, descriptor: &AssetDescriptor, force: bool) -> AssetResult<CachedAsset> {
        let name = descriptor.name();
        transition(name, AssetState::Declared);

        if let AssetSource::Local(src) = descriptor.source() {
            if !src.is_file() {
                transition(name, AssetState::Failed);
                return Err(AssetError::config(format!(
                    "local path for '{}' does not exist: {}",
                    name,
                    src.display()
                )));
            }
        }

        let path = self.cache_path(descriptor);
        if path.exists() {
            if force {
                tracing::info!(name, path = %path.display(), "forced refresh, discarding cached copy");
                storage::remove_if_exists(&path)?;
            } else {
                match checksum::check(
                    &path,
                    descriptor.expected_sha256(),
                    descriptor.expected_size_bytes(),
                ) {
                    Ok(digest) => {
                        if descriptor.must_be_executable() {
                            storage::set_executable(&path)?;
                        }
                        tracing::info!(name, path = %path.display(), "using cached copy");
                        transition(name, AssetState::Cached);
                        return Ok(self.cached(descriptor, path, digest));
                    }
                    Err(reason) => {
                        tracing::warn!(
                            name,
                            path = %path.display(),
                            "cached copy failed verification ({}), re-obtaining",
                            reason
                        );
                        storage::remove_if_exists(&path)?;
                    }
                }
            }
        }

        match self.obtain_and_verify(descriptor, &path) {
            Ok(digest) => {
                transition(name, AssetState::Cached);
                Ok(self.cached(descriptor, path, digest))
            }
            Err(e) => {
                storage::discard(&path);
                transition(name, AssetState::Failed);
                Err(e)
            }
        }
    }

    /// Resolve descriptors in order, stopping at the first failure.
    ///
    /// Names and cache paths must be unique across the batch; a clash is
    /// rejected before anything is fetched.
    pub fn resolve_many(
        &mut self,
        descriptors: &[AssetDescriptor],
        force: bool,
    ) -> Result<BTreeMap<String, CachedAsset>, ResolveError> {
        self.check_unique(descriptors)?;
        let mut out = BTreeMap::new();
        for (i, d) in descriptors.iter().enumerate() {
            tracing::info!(
                name = d.name(),
                "resolving {} {}/{}",
                d.kind().label(),
                i + 1,
                descriptors.len()
            );
            let asset = self.resolve(d, force).map_err(|source| ResolveError::Asset {
                name: d.name().to_string(),
                source,
            })?;
            out.insert(d.name().to_string(), asset);
        }
        Ok(out)
    }

    /// Delete cached files older than `days`. Returns how many were removed.
    pub fn purge_older_than(&self, days: u64) -> std::io::Result<usize> {
        purge_cache_older_than(&self.root, days)
    }

    fn check_unique(&self, descriptors: &[AssetDescriptor]) -> Result<(), ResolveError> {
        let mut names: HashMap<&str, &AssetSource> = HashMap::new();
        let mut paths: HashMap<PathBuf, &str> = HashMap::new();
        for d in descriptors {
            let clash = if let Some(first) = names.insert(d.name(), d.source()) {
                Some(format!("name is also used by {}", first))
            } else {
                let path = self.cache_path(d);
                match paths.insert(path.clone(), d.name()) {
                    Some(other) => Some(format!(
                        "cache path {} is also used by '{}'",
                        path.display(),
                        other
                    )),
                    None => None,
                }
            };
            if let Some(reason) = clash {
                return Err(ResolveError::Asset {
                    name: d.name().to_string(),
                    source: AssetError::config(format!("duplicate asset ({}): {}", d.source(), reason)),
                });
            }
        }
        Ok(())
    }

    fn obtain_and_verify(&mut self, descriptor: &AssetDescriptor, path: &Path) -> AssetResult<FileDigest> {
        let name = descriptor.name();
        transition(name, AssetState::Fetching);
        match descriptor.source() {
            AssetSource::Remote(url) => {
                self.fetcher.fetch(url, path, self.progress.as_mut())?;
            }
            AssetSource::Local(src) => {
                let n = storage::copy_atomic(src, path)?;
                tracing::info!(name, bytes = n, "copied {} into cache", src.display());
            }
        }
        if descriptor.must_be_executable() {
            storage::set_executable(path)?;
        }

        transition(name, AssetState::Verifying);
        let digest = checksum::check(
            path,
            descriptor.expected_sha256(),
            descriptor.expected_size_bytes(),
        )
        .map_err(|reason| AssetError::Integrity {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        })?;

        if descriptor.kind() == AssetKind::Script && self.options.validate_scripts {
            let report = script_check::check_script(path);
            for w in &report.warnings {
                tracing::warn!(name, "script check: {}", w);
            }
            if !report.is_valid() {
                return Err(AssetError::Integrity {
                    path: path.to_path_buf(),
                    reason: report.errors.join("; "),
                });
            }
            match script_check::syntax_check(path, report.interpreter.as_deref()) {
                SyntaxCheck::Passed => tracing::debug!(name, "script syntax ok"),
                SyntaxCheck::Failed(diag) => {
                    tracing::warn!(name, "script has syntax errors: {}", diag)
                }
                SyntaxCheck::Skipped(why) => tracing::debug!(name, "syntax check skipped: {}", why),
            }
        }
        Ok(digest)
    }

    fn cached(&self, descriptor: &AssetDescriptor, path: PathBuf, digest: FileDigest) -> CachedAsset {
        CachedAsset {
            name: descriptor.name().to_string(),
            local_path: path,
            sha256: digest.sha256,
            size_bytes: digest.size,
            kind: descriptor.kind(),
            provenance: match descriptor.source() {
                AssetSource::Remote(_) => Provenance::Remote,
                AssetSource::Local(_) => Provenance::Local,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::AssetKind;
    use crate::fetch::testing::{Reply, ScriptedTransport};
    use crate::fetch::FetchOptions;
    use crate::progress::NoProgress;
    use crate::retry::RetryPolicy;
    use std::time::Duration;

    const HELLO_SHA: &str = "dffd6021bb2bd5b0af676290809ec3a53191dd81c7f70a4b28688a362182986f";
    const URL: &str = "https://example.com/pool/hello.deb";

    fn cache_with(transport: ScriptedTransport, root: &Path) -> AssetCache<ScriptedTransport> {
        let options = FetchOptions {
            retry: RetryPolicy {
                max_retries: 2,
                base_delay: Duration::from_millis(1),
            },
            ..FetchOptions::default()
        };
        AssetCache::new(root, RetryingFetcher::with_transport(transport, options))
            .with_progress(Box::new(NoProgress))
    }

    fn hello_pkg() -> AssetDescriptor {
        AssetDescriptor::remote("hello", URL, AssetKind::Package)
            .with_sha256(HELLO_SHA)
            .unwrap()
    }

    #[test]
    fn cache_hit_makes_no_requests() {
        let root = tempfile::tempdir().unwrap();
        let mut cache = cache_with(ScriptedTransport::serving(b"Hello, World!"), root.path());
        let desc = hello_pkg();

        let first = cache.resolve(&desc, false).unwrap();
        assert_eq!(cache.fetcher().transport().calls.len(), 1);
        assert_eq!(first.local_path, root.path().join("packages/hello.deb"));
        assert_eq!(first.sha256, HELLO_SHA);
        assert_eq!(first.size_bytes, 13);
        assert_eq!(first.provenance, Provenance::Remote);

        let second = cache.resolve(&desc, false).unwrap();
        assert_eq!(cache.fetcher().transport().calls.len(), 1);
        assert_eq!(first, second);
        assert!(cache.contains(&desc));
    }

    #[test]
    fn corrupted_cache_entry_is_refetched() {
        let root = tempfile::tempdir().unwrap();
        let mut cache = cache_with(ScriptedTransport::serving(b"Hello, World!"), root.path());
        let desc = hello_pkg();
        let path = cache.cache_path(&desc);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"Hello, World?").unwrap();
        assert!(!cache.contains(&desc));

        let got = cache.resolve(&desc, false).unwrap();

        assert_eq!(cache.fetcher().transport().calls.len(), 1);
        assert_eq!(std::fs::read(&got.local_path).unwrap(), b"Hello, World!");
    }

    #[test]
    fn force_refetches_valid_entry() {
        let root = tempfile::tempdir().unwrap();
        let mut cache = cache_with(ScriptedTransport::serving(b"Hello, World!"), root.path());
        let desc = hello_pkg();
        cache.resolve(&desc, false).unwrap();
        cache.resolve(&desc, true).unwrap();
        assert_eq!(cache.fetcher().transport().calls.len(), 2);
    }

    #[test]
    fn digest_mismatch_after_download_deletes_file() {
        let root = tempfile::tempdir().unwrap();
        let mut cache = cache_with(ScriptedTransport::serving(b"tampered"), root.path());
        let desc = hello_pkg();

        let err = cache.resolve(&desc, false).unwrap_err();

        assert!(matches!(err, AssetError::Integrity { .. }), "{:?}", err);
        assert!(!cache.cache_path(&desc).exists());
        // Integrity failures are not retried.
        assert_eq!(cache.fetcher().transport().calls.len(), 1);
    }

    #[test]
    fn size_mismatch_is_integrity_error() {
        let root = tempfile::tempdir().unwrap();
        let mut cache = cache_with(ScriptedTransport::serving(b"Hello, World!"), root.path());
        let desc = AssetDescriptor::remote("hello", URL, AssetKind::Package).with_size(99);
        let err = cache.resolve(&desc, false).unwrap_err();
        assert!(matches!(err, AssetError::Integrity { .. }));
        assert!(!cache.cache_path(&desc).exists());
    }

    #[test]
    fn undeclared_digest_trusts_existing_file() {
        let root = tempfile::tempdir().unwrap();
        let mut cache = cache_with(ScriptedTransport::default(), root.path());
        let desc = AssetDescriptor::remote("hello", URL, AssetKind::Package);
        let path = cache.cache_path(&desc);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"Hello, World!").unwrap();

        let got = cache.resolve(&desc, false).unwrap();

        assert!(cache.fetcher().transport().calls.is_empty());
        assert_eq!(got.sha256, HELLO_SHA);
    }

    #[test]
    fn download_failure_propagates_and_cleans_up() {
        let root = tempfile::tempdir().unwrap();
        let transport = ScriptedTransport::new(vec![
            Reply::PartialThenReset(b"Hel".to_vec()),
            Reply::Status(503),
            Reply::Status(503),
        ]);
        let mut cache = cache_with(transport, root.path());
        let desc = hello_pkg();

        let err = cache.resolve(&desc, false).unwrap_err();

        match err {
            AssetError::Download(d) => assert_eq!(d.attempts, 3),
            other => panic!("unexpected {:?}", other),
        }
        let path = cache.cache_path(&desc);
        assert!(!path.exists());
        assert!(!storage::temp_path(&path).exists());
    }

    #[cfg(unix)]
    #[test]
    fn local_script_copied_and_made_executable() {
        use std::os::unix::fs::PermissionsExt;
        let src_dir = tempfile::tempdir().unwrap();
        let src = src_dir.path().join("setup.sh");
        std::fs::write(&src, "#!/bin/bash\necho ok\n").unwrap();
        std::fs::set_permissions(&src, std::fs::Permissions::from_mode(0o644)).unwrap();
        let root = tempfile::tempdir().unwrap();
        let mut cache = cache_with(ScriptedTransport::default(), root.path());
        let desc = AssetDescriptor::local("setup", &src, AssetKind::Script).executable(true);

        let got = cache.resolve(&desc, false).unwrap();

        assert_eq!(got.local_path, root.path().join("scripts/setup.sh"));
        assert_eq!(got.provenance, Provenance::Local);
        let mode = std::fs::metadata(&got.local_path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
        assert!(cache.fetcher().transport().calls.is_empty());
    }

    #[test]
    fn missing_local_source_is_configuration_error() {
        let root = tempfile::tempdir().unwrap();
        let mut cache = cache_with(ScriptedTransport::default(), root.path());
        let desc = AssetDescriptor::local("gone", root.path().join("gone.deb"), AssetKind::Package);
        assert!(matches!(
            cache.resolve(&desc, false),
            Err(AssetError::Configuration(_))
        ));
    }

    #[test]
    fn non_utf8_script_rejected_and_removed() {
        let root = tempfile::tempdir().unwrap();
        let mut transport = ScriptedTransport::default();
        transport.push(Reply::Body(vec![0x23, 0x21, 0xff, 0xfe]));
        let mut cache = cache_with(transport, root.path());
        let desc = AssetDescriptor::remote("bin", "https://example.com/bin.sh", AssetKind::Script);

        let err = cache.resolve(&desc, false).unwrap_err();

        assert!(matches!(err, AssetError::Integrity { .. }));
        assert!(!cache.cache_path(&desc).exists());
    }

    #[test]
    fn same_basename_from_two_hosts_is_rejected() {
        let root = tempfile::tempdir().unwrap();
        let transport = ScriptedTransport::new(vec![
            Reply::Body(b"AAAA".to_vec()),
            Reply::Body(b"BBBB".to_vec()),
        ]);
        let mut cache = cache_with(transport, root.path());
        let descs = vec![
            AssetDescriptor::remote("tool", "https://a.example/pool/tool.deb", AssetKind::Package),
            AssetDescriptor::remote("tool", "https://b.example/pool/tool.deb", AssetKind::Package),
        ];

        let err = cache.resolve_many(&descs, false).unwrap_err();

        match err {
            ResolveError::Asset { name, source } => {
                assert_eq!(name, "tool");
                assert!(matches!(source, AssetError::Configuration(m) if m.contains("b.example")));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(cache.fetcher().transport().calls.is_empty());
        assert!(!root.path().join("packages/tool.deb").exists());
    }

    #[test]
    fn distinct_names_sharing_a_cache_path_are_rejected() {
        let root = tempfile::tempdir().unwrap();
        let mut cache = cache_with(ScriptedTransport::serving(b"x"), root.path());
        let descs = vec![
            AssetDescriptor::remote("tool-a", "https://a.example/pool/tool.deb", AssetKind::Package),
            AssetDescriptor::remote("tool-b", "https://b.example/pool/tool.deb", AssetKind::Package),
        ];

        let err = cache.resolve_many(&descs, false).unwrap_err();

        match err {
            ResolveError::Asset { name, source } => {
                assert_eq!(name, "tool-b");
                assert!(matches!(source, AssetError::Configuration(m) if m.contains("'tool-a'")));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(cache.fetcher().transport().calls.is_empty());
    }

    #[test]
    fn script_with_syntax_error_is_still_cached() {
        let root = tempfile::tempdir().unwrap();
        let transport = ScriptedTransport::serving(b"#!/bin/bash\nif true; then\n  echo open\n");
        let mut cache = cache_with(transport, root.path());
        let desc = AssetDescriptor::remote("open", "https://example.com/open.sh", AssetKind::Script);

        let got = cache.resolve(&desc, false).unwrap();

        assert!(got.local_path.is_file());
    }

    #[test]
    fn resolve_many_stops_at_first_failure() {
        let root = tempfile::tempdir().unwrap();
        let transport = ScriptedTransport::new(vec![
            Reply::Body(b"Hello, World!".to_vec()),
            Reply::Status(404),
            Reply::Status(404),
            Reply::Status(404),
        ]);
        let mut cache = cache_with(transport, root.path());
        let descs = vec![
            hello_pkg(),
            AssetDescriptor::remote("missing", "https://example.com/missing.deb", AssetKind::Package),
            AssetDescriptor::remote("never", "https://example.com/never.deb", AssetKind::Package),
        ];

        let err = cache.resolve_many(&descs, false).unwrap_err();

        match err {
            ResolveError::Asset { name, .. } => assert_eq!(name, "missing"),
            other => panic!("unexpected {:?}", other),
        }
        assert!(!cache
            .fetcher()
            .transport()
            .calls
            .iter()
            .any(|u| u.contains("never")));
    }
}
