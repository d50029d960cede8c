//! Integration tests: real curl transfers against a local HTTP server.

mod common;

use common::asset_server::{self, Failure, ServerOptions};
use isoprep_core::build_config::{AssetDeclarations, PackageDeclarations};
use isoprep_core::fetch::{FetchOptions, RetryingFetcher};
use isoprep_core::fetch_head;
use isoprep_core::progress::NoProgress;
use isoprep_core::retry::RetryPolicy;
use isoprep_core::storage;
use isoprep_core::{AssetCache, AssetDescriptor, AssetError, AssetKind, AssetResolver, ResolveMode};
use std::time::Duration;
use tempfile::tempdir;

const HELLO_SHA: &str = "dffd6021bb2bd5b0af676290809ec3a53191dd81c7f70a4b28688a362182986f";

fn fast_options(max_retries: u32) -> FetchOptions {
    FetchOptions {
        retry: RetryPolicy {
            max_retries,
            base_delay: Duration::from_millis(10),
        },
        timeout: Duration::from_secs(5),
        ..FetchOptions::default()
    }
}

#[test]
fn fetch_survives_two_failures() {
    let server = asset_server::start_with_options(
        vec![("/pool/hello.deb", b"Hello, World!".to_vec())],
        ServerOptions {
            fail_first: 2,
            failure: Some(Failure::Status(503)),
        },
    );
    let dir = tempdir().unwrap();
    let dest = dir.path().join("hello.deb");
    let mut fetcher = RetryingFetcher::new(fast_options(3));

    let n = fetcher
        .fetch(&server.url("/pool/hello.deb"), &dest, &mut NoProgress)
        .unwrap();

    assert_eq!(n, 13);
    assert_eq!(std::fs::read(&dest).unwrap(), b"Hello, World!");
    let gets: Vec<_> = server.requests().into_iter().filter(|(m, _)| m == "GET").collect();
    assert_eq!(gets.len(), 3);
    assert!(gets.iter().all(|(_, p)| p == "/pool/hello.deb"));
}

#[test]
fn dropped_connections_are_retried() {
    let server = asset_server::start_with_options(
        vec![("/a.sh", b"#!/bin/sh\n".to_vec())],
        ServerOptions {
            fail_first: 1,
            failure: Some(Failure::Drop),
        },
    );
    let dir = tempdir().unwrap();
    let dest = dir.path().join("a.sh");
    let mut fetcher = RetryingFetcher::new(fast_options(1));

    fetcher.fetch(&server.url("/a.sh"), &dest, &mut NoProgress).unwrap();

    assert_eq!(server.get_count(), 2);
}

#[test]
fn exhausted_retries_return_download_error_and_no_file() {
    let server = asset_server::start_with_options(
        vec![("/x.deb", b"never".to_vec())],
        ServerOptions {
            fail_first: 10,
            failure: Some(Failure::Status(500)),
        },
    );
    let dir = tempdir().unwrap();
    let dest = dir.path().join("x.deb");
    let mut fetcher = RetryingFetcher::new(fast_options(2));

    let err = fetcher
        .fetch(&server.url("/x.deb"), &dest, &mut NoProgress)
        .unwrap_err();

    match err {
        AssetError::Download(d) => {
            assert_eq!(d.attempts, 3);
            assert!(d.url.ends_with("/x.deb"));
        }
        other => panic!("expected download error, got {:?}", other),
    }
    assert_eq!(server.get_count(), 3);
    assert!(!dest.exists());
    assert!(!storage::temp_path(&dest).exists());
}

#[test]
fn cache_hit_makes_zero_requests() {
    let server = asset_server::start(vec![("/pool/hello.deb", b"Hello, World!".to_vec())]);
    let root = tempdir().unwrap();
    let mut cache = AssetCache::new(root.path(), RetryingFetcher::new(fast_options(0)))
        .with_progress(Box::new(NoProgress));
    let desc = AssetDescriptor::remote("hello", server.url("/pool/hello.deb"), AssetKind::Package)
        .with_sha256(HELLO_SHA)
        .unwrap();

    let first = cache.resolve(&desc, false).unwrap();
    assert_eq!(server.get_count(), 1);
    let second = cache.resolve(&desc, false).unwrap();
    assert_eq!(server.get_count(), 1);
    assert_eq!(first, second);
}

#[test]
fn corrupted_cache_file_is_refetched() {
    let server = asset_server::start(vec![("/pool/hello.deb", b"Hello, World!".to_vec())]);
    let root = tempdir().unwrap();
    let mut cache = AssetCache::new(root.path(), RetryingFetcher::new(fast_options(0)))
        .with_progress(Box::new(NoProgress));
    let desc = AssetDescriptor::remote("hello", server.url("/pool/hello.deb"), AssetKind::Package)
        .with_sha256(HELLO_SHA)
        .unwrap();
    let path = cache.resolve(&desc, false).unwrap().local_path;
    std::fs::write(&path, b"bit rot").unwrap();

    let again = cache.resolve(&desc, false).unwrap();

    assert_eq!(server.get_count(), 2);
    assert_eq!(again.sha256, HELLO_SHA);
    assert_eq!(std::fs::read(&path).unwrap(), b"Hello, World!");
}

#[test]
fn declared_size_mismatch_fails_and_leaves_nothing() {
    let server = asset_server::start(vec![("/pool/hello.deb", b"Hello, World!".to_vec())]);
    let root = tempdir().unwrap();
    let mut cache = AssetCache::new(root.path(), RetryingFetcher::new(fast_options(2)))
        .with_progress(Box::new(NoProgress));
    let desc = AssetDescriptor::remote("hello", server.url("/pool/hello.deb"), AssetKind::Package)
        .with_size(12);

    let err = cache.resolve(&desc, false).unwrap_err();

    match err {
        AssetError::Integrity { reason, .. } => assert!(reason.contains("size mismatch"), "{}", reason),
        other => panic!("expected integrity error, got {:?}", other),
    }
    let path = cache.cache_path(&desc);
    assert!(!path.exists());
    assert!(!storage::temp_path(&path).exists());
    assert_eq!(server.get_count(), 1);
}

#[test]
fn resolver_remote_mode_end_to_end() {
    let server = asset_server::start(vec![
        ("/pool/hello.deb", b"Hello, World!".to_vec()),
        ("/pool/other.deb", b"other".to_vec()),
    ]);
    let tmp = tempdir().unwrap();
    let cache = AssetCache::new(tmp.path().join("cache"), RetryingFetcher::new(fast_options(0)))
        .with_progress(Box::new(NoProgress));
    let mut resolver = AssetResolver::new(cache, tmp.path().join("local_assets"));
    let decls = AssetDeclarations {
        packages: PackageDeclarations {
            deb_urls: vec![server.url("/pool/hello.deb"), server.url("/pool/other.deb")],
            ..Default::default()
        },
        ..Default::default()
    };

    let out = resolver.resolve(&decls, None).unwrap();

    assert_eq!(out.mode, ResolveMode::Remote);
    let paths = out.paths();
    assert_eq!(paths.len(), 2);
    assert!(paths["hello"].ends_with("packages/hello.deb"));
    assert!(paths["other"].ends_with("packages/other.deb"));
}

#[test]
fn head_probe_reads_headers() {
    let server = asset_server::start(vec![("/base.iso", vec![7u8; 4096])]);

    let head = fetch_head::probe(&server.url("/base.iso"), Duration::from_secs(5)).unwrap();

    assert_eq!(head.status, 200);
    assert_eq!(head.content_length, Some(4096));
    assert_eq!(head.etag.as_deref(), Some("v1"));
    assert_eq!(head.content_type.as_deref(), Some("application/octet-stream"));
    assert!(fetch_head::is_reachable(&server.url("/base.iso")));
    assert!(!fetch_head::is_reachable(&server.url("/missing.iso")));
    assert_eq!(server.get_count(), 0);
}
