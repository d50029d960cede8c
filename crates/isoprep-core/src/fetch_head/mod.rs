//! HTTP HEAD probing.
//!
//! Used by `isoprep probe` and by reachability checks before a build: a
//! declared URL is considered reachable when HEAD answers below 400.

mod parse;

use anyhow::{Context, Result};
use std::str;
use std::time::Duration;

/// Default timeout for a HEAD request.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// Metadata returned by a HEAD request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeadResult {
    /// Final status code after redirects.
    pub status: u32,
    /// Size in bytes, if `Content-Length` is present.
    pub content_length: Option<u64>,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub content_type: Option<String>,
}

impl HeadResult {
    pub fn is_success(&self) -> bool {
        (200..400).contains(&self.status)
    }
}

/// Sends a HEAD request and returns the parsed headers of the final response.
///
/// Follows redirects. Any status is returned as-is; only transport failures
/// are errors.
pub fn probe(url: &str, timeout: Duration) -> Result<HeadResult> {
    let mut headers: Vec<String> = Vec::new();

    let mut easy = curl::easy::Easy::new();
    easy.url(url).context("invalid URL")?;
    easy.nobody(true)?;
    easy.follow_location(true)?;
    easy.max_redirections(10)?;
    easy.connect_timeout(timeout)?;
    easy.timeout(timeout)?;
    easy.useragent(concat!("isoprep/", env!("CARGO_PKG_VERSION")))?;

    {
        let mut transfer = easy.transfer();
        transfer.header_function(|data| {
            if let Ok(s) = str::from_utf8(data) {
                let line = s.trim_end();
                if line.starts_with("HTTP/") {
                    // Keep only the final hop's headers.
                    headers.clear();
                }
                headers.push(line.to_string());
            }
            true
        })?;
        transfer
            .perform()
            .with_context(|| format!("HEAD {} failed", url))?;
    }

    let status = easy.response_code().context("no response code")?;
    Ok(parse::parse_headers(status, &headers))
}

/// True when `url` parses as http(s) with a host and HEAD answers below 400.
pub fn is_reachable(url: &str) -> bool {
    if crate::url_model::parse_http_url(url).is_err() {
        return false;
    }
    match probe(url, PROBE_TIMEOUT) {
        Ok(head) => {
            tracing::debug!(url, status = head.status, "HEAD probe");
            head.is_success()
        }
        Err(e) => {
            tracing::debug!(url, "HEAD probe failed: {:#}", e);
            false
        }
    }
}
