//! URL checks and cache filename derivation.
//!
//! Cache entries are named after the last path segment of the source URL
//! (or the local file name), falling back to the descriptor name. The result
//! is sanitized so it can never escape its kind directory.

use crate::descriptor::AssetSource;

/// Used when neither the source nor the descriptor name yields anything usable.
const DEFAULT_FILENAME: &str = "asset.bin";

/// Linux NAME_MAX.
const NAME_MAX: usize = 255;

/// Parse `raw` and require an `http`/`https` scheme and a host.
pub fn parse_http_url(raw: &str) -> Result<url::Url, String> {
    let parsed = url::Url::parse(raw).map_err(|e| format!("invalid URL {}: {}", raw, e))?;
    match parsed.scheme() {
        "http" | "https" => {}
        other => return Err(format!("invalid URL scheme {:?}: {}", other, raw)),
    }
    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(format!("URL has no host: {}", raw));
    }
    Ok(parsed)
}

/// Last non-empty path segment of `url`, ignoring query and fragment.
///
/// Returns `None` if the URL cannot be parsed or the path is empty/root.
pub fn filename_from_url_path(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let segment = parsed.path().split('/').filter(|s| !s.is_empty()).last()?;
    if segment == "." || segment == ".." {
        return None;
    }
    Some(segment.to_string())
}

/// Replace path separators, NUL and control characters with `_`, trim
/// leading/trailing dots and whitespace, and cap the length at NAME_MAX bytes.
pub fn sanitize_filename(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| {
            if c == '/' || c == '\\' || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();
    let trimmed = replaced.trim_matches(|c: char| c == '.' || c.is_whitespace());
    let mut take = trimmed.len().min(NAME_MAX);
    while take > 0 && !trimmed.is_char_boundary(take) {
        take -= 1;
    }
    trimmed[..take].to_string()
}

fn usable(name: String) -> Option<String> {
    let s = sanitize_filename(&name);
    if s.is_empty() || s == "." || s == ".." {
        None
    } else {
        Some(s)
    }
}

/// Deterministic cache filename for an asset.
///
/// # Examples
///
/// - remote `https://example.com/pool/tool_1.0_amd64.deb`, name `tool` → `"tool_1.0_amd64.deb"`
/// - remote `https://example.com/`, name `tool` → `"tool"`
/// - local `/srv/assets/setup.sh`, name `setup` → `"setup.sh"`
pub fn derive_cache_filename(source: &AssetSource, name: &str) -> String {
    let from_source = match source {
        AssetSource::Remote(url) => filename_from_url_path(url),
        AssetSource::Local(path) => path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned()),
    };
    from_source
        .and_then(usable)
        .or_else(|| usable(name.to_string()))
        .unwrap_or_else(|| DEFAULT_FILENAME.to_string())
}
