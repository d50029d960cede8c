//! HTTP GET transport seam and its libcurl implementation.

use crate::retry::FetchError;
use std::cell::Cell;
use std::time::Duration;

/// Parameters for one GET.
#[derive(Debug, Clone, Copy)]
pub struct GetRequest<'a> {
    pub url: &'a str,
    /// Connect timeout, and the longest the body may stall.
    pub timeout: Duration,
    pub user_agent: &'a str,
    /// Preferred receive buffer size.
    pub chunk_size: usize,
}

/// Receives the response body as it streams in.
pub trait BodySink {
    /// Called once before the first chunk with the declared `Content-Length`.
    fn content_length(&mut self, len: Option<u64>);
    fn write_chunk(&mut self, data: &[u8]) -> std::io::Result<()>;
}

/// Performs a single streaming GET. Non-2xx responses are errors.
pub trait HttpTransport {
    fn get(&mut self, request: &GetRequest<'_>, sink: &mut dyn BodySink) -> Result<(), FetchError>;
}

/// libcurl-backed transport. Owns one Easy handle so connections are
/// reused across fetches; the handle is released when this is dropped.
pub struct CurlTransport {
    easy: curl::easy::Easy,
}

impl CurlTransport {
    pub fn new() -> Self {
        Self {
            easy: curl::easy::Easy::new(),
        }
    }
}

impl Default for CurlTransport {
    fn default() -> Self {
        Self::new()
    }
}

/// Pull `Content-Length` out of one raw header line.
fn parse_content_length(line: &str) -> Option<u64> {
    let (name, value) = line.split_once(':')?;
    if !name.trim().eq_ignore_ascii_case("content-length") {
        return None;
    }
    value.trim().parse().ok()
}

impl HttpTransport for CurlTransport {
    fn get(&mut self, request: &GetRequest<'_>, sink: &mut dyn BodySink) -> Result<(), FetchError> {
        let easy = &mut self.easy;
        easy.url(request.url)?;
        easy.get(true)?;
        easy.useragent(request.user_agent)?;
        easy.follow_location(true)?;
        easy.max_redirections(10)?;
        easy.fail_on_error(true)?;
        easy.buffer_size(request.chunk_size)?;
        easy.connect_timeout(request.timeout)?;
        // Abort when fewer than 1 byte/s arrives for `timeout`: a read timeout, not a total one.
        easy.low_speed_limit(1)?;
        easy.low_speed_time(request.timeout)?;

        let length: Cell<Option<u64>> = Cell::new(None);
        let mut announced = false;
        let mut write_err: Option<std::io::Error> = None;

        let performed = {
            let mut transfer = easy.transfer();
            transfer.header_function(|data| {
                if let Ok(line) = std::str::from_utf8(data) {
                    if line.starts_with("HTTP/") {
                        // New response (redirect hop); forget the previous length.
                        length.set(None);
                    } else if let Some(n) = parse_content_length(line) {
                        length.set(Some(n));
                    }
                }
                true
            })?;
            transfer.write_function(|data| {
                if !announced {
                    sink.content_length(length.get());
                    announced = true;
                }
                match sink.write_chunk(data) {
                    Ok(()) => Ok(data.len()),
                    Err(e) => {
                        write_err = Some(e);
                        Ok(0) // abort transfer
                    }
                }
            })?;
            transfer.perform()
        };

        if let Some(e) = write_err {
            return Err(FetchError::Io(e));
        }
        if let Err(e) = performed {
            if e.is_http_returned_error() {
                let code = easy.response_code().unwrap_or(0);
                return Err(FetchError::Http(code));
            }
            return Err(FetchError::Curl(e));
        }

        let code = easy.response_code()?;
        if !(200..300).contains(&code) {
            return Err(FetchError::Http(code));
        }
        if !announced {
            // Empty body: still report the declared length once.
            sink.content_length(length.get());
        }
        Ok(())
    }
}
