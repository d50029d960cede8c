//! Minimal HTTP/1.1 server for integration tests.
//!
//! Serves static bodies by path, answers HEAD, and can fail the first N
//! GETs (with a status code or by closing the connection without a reply).
//! Every request is recorded so tests can assert on request counts.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

/// How an injected failure looks on the wire.
#[derive(Debug, Clone, Copy)]
pub enum Failure {
    Status(u16),
    /// Close the socket without writing anything.
    Drop,
}

#[derive(Debug, Clone, Default)]
pub struct ServerOptions {
    /// Fail this many GETs (across all paths) before serving normally.
    pub fail_first: usize,
    pub failure: Option<Failure>,
}

/// Handle to a running server. It runs until the process exits.
#[derive(Clone)]
pub struct AssetServer {
    base: String,
    requests: Arc<Mutex<Vec<(String, String)>>>,
}

impl AssetServer {
    /// Full URL for `path` (which must start with '/').
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    /// Recorded (method, path) pairs, in arrival order.
    pub fn requests(&self) -> Vec<(String, String)> {
        self.requests.lock().unwrap().clone()
    }

    pub fn get_count(&self) -> usize {
        self.requests().iter().filter(|(m, _)| m == "GET").count()
    }
}

pub fn start(routes: Vec<(&str, Vec<u8>)>) -> AssetServer {
    start_with_options(routes, ServerOptions::default())
}

pub fn start_with_options(routes: Vec<(&str, Vec<u8>)>, opts: ServerOptions) -> AssetServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let routes: Arc<HashMap<String, Vec<u8>>> = Arc::new(
        routes
            .into_iter()
            .map(|(p, b)| (p.to_string(), b))
            .collect(),
    );
    let requests = Arc::new(Mutex::new(Vec::new()));
    let failures_left = Arc::new(AtomicUsize::new(opts.fail_first));
    let server = AssetServer {
        base: format!("http://127.0.0.1:{}", port),
        requests: Arc::clone(&requests),
    };
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let routes = Arc::clone(&routes);
            let requests = Arc::clone(&requests);
            let failures_left = Arc::clone(&failures_left);
            let failure = opts.failure;
            thread::spawn(move || handle(stream, &routes, &requests, &failures_left, failure));
        }
    });
    server
}

fn handle(
    mut stream: TcpStream,
    routes: &HashMap<String, Vec<u8>>,
    requests: &Mutex<Vec<(String, String)>>,
    failures_left: &AtomicUsize,
    failure: Option<Failure>,
) {
    let _ = stream.set_read_timeout(Some(std::time::Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(std::time::Duration::from_secs(2)));
    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) | Err(_) => return,
        Ok(n) => n,
    };
    let request = match std::str::from_utf8(&buf[..n]) {
        Ok(s) => s,
        Err(_) => return,
    };
    let mut first = request.lines().next().unwrap_or("").split_whitespace();
    let method = first.next().unwrap_or("").to_string();
    let path = first.next().unwrap_or("/").to_string();
    requests.lock().unwrap().push((method.clone(), path.clone()));

    if method == "GET" {
        let fail_now = failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if fail_now {
            match failure.unwrap_or(Failure::Status(500)) {
                Failure::Drop => return,
                Failure::Status(code) => {
                    let response = format!(
                        "HTTP/1.1 {} Injected\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                        code
                    );
                    let _ = stream.write_all(response.as_bytes());
                    return;
                }
            }
        }
    }

    let Some(body) = routes.get(&path) else {
        let _ = stream
            .write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n");
        return;
    };
    let head = format!(
        "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nContent-Type: application/octet-stream\r\n\
ETag: \"v1\"\r\nConnection: close\r\n\r\n",
        body.len()
    );
    let _ = stream.write_all(head.as_bytes());
    if method == "GET" {
        let _ = stream.write_all(body);
    }
}
