//! Minimal HTTP/1.1 server for integration tests.
//!
//! Serves canned responses keyed by request path. Every response closes the
//! connection. Requests are counted per path so tests can assert that a URL
//! was never contacted.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Route {
    pub status: &'static str,
    pub content_type: Option<&'static str>,
    pub location: Option<String>,
    pub body: Vec<u8>,
    /// If false, omit Content-Length; the body ends when the connection closes.
    pub send_length: bool,
    /// Send this many body bytes, then go quiet for `stall` before closing.
    pub stall_after: Option<usize>,
    pub stall: Duration,
}

impl Route {
    pub fn ok(content_type: &'static str, body: Vec<u8>) -> Self {
        Self {
            status: "200 OK",
            content_type: Some(content_type),
            location: None,
            body,
            send_length: true,
            stall_after: None,
            stall: Duration::ZERO,
        }
    }

    pub fn redirect(location: &str) -> Self {
        Self {
            status: "302 Found",
            content_type: None,
            location: Some(location.to_string()),
            body: Vec::new(),
            send_length: true,
            stall_after: None,
            stall: Duration::ZERO,
        }
    }

    pub fn status(status: &'static str) -> Self {
        Self {
            status,
            content_type: Some("text/plain"),
            location: None,
            body: b"nope".to_vec(),
            send_length: true,
            stall_after: None,
            stall: Duration::ZERO,
        }
    }

    pub fn without_length(mut self) -> Self {
        self.send_length = false;
        self
    }

    pub fn stalling(mut self, after: usize, stall: Duration) -> Self {
        self.stall_after = Some(after);
        self.stall = stall;
        self
    }
}

pub struct ImageServer {
    /// Base URL without trailing slash, e.g. `http://127.0.0.1:12345`.
    pub base: String,
    pub port: u16,
    hits: Arc<Mutex<HashMap<String, usize>>>,
}

impl ImageServer {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    pub fn hits(&self, path: &str) -> usize {
        self.hits.lock().unwrap().get(path).copied().unwrap_or(0)
    }
}

/// Starts a server in a background thread. Unknown paths get 404.
/// The server runs until the process exits.
pub fn start(routes: Vec<(&str, Route)>) -> ImageServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let routes: Arc<HashMap<String, Route>> = Arc::new(
        routes
            .into_iter()
            .map(|(p, r)| (p.to_string(), r))
            .collect(),
    );
    let hits = Arc::new(Mutex::new(HashMap::new()));
    let server_hits = Arc::clone(&hits);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let routes = Arc::clone(&routes);
            let hits = Arc::clone(&server_hits);
            thread::spawn(move || handle(stream, &routes, &hits));
        }
    });
    ImageServer {
        base: format!("http://127.0.0.1:{}", port),
        port,
        hits,
    }
}

fn handle(
    mut stream: TcpStream,
    routes: &HashMap<String, Route>,
    hits: &Mutex<HashMap<String, usize>>,
) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(2)));
    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) | Err(_) => return,
        Ok(n) => n,
    };
    let request = String::from_utf8_lossy(&buf[..n]);
    let mut parts = request.lines().next().unwrap_or("").split_whitespace();
    let method = parts.next().unwrap_or("").to_string();
    let path = parts.next().unwrap_or("/").to_string();
    *hits.lock().unwrap().entry(path.clone()).or_insert(0) += 1;

    let route = routes
        .get(&path)
        .cloned()
        .unwrap_or_else(|| Route::status("404 Not Found"));

    let mut head = format!("HTTP/1.1 {}\r\nConnection: close\r\n", route.status);
    if let Some(ct) = route.content_type {
        head.push_str(&format!("Content-Type: {}\r\n", ct));
    }
    if let Some(loc) = &route.location {
        head.push_str(&format!("Location: {}\r\n", loc));
    }
    if route.send_length {
        head.push_str(&format!("Content-Length: {}\r\n", route.body.len()));
    }
    head.push_str("\r\n");
    if stream.write_all(head.as_bytes()).is_err() {
        return;
    }
    if method.eq_ignore_ascii_case("HEAD") {
        return;
    }
    match route.stall_after {
        Some(after) => {
            let after = after.min(route.body.len());
            let _ = stream.write_all(&route.body[..after]);
            let _ = stream.flush();
            thread::sleep(route.stall);
        }
        None => {
            let _ = stream.write_all(&route.body);
        }
    }
}
