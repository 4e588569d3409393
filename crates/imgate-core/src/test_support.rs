//! Test doubles for the two I/O boundaries: DNS and the HTTP transport.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::io;
use std::net::IpAddr;

use crate::fetch::{
    Flow, Method, ResponseHandler, ResponseHead, Transport, TransportError, TransportRequest,
};
use crate::url_policy::HostResolver;

/// Resolver backed by a fixed table; counts lookups.
pub struct TableResolver {
    table: HashMap<String, IpAddr>,
    pub calls: Cell<usize>,
}

impl TableResolver {
    pub fn new(entries: &[(&str, &str)]) -> Self {
        Self {
            table: entries
                .iter()
                .map(|(h, ip)| (h.to_string(), ip.parse().unwrap()))
                .collect(),
            calls: Cell::new(0),
        }
    }

    /// A few public names plus some that resolve into private space.
    pub fn public_dns() -> Self {
        Self::new(&[
            ("example.com", "93.184.216.34"),
            ("other.com", "203.0.113.200"),
            ("cdn.example.com", "151.101.1.1"),
            ("spam.com", "8.8.4.4"),
            ("localhost", "127.0.0.1"),
            ("internal.corp", "10.1.2.3"),
            ("metadata.evil", "169.254.169.254"),
            ("v6.local", "::1"),
        ])
    }
}

impl HostResolver for TableResolver {
    fn resolve(&self, host: &str, _port: u16) -> io::Result<IpAddr> {
        self.calls.set(self.calls.get() + 1);
        self.table
            .get(host)
            .copied()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such host"))
    }
}

/// One canned response.
#[derive(Debug, Clone)]
pub struct Script {
    pub head: ResponseHead,
    pub chunks: Vec<Vec<u8>>,
}

impl Script {
    pub fn image(content_type: &str, body: Vec<u8>) -> Self {
        Self {
            head: ResponseHead {
                status: 200,
                content_length: Some(body.len() as u64),
                content_type: Some(content_type.to_string()),
                location: None,
            },
            chunks: vec![body],
        }
    }

    pub fn redirect(location: &str) -> Self {
        Self {
            head: ResponseHead {
                status: 302,
                content_length: Some(0),
                content_type: Some("text/html".to_string()),
                location: Some(location.to_string()),
            },
            chunks: Vec::new(),
        }
    }

    pub fn status(code: u32) -> Self {
        Self {
            head: ResponseHead {
                status: code,
                content_length: Some(9),
                content_type: Some("text/plain".to_string()),
                location: None,
            },
            chunks: vec![b"not found".to_vec()],
        }
    }
}

/// Recorded request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seen {
    pub url: String,
    pub method: Method,
    pub pinned: Option<IpAddr>,
    pub user_agent: String,
}

/// Transport that replays scripts per URL and records what was asked of it.
#[derive(Default)]
pub struct ScriptedTransport {
    scripts: HashMap<String, Script>,
    /// Requests in the order they were made; unscripted URLs fail to connect.
    pub requests: RefCell<Vec<Seen>>,
    /// Number of body chunks handed to handlers across all requests.
    pub chunks_delivered: Cell<usize>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: &str, script: Script) -> Self {
        self.scripts.insert(url.to_string(), script);
        self
    }
}

impl Transport for ScriptedTransport {
    fn execute(
        &self,
        req: &TransportRequest<'_>,
        handler: &mut dyn ResponseHandler,
    ) -> Result<(), TransportError> {
        if req.cancel.is_cancelled() {
            return Err(TransportError::Cancelled);
        }
        self.requests.borrow_mut().push(Seen {
            url: req.url.to_string(),
            method: req.method,
            pinned: req.pinned,
            user_agent: req.user_agent.to_string(),
        });
        let script = self
            .scripts
            .get(req.url)
            .ok_or_else(|| TransportError::Connect(format!("{}: connection refused", req.url)))?;
        if handler.on_head(&script.head) == Flow::Abort {
            return Err(TransportError::Aborted);
        }
        if req.method == Method::Head {
            return Ok(());
        }
        for chunk in &script.chunks {
            self.chunks_delivered.set(self.chunks_delivered.get() + 1);
            if handler.on_chunk(chunk) == Flow::Abort {
                return Err(TransportError::Aborted);
            }
        }
        Ok(())
    }
}
