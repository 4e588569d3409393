//! Transport seam between the fetch logic and the HTTP client.
//!
//! A transport performs exactly one request (no redirect following) and
//! pushes the response into a `ResponseHandler`: first the parsed head, then
//! the body chunk by chunk. The handler can stop the transfer at either point.

use std::net::IpAddr;
use std::time::Duration;

use crate::cancel::CancelToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Head,
}

/// One outbound request.
#[derive(Debug, Clone)]
pub struct TransportRequest<'a> {
    pub url: &'a str,
    pub method: Method,
    /// Address to connect to for the URL's host instead of asking DNS again.
    pub pinned: Option<IpAddr>,
    pub user_agent: &'a str,
    pub connect_timeout: Duration,
    /// Stall timeout: the transfer fails when no data arrives for this long.
    pub read_timeout: Duration,
    pub total_timeout: Duration,
    pub cancel: &'a CancelToken,
}

/// Status line and the headers the gate cares about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseHead {
    pub status: u32,
    pub content_length: Option<u64>,
    pub content_type: Option<String>,
    pub location: Option<String>,
}

impl ResponseHead {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_redirect(&self) -> bool {
        matches!(self.status, 301 | 302 | 303 | 307 | 308)
    }
}

/// Whether the transport should keep reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Abort,
}

pub trait ResponseHandler {
    /// Called once, when the final (non-1xx) response headers are complete.
    fn on_head(&mut self, head: &ResponseHead) -> Flow;
    /// Called for every body chunk, in order. Never called after `Abort`.
    fn on_chunk(&mut self, chunk: &[u8]) -> Flow;
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("timed out: {0}")]
    Timeout(String),
    #[error("could not resolve host: {0}")]
    Resolve(String),
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("TLS failure: {0}")]
    Tls(String),
    /// The handler stopped the transfer; the handler holds the reason.
    #[error("transfer stopped by handler")]
    Aborted,
    #[error("transfer cancelled")]
    Cancelled,
    #[error("{0}")]
    Other(String),
}

pub trait Transport {
    fn execute(
        &self,
        req: &TransportRequest<'_>,
        handler: &mut dyn ResponseHandler,
    ) -> Result<(), TransportError>;
}
