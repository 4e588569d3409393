//! Response handlers enforcing the fetch bounds while data streams in.

use crate::cancel::CancelToken;
use crate::config::GateConfig;

use super::error::FetchError;
use super::transport::{Flow, ResponseHandler, ResponseHead};

/// Why a handler stopped the transfer.
#[derive(Debug)]
pub(super) enum Stop {
    Redirect(String),
    Failed(FetchError),
}

/// Checks the head (status, size, content type) and shared by both handlers.
/// Returns `Some` when the response must not be read any further.
fn screen_head(head: &ResponseHead, max_bytes: u64) -> Option<Stop> {
    if head.is_redirect() {
        return Some(match &head.location {
            Some(loc) if !loc.is_empty() => Stop::Redirect(loc.clone()),
            _ => Stop::Failed(FetchError::BadRedirect(format!(
                "HTTP {} without Location",
                head.status
            ))),
        });
    }
    if !head.is_success() {
        return Some(Stop::Failed(FetchError::HttpStatus(head.status)));
    }
    if let Some(len) = head.content_length {
        if len > max_bytes {
            return Some(Stop::Failed(FetchError::TooLarge {
                limit: max_bytes,
                declared: Some(len),
            }));
        }
    }
    let content_type = head.content_type.as_deref().unwrap_or("").trim();
    if !content_type.to_ascii_lowercase().starts_with("image/") {
        let shown = if content_type.is_empty() {
            "missing".to_string()
        } else {
            content_type.to_string()
        };
        return Some(Stop::Failed(FetchError::NotAnImage(shown)));
    }
    None
}

/// Accumulates the body of a GET under the `max_bytes` ceiling.
///
/// The buffer never holds more than `max_bytes`: a chunk that would cross the
/// ceiling is refused, the transfer is stopped and the partial buffer dropped.
pub(super) struct BoundedBody<'a> {
    max_bytes: u64,
    cancel: &'a CancelToken,
    head: Option<ResponseHead>,
    buf: Vec<u8>,
    stop: Option<Stop>,
}

impl<'a> BoundedBody<'a> {
    pub(super) fn new(cfg: &GateConfig, cancel: &'a CancelToken) -> Self {
        Self {
            max_bytes: cfg.max_bytes,
            cancel,
            head: None,
            buf: Vec::new(),
            stop: None,
        }
    }

    pub(super) fn take_stop(&mut self) -> Option<Stop> {
        self.stop.take()
    }

    /// Response head and accumulated body, once the transfer completed normally.
    pub(super) fn into_parts(self) -> (Option<ResponseHead>, Vec<u8>) {
        (self.head, self.buf)
    }
}

impl ResponseHandler for BoundedBody<'_> {
    fn on_head(&mut self, head: &ResponseHead) -> Flow {
        self.head = Some(head.clone());
        match screen_head(head, self.max_bytes) {
            Some(stop) => {
                self.stop = Some(stop);
                Flow::Abort
            }
            None => {
                if let Some(len) = head.content_length {
                    self.buf.reserve(len as usize);
                }
                Flow::Continue
            }
        }
    }

    fn on_chunk(&mut self, chunk: &[u8]) -> Flow {
        if self.cancel.is_cancelled() {
            self.buf = Vec::new();
            self.stop = Some(Stop::Failed(FetchError::Cancelled));
            return Flow::Abort;
        }
        if self.buf.len() as u64 + chunk.len() as u64 > self.max_bytes {
            self.buf = Vec::new();
            self.stop = Some(Stop::Failed(FetchError::TooLarge {
                limit: self.max_bytes,
                declared: None,
            }));
            return Flow::Abort;
        }
        self.buf.extend_from_slice(chunk);
        Flow::Continue
    }
}

/// Head-only handler for `probe`.
pub(super) struct HeadOnly {
    max_bytes: u64,
    pub(super) head: Option<ResponseHead>,
    pub(super) stop: Option<Stop>,
}

impl HeadOnly {
    pub(super) fn new(cfg: &GateConfig) -> Self {
        Self {
            max_bytes: cfg.max_bytes,
            head: None,
            stop: None,
        }
    }
}

impl ResponseHandler for HeadOnly {
    fn on_head(&mut self, head: &ResponseHead) -> Flow {
        self.head = Some(head.clone());
        match screen_head(head, self.max_bytes) {
            Some(stop) => {
                self.stop = Some(stop);
                Flow::Abort
            }
            None => Flow::Continue,
        }
    }

    fn on_chunk(&mut self, _chunk: &[u8]) -> Flow {
        Flow::Abort
    }
}
