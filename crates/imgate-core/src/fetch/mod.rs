//! Bounded image fetching.
//!
//! Streams a GET under the configured size ceiling and timeouts, then
//! verifies the payload is a supported image before handing it back. The
//! connection goes to the address the validator classified; every redirect
//! hop is run through the validator again before it is requested.

mod body;
mod curl_transport;
mod error;
mod parse;
mod transport;

use crate::cancel::CancelToken;
use crate::config::GateConfig;
use crate::image_check::{verify_image, DetectedFormat};
use crate::naming;
use crate::reason::{RejectClass, RejectReason};
use crate::url_policy::{self, HostResolver, SecurityVerdict, SystemResolver};

use body::{BoundedBody, HeadOnly, Stop};

pub use curl_transport::CurlTransport;
pub use error::FetchError;
pub use transport::{
    Flow, Method, ResponseHandler, ResponseHead, Transport, TransportError, TransportRequest,
};

/// A verified image payload. Owned by the caller; the fetcher keeps nothing.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub bytes: Vec<u8>,
    /// `Content-Type` as sent by the server. Advisory only.
    pub declared_content_type: String,
    /// Format detected from the bytes.
    pub detected_format: DetectedFormat,
    pub byte_length: u64,
    /// Title derived from the requested URL's path.
    pub suggested_title: String,
    /// Random storage filename with the detected format's extension.
    pub filename: String,
    /// URL the bytes were actually served from (differs after redirects).
    pub final_url: String,
}

/// Outcome of a HEAD pre-check.
#[derive(Debug, Clone)]
pub struct ProbeResult {
    pub final_url: String,
    pub status: u32,
    pub content_type: String,
    pub content_length: Option<u64>,
}

enum Hop<T> {
    Done(T),
    Redirect(String),
}

fn from_transport(e: TransportError) -> FetchError {
    match e {
        TransportError::Cancelled => FetchError::Cancelled,
        other => FetchError::Transport(other),
    }
}

/// Settle a finished exchange: a handler stop wins over the transport result.
fn settle(stop: Option<Stop>, outcome: Result<(), TransportError>) -> Result<Option<String>, FetchError> {
    match stop {
        Some(Stop::Redirect(location)) => Ok(Some(location)),
        Some(Stop::Failed(e)) => Err(e),
        None => outcome.map(|()| None).map_err(from_transport),
    }
}

fn log_failure(url: &str, err: &FetchError) {
    match err.reason().class() {
        RejectClass::Transport => {
            tracing::error!(url, reason = %err.reason(), "failed to download image: {}", err)
        }
        RejectClass::Policy | RejectClass::Content => {
            tracing::warn!(url, reason = %err.reason(), "image rejected: {}", err)
        }
    }
}

/// Fetches and verifies images through an injected resolver and transport.
pub struct Fetcher<'a> {
    cfg: &'a GateConfig,
    resolver: &'a dyn HostResolver,
    transport: &'a dyn Transport,
}

impl<'a> Fetcher<'a> {
    pub fn new(
        cfg: &'a GateConfig,
        resolver: &'a dyn HostResolver,
        transport: &'a dyn Transport,
    ) -> Self {
        Self {
            cfg,
            resolver,
            transport,
        }
    }

    /// Downloads `url` and verifies the payload. `verdict` must be the
    /// result of `url_policy::check` for this same URL.
    pub fn fetch(
        &self,
        url: &str,
        verdict: &SecurityVerdict,
        cancel: &CancelToken,
    ) -> Result<FetchResult, FetchError> {
        tracing::info!(url, "downloading image from URL");
        let result = self.fetch_verified(url, verdict, cancel);
        match &result {
            Ok(r) => tracing::info!(
                url,
                format = %r.detected_format,
                bytes = r.byte_length,
                "downloaded and verified image"
            ),
            Err(e) => log_failure(url, e),
        }
        result
    }

    fn fetch_verified(
        &self,
        url: &str,
        verdict: &SecurityVerdict,
        cancel: &CancelToken,
    ) -> Result<FetchResult, FetchError> {
        let (final_url, (head, bytes)) =
            self.follow(url, verdict, cancel, Method::Get, |req| {
                let mut body = BoundedBody::new(self.cfg, cancel);
                let outcome = self.transport.execute(req, &mut body);
                match settle(body.take_stop(), outcome)? {
                    Some(location) => Ok(Hop::Redirect(location)),
                    None => Ok(Hop::Done(body.into_parts())),
                }
            })?;

        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }

        let declared_content_type = head.and_then(|h| h.content_type).unwrap_or_default();
        let detected_format = verify_image(&bytes, self.cfg)?;
        let byte_length = bytes.len() as u64;
        Ok(FetchResult {
            bytes,
            declared_content_type,
            detected_format,
            byte_length,
            suggested_title: naming::suggested_title(url, detected_format),
            filename: naming::random_filename(detected_format),
            final_url,
        })
    }

    /// HEAD pre-check: success status and an `image/*` content type, without
    /// downloading the body.
    pub fn probe(
        &self,
        url: &str,
        verdict: &SecurityVerdict,
        cancel: &CancelToken,
    ) -> Result<ProbeResult, FetchError> {
        let result = self
            .follow(url, verdict, cancel, Method::Head, |req| {
                let mut handler = HeadOnly::new(self.cfg);
                let outcome = self.transport.execute(req, &mut handler);
                match settle(handler.stop.take(), outcome)? {
                    Some(location) => Ok(Hop::Redirect(location)),
                    None => handler.head.take().map(Hop::Done).ok_or_else(|| {
                        FetchError::Transport(TransportError::Other(
                            "no response headers".to_string(),
                        ))
                    }),
                }
            })
            .map(|(final_url, head)| ProbeResult {
                final_url,
                status: head.status,
                content_type: head.content_type.unwrap_or_default(),
                content_length: head.content_length,
            });
        if let Err(e) = &result {
            log_failure(url, e);
        }
        result
    }

    /// Runs `once` against `url`, following redirects. Each redirect target is
    /// re-validated and the connection pinned to its freshly classified address.
    fn follow<T>(
        &self,
        url: &str,
        verdict: &SecurityVerdict,
        cancel: &CancelToken,
        method: Method,
        mut once: impl FnMut(&TransportRequest<'_>) -> Result<Hop<T>, FetchError>,
    ) -> Result<(String, T), FetchError> {
        if !verdict.allowed {
            return Err(FetchError::Blocked(
                verdict
                    .reason
                    .reject_reason()
                    .unwrap_or(RejectReason::BadScheme),
            ));
        }

        let mut current = url.to_string();
        let mut pinned = verdict.address;
        for hop in 0..=self.cfg.max_redirects {
            let req = TransportRequest {
                url: &current,
                method,
                pinned,
                user_agent: &self.cfg.user_agent,
                connect_timeout: self.cfg.connect_timeout(),
                read_timeout: self.cfg.read_timeout(),
                total_timeout: self.cfg.total_timeout(),
                cancel,
            };
            let location = match once(&req)? {
                Hop::Done(value) => return Ok((current, value)),
                Hop::Redirect(location) => location,
            };
            if hop == self.cfg.max_redirects {
                break;
            }

            let next = url::Url::parse(&current)
                .and_then(|base| base.join(&location))
                .map_err(|e| FetchError::BadRedirect(format!("{location}: {e}")))?;
            let next_verdict = url_policy::check(next.as_str(), self.cfg, self.resolver);
            if !next_verdict.allowed {
                return Err(FetchError::Blocked(
                    next_verdict
                        .reason
                        .reject_reason()
                        .unwrap_or(RejectReason::BadScheme),
                ));
            }
            tracing::debug!(from = %current, to = %next, "following redirect");
            current = next.to_string();
            pinned = next_verdict.address;
        }
        Err(FetchError::TooManyRedirects(self.cfg.max_redirects))
    }
}

/// Fetches `url` with the system resolver and the curl transport.
pub fn fetch(
    url: &str,
    cfg: &GateConfig,
    verdict: &SecurityVerdict,
    cancel: &CancelToken,
) -> Result<FetchResult, FetchError> {
    let resolver = SystemResolver::from_config(cfg);
    let transport = CurlTransport::new();
    Fetcher::new(cfg, &resolver, &transport).fetch(url, verdict, cancel)
}

/// HEAD pre-check with the system resolver and the curl transport.
pub fn probe(
    url: &str,
    cfg: &GateConfig,
    verdict: &SecurityVerdict,
    cancel: &CancelToken,
) -> Result<ProbeResult, FetchError> {
    let resolver = SystemResolver::from_config(cfg);
    let transport = CurlTransport::new();
    Fetcher::new(cfg, &resolver, &transport).probe(url, verdict, cancel)
}
