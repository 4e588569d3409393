//! libcurl-backed transport (via the `curl` crate).
//!
//! Redirects are never followed here; the fetch layer re-validates every hop.
//! When the request carries a pinned address, the host is mapped to it with
//! `CURLOPT_RESOLVE` so libcurl connects to the address the validator
//! classified instead of issuing a second DNS query.

use std::cell::RefCell;
use std::net::IpAddr;

use super::parse::{parse_head, parse_status_line};
use super::transport::{
    Flow, Method, ResponseHandler, Transport, TransportError, TransportRequest,
};

/// Receive buffer handed to libcurl; bounds the size of each body chunk.
const CHUNK_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone, Default)]
pub struct CurlTransport;

impl CurlTransport {
    pub fn new() -> Self {
        Self
    }
}

struct Exchange<'h> {
    lines: Vec<String>,
    head_seen: bool,
    stopped: bool,
    handler: &'h mut dyn ResponseHandler,
}

/// `host:port:address` entry for CURLOPT_RESOLVE, or `None` when the URL's
/// host is already an IP literal.
fn resolve_entry(url: &str, addr: IpAddr) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let host = match parsed.host()? {
        url::Host::Domain(d) => d.to_string(),
        _ => return None,
    };
    let port = parsed.port_or_known_default()?;
    Some(match addr {
        IpAddr::V4(v4) => format!("{host}:{port}:{v4}"),
        IpAddr::V6(v6) => format!("{host}:{port}:[{v6}]"),
    })
}

fn classify_curl_error(e: &curl::Error) -> TransportError {
    let msg = e.to_string();
    if e.is_operation_timedout() {
        TransportError::Timeout(msg)
    } else if e.is_couldnt_resolve_host() || e.is_couldnt_resolve_proxy() {
        TransportError::Resolve(msg)
    } else if e.is_couldnt_connect() {
        TransportError::Connect(msg)
    } else if e.is_ssl_connect_error()
        || e.is_peer_failed_verification()
        || e.is_ssl_certproblem()
        || e.is_ssl_cacert()
    {
        TransportError::Tls(msg)
    } else if e.is_aborted_by_callback() {
        TransportError::Cancelled
    } else {
        TransportError::Other(msg)
    }
}

fn setup(easy: &mut curl::easy::Easy, req: &TransportRequest<'_>) -> Result<(), curl::Error> {
    easy.url(req.url)?;
    match req.method {
        Method::Get => easy.get(true)?,
        Method::Head => easy.nobody(true)?,
    }
    easy.follow_location(false)?;
    easy.useragent(req.user_agent)?;
    // Proxies would bypass the pinned address.
    easy.noproxy("*")?;
    easy.connect_timeout(req.connect_timeout)?;
    // Stall detection: fewer than 1 byte/s for `read_timeout` aborts the transfer.
    easy.low_speed_limit(1)?;
    easy.low_speed_time(req.read_timeout)?;
    easy.timeout(req.total_timeout)?;
    easy.buffer_size(CHUNK_BYTES)?;
    easy.progress(true)?;

    if let Some(addr) = req.pinned {
        if let Some(entry) = resolve_entry(req.url, addr) {
            let mut list = curl::easy::List::new();
            list.append(&entry)?;
            easy.resolve(list)?;
        }
    }
    Ok(())
}

impl Transport for CurlTransport {
    fn execute(
        &self,
        req: &TransportRequest<'_>,
        handler: &mut dyn ResponseHandler,
    ) -> Result<(), TransportError> {
        if req.cancel.is_cancelled() {
            return Err(TransportError::Cancelled);
        }

        let mut easy = curl::easy::Easy::new();
        setup(&mut easy, req).map_err(|e| TransportError::Other(format!("curl setup: {e}")))?;

        let cancel = req.cancel;
        let state = RefCell::new(Exchange {
            lines: Vec::new(),
            head_seen: false,
            stopped: false,
            handler,
        });

        let perform_result = {
            let mut transfer = easy.transfer();
            transfer
                .header_function(|data| {
                    let mut ex = state.borrow_mut();
                    let line = String::from_utf8_lossy(data).trim_end().to_string();
                    if !line.is_empty() {
                        ex.lines.push(line);
                        return true;
                    }
                    // Blank line: end of one header block. Skip interim 1xx responses.
                    let interim = ex
                        .lines
                        .first()
                        .and_then(|l| parse_status_line(l))
                        .is_some_and(|code| (100..200).contains(&code));
                    if interim {
                        ex.lines.clear();
                        return true;
                    }
                    let head = parse_head(&ex.lines);
                    ex.lines.clear();
                    ex.head_seen = true;
                    if ex.handler.on_head(&head) == Flow::Abort {
                        ex.stopped = true;
                        return false;
                    }
                    true
                })
                .map_err(|e| TransportError::Other(e.to_string()))?;
            transfer
                .write_function(|data| {
                    let mut ex = state.borrow_mut();
                    if cancel.is_cancelled() {
                        ex.stopped = true;
                        return Ok(0);
                    }
                    match ex.handler.on_chunk(data) {
                        Flow::Continue => Ok(data.len()),
                        Flow::Abort => {
                            ex.stopped = true;
                            Ok(0)
                        }
                    }
                })
                .map_err(|e| TransportError::Other(e.to_string()))?;
            transfer
                .progress_function(|_, _, _, _| !cancel.is_cancelled())
                .map_err(|e| TransportError::Other(e.to_string()))?;
            transfer.perform()
        };

        let ex = state.into_inner();
        match perform_result {
            Ok(()) if ex.head_seen => Ok(()),
            Ok(()) => Err(TransportError::Other("response had no headers".to_string())),
            Err(_) if cancel.is_cancelled() => Err(TransportError::Cancelled),
            Err(_) if ex.stopped => Err(TransportError::Aborted),
            Err(e) => Err(classify_curl_error(&e)),
        }
    }
}
