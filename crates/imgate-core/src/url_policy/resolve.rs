//! Host name resolution used by the validator.
//!
//! Resolution is an I/O boundary of its own: the validator takes a
//! `HostResolver` so tests can stand in for DNS without touching the network,
//! independently of the fetcher's transport.

use std::io;
use std::net::{IpAddr, ToSocketAddrs};
use std::sync::mpsc;
use std::time::Duration;

use crate::config::GateConfig;

/// Resolves a host name to the single address the gate will classify and connect to.
pub trait HostResolver {
    fn resolve(&self, host: &str, port: u16) -> io::Result<IpAddr>;
}

/// System resolver (`getaddrinfo`) bounded by a timeout.
///
/// The lookup runs on a helper thread because the platform call has no
/// deadline of its own; when the timeout elapses the thread is left to finish
/// in the background and the caller gets `TimedOut`.
#[derive(Debug, Clone)]
pub struct SystemResolver {
    timeout: Duration,
}

impl SystemResolver {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn from_config(cfg: &GateConfig) -> Self {
        Self::new(cfg.connect_timeout())
    }
}

impl HostResolver for SystemResolver {
    fn resolve(&self, host: &str, port: u16) -> io::Result<IpAddr> {
        let (tx, rx) = mpsc::channel();
        let target = (host.to_string(), port);
        std::thread::Builder::new()
            .name("imgate-dns".to_string())
            .spawn(move || {
                let first = target
                    .to_socket_addrs()
                    .map(|mut addrs| addrs.next().map(|a| a.ip()));
                let _ = tx.send(first);
            })?;

        match rx.recv_timeout(self.timeout) {
            Ok(Ok(Some(ip))) => Ok(ip),
            Ok(Ok(None)) => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{host}: no addresses"),
            )),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("{host}: resolution timed out"),
            )),
        }
    }
}
