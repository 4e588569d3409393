//! URL safety validation.
//!
//! Decides, before any byte is transferred, whether a URL may be fetched at
//! all. Checks run in a fixed order and stop at the first failure:
//! scheme, host presence, resolved-address classification (when SSRF
//! prevention is on), then the operator's domain lists.

mod address;
mod domain;
mod resolve;

use std::net::IpAddr;

use url::{Host, Url};

use crate::config::GateConfig;
use crate::reason::RejectReason;

pub use address::is_private_address;
pub use domain::{domain_policy, host_of};
pub use resolve::{HostResolver, SystemResolver};

/// Outcome code of a single `check`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerdictReason {
    Ok,
    BadScheme,
    UnresolvableHost,
    PrivateAddress,
    DomainBlocked,
    DomainNotAllowed,
}

impl VerdictReason {
    /// The caller-facing rejection code, or `None` for `Ok`.
    pub fn reject_reason(self) -> Option<RejectReason> {
        match self {
            VerdictReason::Ok => None,
            VerdictReason::BadScheme => Some(RejectReason::BadScheme),
            VerdictReason::UnresolvableHost => Some(RejectReason::UnresolvableHost),
            VerdictReason::PrivateAddress => Some(RejectReason::PrivateAddress),
            VerdictReason::DomainBlocked => Some(RejectReason::DomainBlocked),
            VerdictReason::DomainNotAllowed => Some(RejectReason::DomainNotAllowed),
        }
    }
}

/// Result of validating one URL. Never cached: DNS answers can change between calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityVerdict {
    pub allowed: bool,
    pub reason: VerdictReason,
    /// Address the SSRF step classified. The fetcher connects to this address
    /// and nothing else, so a second DNS answer cannot redirect the request.
    pub address: Option<IpAddr>,
}

impl SecurityVerdict {
    fn allow(address: Option<IpAddr>) -> Self {
        Self {
            allowed: true,
            reason: VerdictReason::Ok,
            address,
        }
    }

    fn reject(reason: VerdictReason) -> Self {
        Self {
            allowed: false,
            reason,
            address: None,
        }
    }
}

/// Validates `url` against `cfg`. DNS lookups go through `resolver`.
pub fn check(url: &str, cfg: &GateConfig, resolver: &dyn HostResolver) -> SecurityVerdict {
    let verdict = evaluate(url, cfg, resolver);
    if !verdict.allowed {
        tracing::warn!(url, reason = ?verdict.reason, "URL rejected by security gate");
    } else {
        tracing::debug!(url, address = ?verdict.address, "URL passed security gate");
    }
    verdict
}

fn evaluate(url: &str, cfg: &GateConfig, resolver: &dyn HostResolver) -> SecurityVerdict {
    let parsed = match Url::parse(url) {
        Ok(u) => u,
        Err(url::ParseError::EmptyHost) if has_http_prefix(url) => {
            return SecurityVerdict::reject(VerdictReason::UnresolvableHost)
        }
        Err(_) => return SecurityVerdict::reject(VerdictReason::BadScheme),
    };
    if !matches!(parsed.scheme(), "http" | "https") {
        return SecurityVerdict::reject(VerdictReason::BadScheme);
    }

    let host = match parsed.host() {
        Some(h) => h,
        None => return SecurityVerdict::reject(VerdictReason::UnresolvableHost),
    };
    let host_name = match parsed.host_str() {
        Some(h) if !h.is_empty() => domain::normalize_host(h),
        _ => return SecurityVerdict::reject(VerdictReason::UnresolvableHost),
    };

    let mut address = None;
    if cfg.prevent_ssrf {
        let ip = match host {
            Host::Ipv4(a) => IpAddr::V4(a),
            Host::Ipv6(a) => IpAddr::V6(a),
            Host::Domain(name) => {
                let port = parsed.port_or_known_default().unwrap_or(80);
                match resolver.resolve(name, port) {
                    Ok(ip) => ip,
                    Err(e) => {
                        // Fail closed: an unresolvable host is treated as a blocked one.
                        tracing::warn!(host = name, "failed to resolve host: {}", e);
                        return SecurityVerdict::reject(VerdictReason::PrivateAddress);
                    }
                }
            }
        };
        if is_private_address(ip) {
            tracing::warn!(host = %host_name, %ip, "blocked access to private/reserved address");
            return SecurityVerdict::reject(VerdictReason::PrivateAddress);
        }
        address = Some(ip);
    }

    match domain_policy(&host_name, cfg) {
        VerdictReason::Ok => SecurityVerdict::allow(address),
        other => SecurityVerdict::reject(other),
    }
}

fn has_http_prefix(url: &str) -> bool {
    let lower = url.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}
