//! Operator domain policy: exclusive allow-list, otherwise block-list.

use crate::config::GateConfig;

use super::VerdictReason;

/// Lower-cased host of `url` (brackets stripped from IPv6 literals, trailing dot removed).
/// Returns `None` if the URL does not parse or has no host.
pub fn host_of(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    parsed.host_str().map(normalize_host)
}

pub(super) fn normalize_host(host: &str) -> String {
    host.trim_start_matches('[')
        .trim_end_matches(']')
        .trim_end_matches('.')
        .to_ascii_lowercase()
}

fn listed(list: &std::collections::BTreeSet<String>, host: &str) -> bool {
    list.iter().any(|d| normalize_host(d.trim()) == host)
}

/// Applies the allow/block lists to an already-normalized host.
///
/// A configured allow-list is authoritative: the host must be on it and the
/// block-list is not consulted at all, so a host present on both passes.
pub fn domain_policy(host: &str, cfg: &GateConfig) -> VerdictReason {
    let host = normalize_host(host);
    if let Some(allowed) = &cfg.allowed_domains {
        return if listed(allowed, &host) {
            VerdictReason::Ok
        } else {
            VerdictReason::DomainNotAllowed
        };
    }
    if listed(&cfg.blocked_domains, &host) {
        return VerdictReason::DomainBlocked;
    }
    VerdictReason::Ok
}
