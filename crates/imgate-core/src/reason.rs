//! Flat rejection codes surfaced to callers.
//!
//! Every failure of the gate, whether it comes from the URL validator, the
//! transport or the content checks, maps onto exactly one `RejectReason`.
//! Callers translate the code into user-facing text; the core never does.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse failure class used to decide what a caller may offer the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectClass {
    /// Detected before any network fetch. Never retried.
    Policy,
    /// Network or protocol failure. The user may try again; the gate does not.
    Transport,
    /// The payload itself was rejected. Terminal.
    Content,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    BadScheme,
    UnresolvableHost,
    PrivateAddress,
    DomainBlocked,
    DomainNotAllowed,
    FetchFailed,
    TooLarge,
    InvalidImage,
    UnsupportedFormat,
}

impl RejectReason {
    pub fn as_str(self) -> &'static str {
        match self {
            RejectReason::BadScheme => "bad_scheme",
            RejectReason::UnresolvableHost => "unresolvable_host",
            RejectReason::PrivateAddress => "private_address",
            RejectReason::DomainBlocked => "domain_blocked",
            RejectReason::DomainNotAllowed => "domain_not_allowed",
            RejectReason::FetchFailed => "fetch_failed",
            RejectReason::TooLarge => "too_large",
            RejectReason::InvalidImage => "invalid_image",
            RejectReason::UnsupportedFormat => "unsupported_format",
        }
    }

    pub fn class(self) -> RejectClass {
        match self {
            RejectReason::BadScheme
            | RejectReason::UnresolvableHost
            | RejectReason::PrivateAddress
            | RejectReason::DomainBlocked
            | RejectReason::DomainNotAllowed => RejectClass::Policy,
            RejectReason::FetchFailed => RejectClass::Transport,
            RejectReason::TooLarge | RejectReason::InvalidImage | RejectReason::UnsupportedFormat => {
                RejectClass::Content
            }
        }
    }

    /// Only transport failures may be offered to the user for another attempt.
    pub fn user_may_retry(self) -> bool {
        self.class() == RejectClass::Transport
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
