//! Fetch-stage failures.

use crate::image_check::ImageCheckError;
use crate::reason::RejectReason;

use super::transport::TransportError;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The URL (or a redirect target) did not pass the security gate.
    #[error("blocked by security policy: {0}")]
    Blocked(RejectReason),
    #[error("fetch failed: {0}")]
    Transport(#[from] TransportError),
    #[error("HTTP error: {0}")]
    HttpStatus(u32),
    #[error("redirect without a usable Location: {0}")]
    BadRedirect(String),
    #[error("too many redirects (max {0})")]
    TooManyRedirects(u32),
    #[error("image too large (max {limit} bytes)")]
    TooLarge {
        limit: u64,
        /// Size announced by `Content-Length`, when that is what tripped the limit.
        declared: Option<u64>,
    },
    #[error("URL does not point to an image (Content-Type: {0})")]
    NotAnImage(String),
    #[error(transparent)]
    Image(#[from] ImageCheckError),
    #[error("fetch cancelled")]
    Cancelled,
}

impl FetchError {
    pub fn reason(&self) -> RejectReason {
        match self {
            FetchError::Blocked(r) => *r,
            FetchError::Transport(_)
            | FetchError::HttpStatus(_)
            | FetchError::BadRedirect(_)
            | FetchError::TooManyRedirects(_)
            | FetchError::Cancelled => RejectReason::FetchFailed,
            FetchError::TooLarge { .. } => RejectReason::TooLarge,
            FetchError::NotAnImage(_) => RejectReason::InvalidImage,
            FetchError::Image(ImageCheckError::Invalid(_)) => RejectReason::InvalidImage,
            FetchError::Image(ImageCheckError::Unsupported { .. }) => {
                RejectReason::UnsupportedFormat
            }
        }
    }
}
