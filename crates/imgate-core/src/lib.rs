//! URL image-ingestion security gate.
//!
//! `url_policy::check` decides whether a URL may be fetched at all;
//! `fetch::Fetcher` downloads it under size and time bounds and verifies the
//! payload is a real image. `ingest` wires both to an `AssetStore`.

pub mod cancel;
pub mod config;
pub mod fetch;
pub mod image_check;
pub mod ingest;
pub mod logging;
pub mod naming;
pub mod reason;
pub mod url_policy;

#[cfg(test)]
mod test_support;

pub use cancel::CancelToken;
pub use config::GateConfig;
pub use reason::{RejectClass, RejectReason};
