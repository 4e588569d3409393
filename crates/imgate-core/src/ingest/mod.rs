//! Ingestion pipeline: validate, fetch, store.
//!
//! The gate itself never persists anything. Storage is a collaborator behind
//! `AssetStore`, handed only verified bytes together with the detected format
//! and the derived names.

mod store;

use std::path::PathBuf;

use crate::cancel::CancelToken;
use crate::config::GateConfig;
use crate::fetch::{FetchError, FetchResult, Fetcher, Transport};
use crate::image_check::DetectedFormat;
use crate::reason::RejectReason;
use crate::url_policy::{self, HostResolver};

pub use store::{sha256_hex, AssetRecord, DirectoryStore};

/// One ingestion attempt.
#[derive(Debug, Clone, Default)]
pub struct IngestRequest {
    pub url: String,
    pub acting_user: Option<String>,
    pub collection: Option<String>,
}

impl IngestRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }
}

/// What the store receives.
#[derive(Debug, Clone)]
pub struct NewAsset {
    pub bytes: Vec<u8>,
    pub format: DetectedFormat,
    pub title: String,
    pub filename: String,
    pub source_url: String,
    pub acting_user: Option<String>,
    pub collection: Option<String>,
}

/// Where the store put an asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredAsset {
    pub path: PathBuf,
    pub sha256: String,
}

pub trait AssetStore {
    fn store(&self, asset: &NewAsset) -> anyhow::Result<StoredAsset>;
}

/// Successful ingestion.
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub title: String,
    pub format: DetectedFormat,
    pub byte_length: u64,
    pub final_url: String,
    pub stored: StoredAsset,
}

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("URL rejected: {0}")]
    Rejected(RejectReason),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("failed to store image: {0:#}")]
    Storage(anyhow::Error),
}

impl IngestError {
    /// Gate rejection code; `None` for storage failures, which are not the URL's fault.
    pub fn reason(&self) -> Option<RejectReason> {
        match self {
            IngestError::Rejected(r) => Some(*r),
            IngestError::Fetch(e) => Some(e.reason()),
            IngestError::Storage(_) => None,
        }
    }
}

fn to_asset(request: &IngestRequest, fetched: FetchResult) -> NewAsset {
    NewAsset {
        bytes: fetched.bytes,
        format: fetched.detected_format,
        title: fetched.suggested_title,
        filename: fetched.filename,
        source_url: request.url.clone(),
        acting_user: request.acting_user.clone(),
        collection: request.collection.clone(),
    }
}

/// Runs the full pipeline for one URL.
pub fn ingest(
    request: &IngestRequest,
    cfg: &GateConfig,
    resolver: &dyn HostResolver,
    transport: &dyn Transport,
    store: &dyn AssetStore,
    cancel: &CancelToken,
) -> Result<IngestOutcome, IngestError> {
    let verdict = url_policy::check(&request.url, cfg, resolver);
    if let Some(reason) = verdict.reason.reject_reason() {
        return Err(IngestError::Rejected(reason));
    }

    let fetched = Fetcher::new(cfg, resolver, transport).fetch(&request.url, &verdict, cancel)?;
    let final_url = fetched.final_url.clone();
    let byte_length = fetched.byte_length;
    let asset = to_asset(request, fetched);

    let stored = store.store(&asset).map_err(|e| {
        tracing::error!(url = %request.url, "failed to store image: {:#}", e);
        IngestError::Storage(e)
    })?;
    tracing::info!(
        url = %request.url,
        user = request.acting_user.as_deref().unwrap_or("-"),
        collection = request.collection.as_deref().unwrap_or("-"),
        path = %stored.path.display(),
        "ingested image"
    );
    Ok(IngestOutcome {
        title: asset.title,
        format: asset.format,
        byte_length,
        final_url,
        stored,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_check::test_images;
    use crate::test_support::{Script, ScriptedTransport, TableResolver};
    use std::cell::RefCell;

    const CAT: &str = "https://example.com/cat.png";

    /// Store that keeps assets in memory.
    #[derive(Default)]
    struct MemoryStore {
        assets: RefCell<Vec<NewAsset>>,
        fail: bool,
    }

    impl AssetStore for MemoryStore {
        fn store(&self, asset: &NewAsset) -> anyhow::Result<StoredAsset> {
            if self.fail {
                anyhow::bail!("disk full");
            }
            self.assets.borrow_mut().push(asset.clone());
            Ok(StoredAsset {
                path: PathBuf::from("/mem").join(&asset.filename),
                sha256: sha256_hex(&asset.bytes),
            })
        }
    }

    fn request() -> IngestRequest {
        IngestRequest {
            url: CAT.to_string(),
            acting_user: Some("alice".to_string()),
            collection: Some("pets".to_string()),
        }
    }

    #[test]
    fn ingests_into_store() {
        let cfg = GateConfig::default();
        let dns = TableResolver::public_dns();
        let png = test_images::png();
        let transport = ScriptedTransport::new().with(CAT, Script::image("image/png", png.clone()));
        let store = MemoryStore::default();

        let out = ingest(&request(), &cfg, &dns, &transport, &store, &CancelToken::new()).unwrap();
        assert_eq!(out.title, "cat");
        assert_eq!(out.format, DetectedFormat::Png);
        assert_eq!(out.byte_length, png.len() as u64);

        let assets = store.assets.borrow();
        assert_eq!(assets.len(), 1);
        assert_eq!(assets[0].bytes, png);
        assert_eq!(assets[0].acting_user.as_deref(), Some("alice"));
        assert_eq!(assets[0].collection.as_deref(), Some("pets"));
        assert_eq!(assets[0].source_url, CAT);
        assert!(assets[0].filename.ends_with(".png"));
    }

    #[test]
    fn policy_rejection_skips_fetch_and_store() {
        let cfg = GateConfig::default();
        let dns = TableResolver::public_dns();
        let transport = ScriptedTransport::new();
        let store = MemoryStore::default();

        let err = ingest(
            &IngestRequest::new("file:///etc/passwd"),
            &cfg,
            &dns,
            &transport,
            &store,
            &CancelToken::new(),
        )
        .unwrap_err();
        assert!(matches!(err, IngestError::Rejected(RejectReason::BadScheme)));
        assert_eq!(err.reason(), Some(RejectReason::BadScheme));
        assert!(transport.requests.borrow().is_empty());
        assert!(store.assets.borrow().is_empty());
    }

    #[test]
    fn content_rejection_stores_nothing() {
        let cfg = GateConfig::default();
        let dns = TableResolver::public_dns();
        let transport =
            ScriptedTransport::new().with(CAT, Script::image("image/png", b"<html>".to_vec()));
        let store = MemoryStore::default();

        let err = ingest(&request(), &cfg, &dns, &transport, &store, &CancelToken::new())
            .unwrap_err();
        assert_eq!(err.reason(), Some(RejectReason::InvalidImage));
        assert!(store.assets.borrow().is_empty());
    }

    #[test]
    fn storage_failure_has_no_reject_reason() {
        let cfg = GateConfig::default();
        let dns = TableResolver::public_dns();
        let transport =
            ScriptedTransport::new().with(CAT, Script::image("image/png", test_images::png()));
        let store = MemoryStore {
            fail: true,
            ..MemoryStore::default()
        };

        let err = ingest(&request(), &cfg, &dns, &transport, &store, &CancelToken::new())
            .unwrap_err();
        assert!(matches!(err, IngestError::Storage(_)));
        assert_eq!(err.reason(), None);
        assert!(err.to_string().contains("disk full"));
    }

    #[test]
    fn directory_store_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = GateConfig::default();
        let dns = TableResolver::public_dns();
        let gif = test_images::gif();
        let transport = ScriptedTransport::new().with(CAT, Script::image("image/gif", gif.clone()));
        let store = DirectoryStore::new(dir.path());

        let out = ingest(&request(), &cfg, &dns, &transport, &store, &CancelToken::new()).unwrap();
        assert_eq!(out.format, DetectedFormat::Gif);
        assert!(out.stored.path.to_string_lossy().ends_with(".gif"));
        assert_eq!(std::fs::read(&out.stored.path).unwrap(), gif);
        let record = DirectoryStore::load_record(&out.stored.path).unwrap();
        assert_eq!(record.title, "cat");
        assert_eq!(record.sha256, sha256_hex(&gif));
        assert_eq!(record.collection.as_deref(), Some("pets"));
    }
}
