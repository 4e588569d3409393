//! Directory-backed asset store.
//!
//! Each asset is written as `<filename>` plus a `<filename>.json` sidecar with
//! its metadata. Both go through a `.part` temp file and an atomic rename, so
//! a crash never leaves a half-written asset under its final name.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

use crate::image_check::DetectedFormat;

use super::{AssetStore, NewAsset, StoredAsset};

/// Temporary file suffix used before atomic rename.
const TEMP_SUFFIX: &str = ".part";

/// Metadata written next to every stored image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRecord {
    pub title: String,
    pub format: DetectedFormat,
    pub mime_type: String,
    pub size: u64,
    pub sha256: String,
    pub source_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acting_user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
}

/// SHA-256 of `bytes` as lowercase hex.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut o = path.as_os_str().to_owned();
    o.push(suffix);
    PathBuf::from(o)
}

/// Write `data` to `path` via `<path>.part` and rename.
fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let temp = with_suffix(path, TEMP_SUFFIX);
    std::fs::write(&temp, data).with_context(|| format!("write {}", temp.display()))?;
    std::fs::rename(&temp, path)
        .with_context(|| format!("rename {} -> {}", temp.display(), path.display()))
}

/// Stores assets as plain files in one directory.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the metadata sidecar for a stored file.
    pub fn sidecar_path(file: &Path) -> PathBuf {
        with_suffix(file, ".json")
    }

    /// Reads back the sidecar of a stored asset.
    pub fn load_record(file: &Path) -> Result<AssetRecord> {
        let path = Self::sidecar_path(file);
        let bytes = std::fs::read(&path).with_context(|| format!("read {}", path.display()))?;
        serde_json::from_slice(&bytes).with_context(|| format!("parse {}", path.display()))
    }
}

impl AssetStore for DirectoryStore {
    fn store(&self, asset: &NewAsset) -> Result<StoredAsset> {
        std::fs::create_dir_all(&self.root)
            .with_context(|| format!("create dir: {}", self.root.display()))?;

        // Filenames are random ids; a collision means something is badly wrong.
        let path = self.root.join(&asset.filename);
        if path.exists() {
            anyhow::bail!("refusing to overwrite existing asset: {}", path.display());
        }

        let record = AssetRecord {
            title: asset.title.clone(),
            format: asset.format,
            mime_type: asset.format.mime_type().to_string(),
            size: asset.bytes.len() as u64,
            sha256: sha256_hex(&asset.bytes),
            source_url: asset.source_url.clone(),
            acting_user: asset.acting_user.clone(),
            collection: asset.collection.clone(),
        };
        let json = serde_json::to_string_pretty(&record).context("serialize asset record")?;

        write_atomic(&path, &asset.bytes)?;
        write_atomic(&Self::sidecar_path(&path), json.as_bytes())?;
        tracing::debug!(path = %path.display(), sha256 = %record.sha256, "stored asset");

        Ok(StoredAsset {
            path,
            sha256: record.sha256,
        })
    }
}
