use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default download ceiling: 10 MiB.
pub const DEFAULT_MAX_BYTES: u64 = 10 * 1024 * 1024;

/// Default ceiling on memory a single image decode may allocate: 64 MiB.
pub const DEFAULT_MAX_DECODE_BYTES: u64 = 64 * 1024 * 1024;

/// Formats accepted when the config does not override them. `jpg` is an alias of `jpeg`.
pub const DEFAULT_ALLOWED_FORMATS: &[&str] = &["avif", "gif", "jpeg", "jpg", "png", "webp"];

/// Gate configuration loaded from `~/.config/imgate/config.toml`.
///
/// Read once and passed by reference into the validator and the fetcher;
/// nothing inside the gate looks configuration up on its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateConfig {
    /// Exclusive allow-list. When present, only these hosts pass and the block-list is ignored.
    #[serde(default)]
    pub allowed_domains: Option<BTreeSet<String>>,
    /// Hosts that are always rejected (only consulted when there is no allow-list).
    #[serde(default)]
    pub blocked_domains: BTreeSet<String>,
    /// Reject hosts that resolve to private, loopback, link-local, reserved or multicast addresses.
    #[serde(default = "default_prevent_ssrf")]
    pub prevent_ssrf: bool,
    /// Maximum payload size in bytes.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: u64,
    /// Maximum memory one decode may allocate. Bounds images that declare huge dimensions.
    #[serde(default = "default_max_decode_bytes")]
    pub max_decode_bytes: u64,
    /// TCP/TLS connect timeout in seconds (also bounds DNS resolution in the validator).
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Abort when no body bytes arrive for this many seconds.
    #[serde(default = "default_read_timeout_secs")]
    pub read_timeout_secs: u64,
    /// Hard wall-clock ceiling for a single transfer.
    #[serde(default = "default_total_timeout_secs")]
    pub total_timeout_secs: u64,
    /// Redirect hops followed (each one re-validated) before giving up.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: u32,
    /// Image formats accepted after signature detection (case-insensitive).
    #[serde(default = "default_allowed_formats")]
    pub allowed_formats: BTreeSet<String>,
    /// User-Agent sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_prevent_ssrf() -> bool {
    true
}

fn default_max_bytes() -> u64 {
    DEFAULT_MAX_BYTES
}

fn default_max_decode_bytes() -> u64 {
    DEFAULT_MAX_DECODE_BYTES
}

fn default_connect_timeout_secs() -> u64 {
    5
}

fn default_read_timeout_secs() -> u64 {
    15
}

fn default_total_timeout_secs() -> u64 {
    60
}

fn default_max_redirects() -> u32 {
    5
}

fn default_allowed_formats() -> BTreeSet<String> {
    DEFAULT_ALLOWED_FORMATS.iter().map(|s| s.to_string()).collect()
}

fn default_user_agent() -> String {
    format!("imgate/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            allowed_domains: None,
            blocked_domains: BTreeSet::new(),
            prevent_ssrf: default_prevent_ssrf(),
            max_bytes: default_max_bytes(),
            max_decode_bytes: default_max_decode_bytes(),
            connect_timeout_secs: default_connect_timeout_secs(),
            read_timeout_secs: default_read_timeout_secs(),
            total_timeout_secs: default_total_timeout_secs(),
            max_redirects: default_max_redirects(),
            allowed_formats: default_allowed_formats(),
            user_agent: default_user_agent(),
        }
    }
}

impl GateConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn total_timeout(&self) -> Duration {
        Duration::from_secs(self.total_timeout_secs)
    }

    /// True if `format` (e.g. "jpeg") is in `allowed_formats`, ignoring case.
    /// `jpeg` and `jpg` are treated as the same format.
    pub fn format_allowed(&self, format: &str) -> bool {
        let wanted = canonical_format(format);
        self.allowed_formats
            .iter()
            .any(|f| canonical_format(f) == wanted)
    }

    /// Allowed formats in a stable, human-readable form for rejection messages.
    pub fn allowed_formats_list(&self) -> String {
        let set: BTreeSet<String> = self
            .allowed_formats
            .iter()
            .map(|f| f.to_ascii_lowercase())
            .collect();
        set.into_iter().collect::<Vec<_>>().join(", ")
    }
}

fn canonical_format(f: &str) -> String {
    let lower = f.trim().to_ascii_lowercase();
    if lower == "jpg" {
        "jpeg".to_string()
    } else {
        lower
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("imgate")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<GateConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = GateConfig::default();
        save_to_path(&default_cfg, &path)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }
    load_from_path(&path)
}

/// Load configuration from an explicit path. Missing fields take their defaults.
pub fn load_from_path(path: &Path) -> Result<GateConfig> {
    let data =
        fs::read_to_string(path).with_context(|| format!("read config: {}", path.display()))?;
    let cfg: GateConfig =
        toml::from_str(&data).with_context(|| format!("parse config: {}", path.display()))?;
    Ok(cfg)
}

/// Config rendered as the TOML written to disk.
pub fn to_toml(cfg: &GateConfig) -> Result<String> {
    toml::to_string_pretty(cfg).context("serialize config")
}

pub fn save_to_path(cfg: &GateConfig, path: &Path) -> Result<()> {
    let toml = to_toml(cfg)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create dir: {}", parent.display()))?;
    }
    fs::write(path, toml).with_context(|| format!("write config: {}", path.display()))?;
    Ok(())
}
