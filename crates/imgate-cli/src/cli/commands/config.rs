//! `imgate config` – show where the config lives and what is in effect.

use anyhow::Result;
use imgate_core::config::{self, GateConfig};
use std::path::Path;

pub fn run_config(cfg: &GateConfig, path: &Path) -> Result<()> {
    println!("# {}", path.display());
    print!("{}", config::to_toml(cfg)?);
    Ok(())
}
