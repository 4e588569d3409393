//! CLI for the imgate URL image-ingestion gate.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use imgate_core::config::{self, GateConfig};
use std::path::{Path, PathBuf};

use commands::{run_check, run_config, run_fetch, run_probe, FetchArgs};

/// Top-level CLI for imgate.
#[derive(Debug, Parser)]
#[command(name = "imgate")]
#[command(about = "imgate: fetch images from untrusted URLs without SSRF or oversized payloads", long_about = None)]
pub struct Cli {
    /// Config file to use instead of ~/.config/imgate/config.toml.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Validate a URL against the security policy without fetching it.
    Check {
        /// URL to validate.
        url: String,
    },

    /// Validate a URL, then send a HEAD request to see whether it serves an image.
    Probe {
        /// URL to probe.
        url: String,
    },

    /// Validate, download, verify and store an image.
    Fetch {
        /// URL of the image.
        url: String,

        /// Directory the image and its metadata sidecar are written to (default: current directory).
        #[arg(long, value_name = "DIR")]
        out: Option<PathBuf>,

        /// User recorded as the uploader.
        #[arg(long)]
        user: Option<String>,

        /// Collection the image is added to.
        #[arg(long)]
        collection: Option<String>,
    },

    /// Print the config file location and the effective settings.
    Config,
}

fn load_config(path: Option<&Path>) -> Result<(GateConfig, PathBuf)> {
    match path {
        Some(p) => Ok((config::load_from_path(p)?, p.to_path_buf())),
        None => Ok((config::load_or_init()?, config::config_path()?)),
    }
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let (cfg, cfg_path) = load_config(cli.config.as_deref())?;
        tracing::debug!("loaded config from {}: {:?}", cfg_path.display(), cfg);

        match cli.command {
            CliCommand::Check { url } => run_check(&cfg, &url)?,
            CliCommand::Probe { url } => run_probe(cfg, url).await?,
            CliCommand::Fetch {
                url,
                out,
                user,
                collection,
            } => {
                let out_dir = match out {
                    Some(dir) => dir,
                    None => std::env::current_dir()?,
                };
                let args = FetchArgs {
                    url,
                    out_dir,
                    user,
                    collection,
                };
                run_fetch(cfg, args).await?;
            }
            CliCommand::Config => run_config(&cfg, &cfg_path)?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
