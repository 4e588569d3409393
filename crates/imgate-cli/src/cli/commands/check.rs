//! `imgate check <url>` – run the URL validator only.

use anyhow::Result;
use imgate_core::config::GateConfig;
use imgate_core::url_policy::{self, SystemResolver};

pub fn run_check(cfg: &GateConfig, url: &str) -> Result<()> {
    let resolver = SystemResolver::from_config(cfg);
    let verdict = url_policy::check(url, cfg, &resolver);
    match verdict.reason.reject_reason() {
        None => {
            match verdict.address {
                Some(ip) => println!("allowed  {url} ({ip})"),
                None => println!("allowed  {url}"),
            }
            Ok(())
        }
        Some(reason) => anyhow::bail!("rejected: {reason}"),
    }
}
