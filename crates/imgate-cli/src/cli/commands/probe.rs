//! `imgate probe <url>` – validate, then HEAD the URL.

use anyhow::Result;
use imgate_core::config::GateConfig;
use imgate_core::fetch;
use imgate_core::url_policy::{self, SystemResolver};

use super::blocking_with_cancel;

pub async fn run_probe(cfg: GateConfig, url: String) -> Result<()> {
    let result = blocking_with_cancel(move |cancel| {
        let resolver = SystemResolver::from_config(&cfg);
        let verdict = url_policy::check(&url, &cfg, &resolver);
        fetch::probe(&url, &cfg, &verdict, cancel)
    })
    .await?;

    match result {
        Ok(p) => {
            let size = p
                .content_length
                .map(|n| format!("{n} bytes"))
                .unwrap_or_else(|| "unknown size".to_string());
            println!("{}  {}  {}  {}", p.status, p.content_type, size, p.final_url);
            Ok(())
        }
        Err(e) => anyhow::bail!("rejected: {} ({})", e.reason(), e),
    }
}
