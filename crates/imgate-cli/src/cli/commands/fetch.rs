//! `imgate fetch <url>` – full ingestion into a directory.

use anyhow::Result;
use imgate_core::config::GateConfig;
use imgate_core::fetch::CurlTransport;
use imgate_core::ingest::{self, DirectoryStore, IngestError, IngestRequest};
use imgate_core::url_policy::SystemResolver;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct FetchArgs {
    pub url: String,
    pub out_dir: PathBuf,
    pub user: Option<String>,
    pub collection: Option<String>,
}

pub async fn run_fetch(cfg: GateConfig, args: FetchArgs) -> Result<()> {
    let request = IngestRequest {
        url: args.url,
        acting_user: args.user,
        collection: args.collection,
    };
    let store = DirectoryStore::new(args.out_dir);

    let result = super::blocking_with_cancel(move |cancel| {
        let resolver = SystemResolver::from_config(&cfg);
        let transport = CurlTransport::new();
        ingest::ingest(&request, &cfg, &resolver, &transport, &store, cancel)
    })
    .await?;

    match result {
        Ok(out) => {
            println!(
                "Stored \"{}\" ({}, {} bytes) at {}",
                out.title,
                out.format,
                out.byte_length,
                out.stored.path.display()
            );
            println!("sha256 {}", out.stored.sha256);
            Ok(())
        }
        Err(IngestError::Storage(e)) => Err(e.context("store image")),
        Err(e) => match e.reason() {
            Some(reason) => anyhow::bail!("rejected: {} ({})", reason, e),
            None => Err(e.into()),
        },
    }
}
