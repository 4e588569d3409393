//! CLI command handlers, one per file.

mod check;
mod config;
mod fetch;
mod probe;

pub use check::run_check;
pub use config::run_config;
pub use fetch::{run_fetch, FetchArgs};
pub use probe::run_probe;

use anyhow::Result;
use imgate_core::cancel::CancelToken;

/// Runs `work` on the blocking pool. Ctrl-C flips the token handed to it;
/// the work is still awaited so partial state is dropped before returning.
async fn blocking_with_cancel<T, F>(work: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&CancelToken) -> T + Send + 'static,
{
    let cancel = CancelToken::new();
    let worker_cancel = cancel.clone();
    let mut task = tokio::task::spawn_blocking(move || work(&worker_cancel));
    let out = tokio::select! {
        joined = &mut task => joined?,
        _ = tokio::signal::ctrl_c() => {
            eprintln!("Cancelling...");
            cancel.cancel();
            task.await?
        }
    };
    Ok(out)
}
