//! `attachvault` - copies Gmail attachments into Google Drive.
//!
//! One invocation is one batch run: authorize, list recent messages with
//! attachments, upload whatever content has not been uploaded before,
//! and save the ledger.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod auth;
mod paths;

use anyhow::Context;
use attachvault_core::{
    BearerToken, DedupLedger, DriveClient, GmailClient, SyncConfig, SyncOrchestrator,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "attachvault=info,attachvault_core=info,attachvault_oauth=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting attachvault");

    let config_path = paths::config_path();
    let config = SyncConfig::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    info!("Loaded config from {}", config_path.display());

    let (app, token) = auth::authorize(&config).await?;
    let bearer = BearerToken::new(token.access_token.as_str());
    let renewal = auth::keep_fresh(app, token, bearer.clone());

    let gmail = GmailClient::new(bearer.clone())?;
    let drive = DriveClient::new(bearer)?;
    let ledger = DedupLedger::load(&config.log_file);

    let mut sync = SyncOrchestrator::new(&config, &gmail, &drive, ledger);
    let outcome = sync.run().await;
    renewal.abort();
    let report = outcome.context("Sync aborted")?;

    info!("Done: {report}");
    Ok(())
}
