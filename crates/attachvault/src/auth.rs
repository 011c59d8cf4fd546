//! Credential bootstrap and renewal for the Gmail and Drive clients.

use std::time::Duration;

use anyhow::Context;
use attachvault_core::{BearerToken, SyncConfig};
use attachvault_oauth::{ClientSecret, InstalledApp, REFRESH_MARGIN, Token};
use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Wait before trying again after a failed refresh.
const RETRY_AFTER: Duration = Duration::from_secs(30);

/// Returns the credential provider and a usable token, asking for consent
/// in the browser if needed.
pub async fn authorize(config: &SyncConfig) -> anyhow::Result<(InstalledApp, Token)> {
    let secret = ClientSecret::from_file(&config.client_secret_file).with_context(|| {
        format!(
            "Failed to read client secret from {}",
            config.client_secret_file.display()
        )
    })?;
    let app = InstalledApp::new(secret.client()?, config.scopes.clone(), &config.token_file);

    let token = app
        .token(|url| {
            println!("Authorize attachvault by visiting:\n\n    {url}\n");
            if let Err(e) = opener::open(url.as_str()) {
                warn!("Could not open a browser: {e}");
            }
        })
        .await
        .context("Authorization failed")?;
    Ok((app, token))
}

/// Refreshes `token` shortly before each expiry and publishes the new
/// access token through `bearer`, until the task is aborted.
///
/// Tokens without an expiry or without a refresh token are left alone.
pub fn keep_fresh(app: InstalledApp, mut token: Token, bearer: BearerToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        while token.can_refresh() {
            let Some(wait) = token.refresh_due_in(REFRESH_MARGIN, Utc::now()) else {
                return;
            };
            debug!("Next token refresh in {}s", wait.as_secs());
            tokio::time::sleep(wait).await;

            match app.refresh(&token).await {
                Ok(renewed) => {
                    bearer.set(renewed.access_token.as_str());
                    token = renewed;
                }
                Err(e) => {
                    warn!("Background token refresh failed: {e}");
                    tokio::time::sleep(RETRY_AFTER).await;
                }
            }
        }
    })
}
