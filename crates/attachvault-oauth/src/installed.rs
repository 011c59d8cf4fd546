//! Credential bootstrap for installed applications.
//!
//! Reuses a cached token while it has enough lifetime left, refreshes it
//! otherwise, and falls back to an interactive consent flow through the
//! browser and a loopback redirect.

use std::path::PathBuf;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{Duration, Utc};
use rand::Rng;
use rand::distributions::Alphanumeric;
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use url::Url;

use crate::client::{ConsentRequest, OAuthClient};
use crate::error::Result;
use crate::loopback::LoopbackReceiver;
use crate::token::Token;

/// Read-only access to Gmail messages and attachments.
pub const GMAIL_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/gmail.readonly";

/// Access to Drive files created by this application.
pub const DRIVE_FILE_SCOPE: &str = "https://www.googleapis.com/auth/drive.file";

/// A token closer than this to expiry is refreshed before it is handed out.
pub const REFRESH_MARGIN: Duration = Duration::minutes(10);

/// Obtains usable tokens for an installed application.
#[derive(Debug)]
pub struct InstalledApp {
    client: OAuthClient,
    scopes: Vec<String>,
    token_path: PathBuf,
}

impl InstalledApp {
    /// Creates a bootstrapper that caches tokens at `token_path`.
    ///
    /// An empty `scopes` list requests Gmail read-only and Drive file access.
    #[must_use]
    pub fn new(client: OAuthClient, scopes: Vec<String>, token_path: impl Into<PathBuf>) -> Self {
        let scopes = if scopes.is_empty() {
            vec![GMAIL_READONLY_SCOPE.to_string(), DRIVE_FILE_SCOPE.to_string()]
        } else {
            scopes
        };
        Self {
            client,
            scopes,
            token_path: token_path.into(),
        }
    }

    /// Returns a token good for at least [`REFRESH_MARGIN`], authorizing
    /// interactively if needed.
    ///
    /// `open_url` is called with the consent URL when the user has to
    /// authorize the application in a browser.
    ///
    /// # Errors
    ///
    /// Returns an error if the consent flow or writing the token cache
    /// fails. A failed refresh falls through to the consent flow.
    pub async fn token<F>(&self, open_url: F) -> Result<Token>
    where
        F: FnOnce(&Url),
    {
        if let Some(cached) = Token::load(&self.token_path) {
            if !cached.expires_within(REFRESH_MARGIN, Utc::now()) {
                info!("Using cached credentials");
                return Ok(cached);
            }

            if cached.can_refresh() {
                match self.refresh(&cached).await {
                    Ok(token) => return Ok(token),
                    Err(e) => warn!("Token refresh failed, re-authorizing: {e}"),
                }
            }
        }

        let token = self.authorize(open_url).await?;
        token.save(&self.token_path)?;
        Ok(token)
    }

    /// Refreshes `token` and writes the result to the cache.
    ///
    /// # Errors
    ///
    /// Returns an error if the token has no refresh token, the server
    /// rejects it, or the cache cannot be written.
    pub async fn refresh(&self, token: &Token) -> Result<Token> {
        let renewed = self.client.refresh(token).await?;
        renewed.save(&self.token_path)?;
        info!("Refreshed credentials");
        Ok(renewed)
    }

    async fn authorize<F>(&self, open_url: F) -> Result<Token>
    where
        F: FnOnce(&Url),
    {
        let receiver = LoopbackReceiver::bind().await?;
        let redirect_uri = receiver.redirect_uri();
        let verifier = random_string(64);
        let state = random_string(24);

        let url = self.client.consent_url(&ConsentRequest {
            redirect_uri: &redirect_uri,
            scopes: &self.scopes,
            state: &state,
            code_challenge: &code_challenge(&verifier),
        });

        info!("Waiting for authorization in the browser");
        open_url(&url);

        let code = receiver.receive(&state).await?;
        self.client
            .exchange_code(&code, &verifier, &redirect_uri)
            .await
    }
}

/// Alphanumeric string, which is also a valid PKCE verifier alphabet.
fn random_string(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// S256 challenge for a PKCE verifier (RFC 7636 §4.2).
fn code_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}
