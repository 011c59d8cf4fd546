//! Requests against the authorization server.

use chrono::{Duration, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::error::{Error, Result};
use crate::token::Token;

/// Google's consent page.
pub const GOOGLE_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";

/// Google's token endpoint.
pub const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// An application registered with the authorization server.
#[derive(Debug, Clone)]
pub struct OAuthClient {
    http: Client,
    client_id: String,
    client_secret: Option<String>,
    auth_uri: Url,
    token_uri: Url,
}

/// What an authorization URL asks for.
#[derive(Debug, Clone, Copy)]
pub struct ConsentRequest<'a> {
    /// Where the browser is sent back to.
    pub redirect_uri: &'a str,
    /// Requested scopes.
    pub scopes: &'a [String],
    /// Value the redirect must echo back.
    pub state: &'a str,
    /// S256 PKCE challenge.
    pub code_challenge: &'a str,
}

impl OAuthClient {
    /// Creates a client for the given endpoints.
    ///
    /// # Errors
    ///
    /// Returns an error if an endpoint is not a valid URL.
    pub fn new(
        client_id: impl Into<String>,
        client_secret: Option<String>,
        auth_uri: &str,
        token_uri: &str,
    ) -> Result<Self> {
        Ok(Self {
            http: Client::new(),
            client_id: client_id.into(),
            client_secret,
            auth_uri: Url::parse(auth_uri)?,
            token_uri: Url::parse(token_uri)?,
        })
    }

    /// The consent page URL the user has to visit.
    ///
    /// Asks for offline access so the grant includes a refresh token.
    #[must_use]
    pub fn consent_url(&self, request: &ConsentRequest<'_>) -> Url {
        let mut url = self.auth_uri.clone();
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("response_type", "code")
            .append_pair("redirect_uri", request.redirect_uri)
            .append_pair("scope", &request.scopes.join(" "))
            .append_pair("state", request.state)
            .append_pair("code_challenge", request.code_challenge)
            .append_pair("code_challenge_method", "S256")
            .append_pair("access_type", "offline")
            .append_pair("prompt", "consent");
        url
    }

    /// Trades an authorization code for a token.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server rejects the code.
    pub async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
        redirect_uri: &str,
    ) -> Result<Token> {
        debug!("Exchanging authorization code");
        self.grant(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("code_verifier", code_verifier),
            ("redirect_uri", redirect_uri),
        ])
        .await
    }

    /// Obtains a new access token with the refresh token of `token`.
    ///
    /// The returned token keeps the old refresh token when the server does
    /// not issue a new one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoRefreshToken`] if `token` has none, or an error
    /// if the request fails or the server rejects the grant.
    pub async fn refresh(&self, token: &Token) -> Result<Token> {
        let refresh_token = token.refresh_token.as_deref().ok_or(Error::NoRefreshToken)?;

        debug!("Refreshing access token");
        let mut renewed = self
            .grant(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .await?;
        if renewed.refresh_token.is_none() {
            renewed.refresh_token.clone_from(&token.refresh_token);
        }
        Ok(renewed)
    }

    async fn grant(&self, fields: &[(&str, &str)]) -> Result<Token> {
        let mut form = vec![("client_id", self.client_id.as_str())];
        if let Some(secret) = &self.client_secret {
            form.push(("client_secret", secret.as_str()));
        }
        form.extend_from_slice(fields);

        let response = self
            .http
            .post(self.token_uri.clone())
            .form(&form)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await?;
            return Err(match serde_json::from_str::<GrantError>(&body) {
                Ok(e) => Error::rejected(e.error, e.error_description),
                Err(_) => Error::rejected(status.to_string(), body),
            });
        }

        let granted: Grant = response.json().await?;
        Ok(granted.into())
    }
}

#[derive(Debug, Deserialize)]
struct Grant {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
}

impl From<Grant> for Token {
    fn from(grant: Grant) -> Self {
        Self {
            access_token: grant.access_token,
            refresh_token: grant.refresh_token,
            expires_at: grant
                .expires_in
                .map(|secs| Utc::now() + Duration::seconds(secs)),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GrantError {
    error: String,
    #[serde(default)]
    error_description: String,
}
