//! Installed-application client secrets.
//!
//! Google hands out a `client_secret.json` with either an `installed`
//! or a `web` section. Both carry the same fields we need.

use std::path::Path;

use serde::Deserialize;

use crate::client::{GOOGLE_AUTH_URI, GOOGLE_TOKEN_URI, OAuthClient};
use crate::error::{Error, Result};

/// Client credentials as found in a downloaded `client_secret.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecret {
    /// Client ID.
    pub client_id: String,
    /// Client secret.
    #[serde(default)]
    pub client_secret: Option<String>,
    /// Authorization endpoint, when it differs from the provider default.
    #[serde(default)]
    pub auth_uri: Option<String>,
    /// Token endpoint, when it differs from the provider default.
    #[serde(default)]
    pub token_uri: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SecretFile {
    installed: Option<ClientSecret>,
    web: Option<ClientSecret>,
}

impl ClientSecret {
    /// Parses the JSON content of a client secret file.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or has neither an
    /// `installed` nor a `web` section.
    pub fn from_json(raw: &str) -> Result<Self> {
        let file: SecretFile = serde_json::from_str(raw)?;
        file.installed.or(file.web).ok_or_else(|| {
            Error::InvalidSecret("no `installed` or `web` section".into())
        })
    }

    /// Reads and parses a client secret file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    /// Builds an [`OAuthClient`] for these credentials.
    ///
    /// Endpoints missing from the file default to Google's.
    ///
    /// # Errors
    ///
    /// Returns an error if an endpoint URL is invalid.
    pub fn client(&self) -> Result<OAuthClient> {
        OAuthClient::new(
            &self.client_id,
            self.client_secret.clone(),
            self.auth_uri.as_deref().unwrap_or(GOOGLE_AUTH_URI),
            self.token_uri.as_deref().unwrap_or(GOOGLE_TOKEN_URI),
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_installed() {
        let raw = r#"{
            "installed": {
                "client_id": "abc.apps.googleusercontent.com",
                "project_id": "demo",
                "auth_uri": "https://accounts.google.com/o/oauth2/auth",
                "token_uri": "https://oauth2.googleapis.com/token",
                "client_secret": "s3cret",
                "redirect_uris": ["http://localhost"]
            }
        }"#;

        let secret = ClientSecret::from_json(raw).unwrap();
        assert_eq!(secret.client_id, "abc.apps.googleusercontent.com");
        assert_eq!(secret.client_secret.as_deref(), Some("s3cret"));

        assert!(secret.client().is_ok());
    }

    #[test]
    fn test_parse_web_section() {
        let raw = r#"{"web": {"client_id": "web-client", "token_uri": "::bad"}}"#;
        let secret = ClientSecret::from_json(raw).unwrap();
        assert!(secret.client_secret.is_none());
        assert!(secret.auth_uri.is_none());
        assert!(matches!(secret.client().unwrap_err(), Error::Url(_)));
    }

    #[test]
    fn test_missing_section() {
        let err = ClientSecret::from_json(r#"{"other": {}}"#).unwrap_err();
        assert!(matches!(err, Error::InvalidSecret(_)));
    }
}
