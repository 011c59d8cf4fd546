//! Access tokens and the `token.json` cache.

use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// A bearer access token, with what is needed to renew it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// Value for the `Authorization: Bearer` header.
    pub access_token: String,
    /// Long-lived token used to obtain new access tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// When the access token stops working; `None` if the server did not say.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Token {
    /// A token with no expiry and no refresh token.
    #[must_use]
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            expires_at: None,
        }
    }

    /// Sets the refresh token.
    #[must_use]
    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    /// Sets the expiry.
    #[must_use]
    pub const fn with_expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Whether the token expires within `margin` of `now`.
    ///
    /// A token without an expiry never does.
    #[must_use]
    pub fn expires_within(&self, margin: Duration, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at - now <= margin)
    }

    /// How long from `now` until the token is within `margin` of expiring.
    ///
    /// Zero when that point has passed; `None` for tokens without expiry.
    #[must_use]
    pub fn refresh_due_in(&self, margin: Duration, now: DateTime<Utc>) -> Option<std::time::Duration> {
        self.expires_at
            .map(|at| (at - margin - now).to_std().unwrap_or_default())
    }

    /// Whether the token carries a refresh token.
    #[must_use]
    pub const fn can_refresh(&self) -> bool {
        self.refresh_token.is_some()
    }

    /// Loads a cached token from `path`.
    ///
    /// A missing or unparsable cache yields `None`; the caller then has to
    /// authorize again.
    #[must_use]
    pub fn load(path: &Path) -> Option<Self> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) => {
                debug!("No cached token at {}: {e}", path.display());
                return None;
            }
        };

        serde_json::from_str(&raw)
            .inspect_err(|e| warn!("Ignoring unreadable token cache {}: {e}", path.display()))
            .ok()
    }

    /// Writes the token to `path` as JSON, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save(&self, path: &Path) -> crate::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        debug!("Saved token to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_expires_within() {
        let now = Utc::now();
        let token = Token::new("a").with_expires_at(now + Duration::seconds(90));

        assert!(token.expires_within(Duration::minutes(10), now));
        assert!(!token.expires_within(Duration::seconds(60), now));
        assert!(!Token::new("a").expires_within(Duration::days(365), now));
    }

    #[test]
    fn test_refresh_due_in() {
        let now = Utc::now();
        let margin = Duration::minutes(10);

        let fresh = Token::new("a").with_expires_at(now + Duration::hours(1));
        assert_eq!(
            fresh.refresh_due_in(margin, now),
            Some(std::time::Duration::from_secs(50 * 60))
        );

        let stale = Token::new("a").with_expires_at(now - Duration::minutes(5));
        assert_eq!(stale.refresh_due_in(margin, now), Some(std::time::Duration::ZERO));

        assert_eq!(Token::new("a").refresh_due_in(margin, now), None);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache").join("token.json");

        let token = Token::new("access123")
            .with_refresh_token("refresh456")
            .with_expires_at(Utc::now());
        token.save(&path).unwrap();

        let loaded = Token::load(&path).unwrap();
        assert_eq!(loaded, token);
        assert!(loaded.can_refresh());
    }

    #[test]
    fn test_load_missing_or_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        assert!(Token::load(&path).is_none());

        std::fs::write(&path, "{not json").unwrap();
        assert!(Token::load(&path).is_none());
    }
}
