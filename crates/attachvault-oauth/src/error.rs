//! Credential errors.

use std::io;

/// Result type alias for credential operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Things that can go wrong while obtaining a token.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Reading or writing the token cache or client secret failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The token endpoint could not be reached.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A JSON document (client secret, token cache, grant response) was malformed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An endpoint URL did not parse.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// The token endpoint rejected the grant.
    #[error("Token request rejected: {code}: {description}")]
    Rejected {
        /// Error code, e.g. `invalid_grant`.
        code: String,
        /// Description sent by the server, possibly empty.
        description: String,
    },

    /// The cached token cannot be refreshed.
    #[error("No refresh token available")]
    NoRefreshToken,

    /// The redirect did not carry the state we sent.
    #[error("Authorization state mismatch")]
    StateMismatch,

    /// The user declined consent.
    #[error("User denied authorization")]
    AccessDenied,

    /// The browser never came back to the loopback receiver.
    #[error("No authorization redirect within {0} seconds")]
    Timeout(u64),

    /// The client secret file is unusable.
    #[error("Invalid client secret: {0}")]
    InvalidSecret(String),
}

impl Error {
    /// Maps an `error` code from a redirect or token response.
    #[must_use]
    pub fn rejected(code: impl Into<String>, description: impl Into<String>) -> Self {
        let code = code.into();
        if code == "access_denied" {
            return Self::AccessDenied;
        }
        Self::Rejected {
            code,
            description: description.into(),
        }
    }
}
