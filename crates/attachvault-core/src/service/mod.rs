//! Remote services the sync engine talks to.
//!
//! The engine only sees the [`MessageSource`] and [`FileStore`] traits;
//! [`GmailClient`] and [`DriveClient`] are the REST implementations.

pub mod drive;
pub mod gmail;
#[cfg(test)]
pub(crate) mod memory;

pub use drive::DriveClient;
pub use gmail::GmailClient;

use std::sync::{Arc, PoisonError, RwLock};

use serde::Deserialize;

use crate::model::{FileId, FolderId, Message, MessageRef};

/// Errors from a remote service call.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Transport failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Message from the error body, or the raw body.
        message: String,
    },

    /// The response did not have the expected shape.
    #[error("Unexpected response: {0}")]
    Decode(String),
}

/// Result type for service calls.
pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

/// Bearer token shared between the REST clients and whoever refreshes it.
///
/// Clones share one slot: [`BearerToken::set`] on any clone is seen by
/// the next request of every client holding another clone.
#[derive(Debug, Clone, Default)]
pub struct BearerToken(Arc<RwLock<String>>);

impl BearerToken {
    /// Wraps an access token.
    #[must_use]
    pub fn new(access_token: impl Into<String>) -> Self {
        Self(Arc::new(RwLock::new(access_token.into())))
    }

    /// The current access token.
    #[must_use]
    pub fn get(&self) -> String {
        self.0
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replaces the access token for all clones.
    pub fn set(&self, access_token: impl Into<String>) {
        *self.0.write().unwrap_or_else(PoisonError::into_inner) = access_token.into();
    }
}

/// Where messages come from.
#[allow(async_fn_in_trait)]
pub trait MessageSource {
    /// Lists up to `max_results` messages matching `query`.
    async fn list_messages(&self, query: &str, max_results: u32) -> ServiceResult<Vec<MessageRef>>;

    /// Fetches a message with its full part tree.
    async fn get_message(&self, id: &str) -> ServiceResult<Message>;

    /// Fetches and decodes an attachment body.
    async fn get_attachment(&self, message_id: &str, attachment_id: &str)
    -> ServiceResult<Vec<u8>>;
}

/// Where attachments are written to.
#[allow(async_fn_in_trait)]
pub trait FileStore {
    /// Non-trashed folders named exactly `name` under `parent` (root when `None`).
    async fn list_folders(&self, name: &str, parent: Option<&FolderId>)
    -> ServiceResult<Vec<FolderId>>;

    /// Creates a folder under `parent` (root when `None`).
    async fn create_folder(&self, name: &str, parent: Option<&FolderId>) -> ServiceResult<FolderId>;

    /// Uploads `data` as a binary file named `name` into `parent`.
    async fn create_file(&self, name: &str, parent: &FolderId, data: &[u8])
    -> ServiceResult<FileId>;
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: String,
}

/// Turns a non-success response into [`ServiceError::Api`].
pub(crate) async fn check_status(response: reqwest::Response) -> ServiceResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(api_error(status.as_u16(), &body))
}

fn api_error(status: u16, body: &str) -> ServiceError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.error.message)
        .ok()
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| body.trim().to_string());
    ServiceError::Api { status, message }
}
