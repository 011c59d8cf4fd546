//! Retrying uploads into the file store.

use std::time::Duration;

use tracing::{error, warn};

use crate::model::{FileId, FolderId};
use crate::service::FileStore;
use crate::{Error, Result};

/// How often and how patiently an upload is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Wait before the first retry; doubles for each retry after that.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Wait after failed attempt number `attempt` (1-based).
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }
}

/// Uploads payloads with bounded retry and exponential backoff.
pub struct TransferExecutor<'a, F> {
    store: &'a F,
    policy: RetryPolicy,
}

impl<'a, F: FileStore> TransferExecutor<'a, F> {
    /// Create an executor with the default policy (3 attempts, 1 s base).
    #[must_use]
    pub fn new(store: &'a F) -> Self {
        Self::with_policy(store, RetryPolicy::default())
    }

    /// Create an executor with a custom policy.
    #[must_use]
    pub const fn with_policy(store: &'a F, policy: RetryPolicy) -> Self {
        Self { store, policy }
    }

    /// Replaces the retry policy.
    pub fn set_policy(&mut self, policy: RetryPolicy) {
        self.policy = policy;
    }

    /// Uploads `payload` as `filename` into `folder`.
    ///
    /// Any service error is retried until the policy's attempt bound is
    /// reached. A late success looks exactly like a first-try success.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transfer`] carrying the last error once every
    /// attempt has failed.
    pub async fn upload(&self, payload: &[u8], folder: &FolderId, filename: &str) -> Result<FileId> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.store.create_file(filename, folder, payload).await {
                Ok(id) => return Ok(id),
                Err(e) if attempt < max_attempts => {
                    let wait = self.policy.delay_after(attempt);
                    warn!(
                        "Upload of {filename} failed (attempt {attempt}): {e}; retrying in {}s",
                        wait.as_secs_f32()
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                Err(e) => {
                    error!("Giving up on {filename} after {attempt} failed attempts");
                    return Err(Error::Transfer {
                        filename: filename.to_string(),
                        attempts: attempt,
                        source: e,
                    });
                }
            }
        }
    }
}
