//! # attachvault-core
//!
//! Sync engine that copies email attachments into a cloud file store.
//!
//! This crate provides:
//! - Part-tree walking to find attachment candidates
//! - Content-addressed dedup against a persisted ledger
//! - Idempotent destination folder resolution (`base/YYYY-MM` or
//!   `base/⭐ Starred/<sender>`)
//! - Uploads with bounded retry and exponential backoff
//! - The orchestrator tying these together for one batch run
//! - Gmail and Drive REST clients behind the [`MessageSource`] and
//!   [`FileStore`] traits

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod config;
mod error;
pub mod extract;
pub mod folder;
pub mod ledger;
pub mod model;
pub mod service;
pub mod sync;
pub mod transfer;

pub use config::SyncConfig;
pub use error::{Error, Result};
pub use extract::find_attachments;
pub use folder::{FolderResolver, STARRED_FOLDER_NAME, destination, month_folder, sanitize_sender};
pub use ledger::{DedupLedger, Fingerprint};
pub use model::{AttachmentPart, FileId, FolderId, FolderPath, Header, Message, MessageRef, Part};
pub use service::{
    BearerToken, DriveClient, FileStore, GmailClient, MessageSource, ServiceError, ServiceResult,
};
pub use sync::{AttachmentOutcome, SyncOrchestrator, SyncReport};
pub use transfer::{RetryPolicy, TransferExecutor};
