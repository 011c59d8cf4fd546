//! The sync run: list, fetch, classify, route, dedup, upload.
//!
//! Each message moves through the same steps: it is fetched in full,
//! classified as starred or not, its destination folder is resolved,
//! its attachments are extracted, and every attachment ends up skipped
//! (ignored type or duplicate content) or transferred. A transfer that
//! exhausts its retries aborts the whole run; the ledger is then not
//! written (apart from any periodic flushes already done).

use std::fmt;

use tracing::{info, warn};

use crate::Result;
use crate::config::SyncConfig;
use crate::extract::find_attachments;
use crate::folder::{FolderResolver, destination};
use crate::ledger::{DedupLedger, Fingerprint};
use crate::model::{AttachmentPart, FileId, FolderId, FolderPath};
use crate::service::{FileStore, MessageSource};
use crate::transfer::{RetryPolicy, TransferExecutor};

/// What happened to one attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentOutcome {
    /// Its extension is on the ignore list.
    SkippedIgnored,
    /// Identical content was transferred before.
    SkippedDuplicate,
    /// Uploaded as a new file.
    Transferred(FileId),
}

/// Counters for a finished run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Messages processed.
    pub messages: usize,
    /// Attachments uploaded.
    pub uploaded: usize,
    /// Attachments skipped for their extension.
    pub skipped_ignored: usize,
    /// Attachments skipped as duplicate content.
    pub skipped_duplicate: usize,
}

impl SyncReport {
    fn count(&mut self, outcome: &AttachmentOutcome) {
        match outcome {
            AttachmentOutcome::SkippedIgnored => self.skipped_ignored += 1,
            AttachmentOutcome::SkippedDuplicate => self.skipped_duplicate += 1,
            AttachmentOutcome::Transferred(_) => self.uploaded += 1,
        }
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} messages, {} uploaded, {} duplicates skipped, {} ignored",
            self.messages, self.uploaded, self.skipped_duplicate, self.skipped_ignored
        )
    }
}

/// Drives a sync run over a message source and a file store.
pub struct SyncOrchestrator<'a, S, F> {
    config: &'a SyncConfig,
    source: &'a S,
    resolver: FolderResolver<'a, F>,
    transfer: TransferExecutor<'a, F>,
    ledger: DedupLedger,
}

impl<'a, S: MessageSource, F: FileStore> SyncOrchestrator<'a, S, F> {
    /// Creates an orchestrator with the default retry policy.
    #[must_use]
    pub fn new(config: &'a SyncConfig, source: &'a S, store: &'a F, ledger: DedupLedger) -> Self {
        Self {
            config,
            source,
            resolver: FolderResolver::new(store),
            transfer: TransferExecutor::new(store),
            ledger,
        }
    }

    /// Replaces the upload retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.transfer.set_policy(policy);
        self
    }

    /// The ledger as it stands.
    #[must_use]
    pub const fn ledger(&self) -> &DedupLedger {
        &self.ledger
    }

    /// Gives the ledger back.
    #[must_use]
    pub fn into_ledger(self) -> DedupLedger {
        self.ledger
    }

    /// Runs the sync once.
    ///
    /// # Errors
    ///
    /// Returns the first unrecovered error: a failed listing, fetch or
    /// folder resolution, a terminal upload failure, or a failed ledger
    /// write. Nothing after that point is processed.
    pub async fn run(&mut self) -> Result<SyncReport> {
        let mut report = SyncReport::default();

        let refs = self
            .source
            .list_messages(&self.config.query(), self.config.max_results)
            .await?;
        if refs.is_empty() {
            info!("No emails with attachments found");
            return Ok(report);
        }
        info!("Found {} messages with attachments", refs.len());

        for message_ref in &refs {
            self.process_message(&message_ref.id, &mut report).await?;
            report.messages += 1;
        }

        self.ledger.persist()?;
        info!("Sync finished: {report}");
        Ok(report)
    }

    async fn process_message(&mut self, id: &str, report: &mut SyncReport) -> Result<()> {
        let message = self.source.get_message(id).await?;

        let sender = message.sender_address();
        let starred = message.is_starred();
        let path = destination(
            &self.config.base_folder_name,
            starred,
            &sender,
            message.internal_date,
        );
        let folder = self.resolver.resolve_path(&path).await?;

        for attachment in find_attachments(&message.payload) {
            let outcome = self
                .process_attachment(&message.id, attachment, &folder, &path)
                .await?;
            report.count(&outcome);
        }

        Ok(())
    }

    async fn process_attachment(
        &mut self,
        message_id: &str,
        attachment: AttachmentPart<'_>,
        folder: &FolderId,
        path: &FolderPath,
    ) -> Result<AttachmentOutcome> {
        let filename = attachment.filename;

        if self.config.is_ignored(filename) {
            info!("Skipping ignored file type: {filename}");
            return Ok(AttachmentOutcome::SkippedIgnored);
        }

        let data = self
            .source
            .get_attachment(message_id, attachment.attachment_id)
            .await?;

        let fingerprint = Fingerprint::of(&data);
        if self.ledger.contains(&fingerprint) {
            info!("Skipping duplicate file: {filename}");
            return Ok(AttachmentOutcome::SkippedDuplicate);
        }

        let file_id = self.transfer.upload(&data, folder, filename).await?;
        info!("Saved: {filename} to {path}");

        self.ledger.record(fingerprint);
        self.maybe_flush();

        Ok(AttachmentOutcome::Transferred(file_id))
    }

    /// Persists early when the configured flush interval is reached.
    fn maybe_flush(&mut self) {
        let Some(interval) = self.config.ledger_flush_interval else {
            return;
        };
        if self.ledger.unsaved() >= interval {
            if let Err(e) = self.ledger.persist() {
                // The end-of-run persist will try again
                warn!("Periodic ledger flush failed: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_counts() {
        let mut report = SyncReport::default();
        report.count(&AttachmentOutcome::SkippedIgnored);
        report.count(&AttachmentOutcome::SkippedDuplicate);
        report.count(&AttachmentOutcome::Transferred(FileId("f".into())));
        report.count(&AttachmentOutcome::Transferred(FileId("g".into())));
        report.messages = 2;

        assert_eq!(report.uploaded, 2);
        assert_eq!(
            report.to_string(),
            "2 messages, 2 uploaded, 1 duplicates skipped, 1 ignored"
        );
    }
}
