//! Destination folder naming and resolution.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::Result;
use crate::model::{FolderId, FolderPath};
use crate::service::FileStore;

/// Folder under the base that collects starred messages, one subfolder per sender.
pub const STARRED_FOLDER_NAME: &str = "⭐ Starred";

/// Replaces anything outside `[alnum _ . -]` with `_`.
///
/// `jane.doe@example.com` becomes `jane.doe_example.com`. An empty
/// address maps to `unknown` so the folder name is never empty.
#[must_use]
pub fn sanitize_sender(address: &str) -> String {
    if address.is_empty() {
        return "unknown".to_string();
    }
    address
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '_' | '.' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// `YYYY-MM` (UTC) of an epoch-millisecond timestamp.
///
/// Timestamps outside chrono's range fall back to the epoch month.
#[must_use]
pub fn month_folder(timestamp_ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(timestamp_ms)
        .unwrap_or_default()
        .format("%Y-%m")
        .to_string()
}

/// Where a message's attachments go.
///
/// Starred messages: `base/⭐ Starred/<sanitized sender>`.
/// Everything else: `base/<YYYY-MM>`.
#[must_use]
pub fn destination(base: &str, starred: bool, sender: &str, timestamp_ms: i64) -> FolderPath {
    if starred {
        FolderPath::new(base)
            .child(STARRED_FOLDER_NAME)
            .child(sanitize_sender(sender))
    } else {
        FolderPath::new(base).child(month_folder(timestamp_ms))
    }
}

/// Finds or creates folders in the file store.
///
/// Resolved identifiers are memoized for the resolver's lifetime, so a
/// path shared by many messages costs remote calls only once per run.
pub struct FolderResolver<'a, F> {
    store: &'a F,
    cache: HashMap<(Option<FolderId>, String), FolderId>,
}

impl<'a, F: FileStore> FolderResolver<'a, F> {
    /// Create a resolver over `store`.
    #[must_use]
    pub fn new(store: &'a F) -> Self {
        Self {
            store,
            cache: HashMap::new(),
        }
    }

    /// Returns the folder named `name` under `parent` (root when `None`),
    /// creating it if no non-trashed folder of that name exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup or the create call fails. Nothing
    /// is retried at this layer.
    pub async fn resolve(&mut self, name: &str, parent: Option<&FolderId>) -> Result<FolderId> {
        let key = (parent.cloned(), name.to_string());
        if let Some(id) = self.cache.get(&key) {
            return Ok(id.clone());
        }

        let existing = self.store.list_folders(name, parent).await?;
        let id = if let Some(id) = existing.into_iter().next() {
            debug!("Found folder {name} ({id})");
            id
        } else {
            let id = self.store.create_folder(name, parent).await?;
            info!("Created folder {name} ({id})");
            id
        };

        self.cache.insert(key, id.clone());
        Ok(id)
    }

    /// Resolves every segment of `path` from the root down.
    ///
    /// # Errors
    ///
    /// Returns an error if any segment fails to resolve, or if the path
    /// is empty.
    pub async fn resolve_path(&mut self, path: &FolderPath) -> Result<FolderId> {
        let mut parent: Option<FolderId> = None;
        for segment in path.segments() {
            parent = Some(self.resolve(segment, parent.as_ref()).await?);
        }
        parent.ok_or_else(|| crate::Error::Config("empty folder path".into()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::service::memory::MemoryStore;
    use proptest::prelude::*;

    #[test]
    fn test_sanitize_sender() {
        assert_eq!(sanitize_sender("jane.doe@example.com"), "jane.doe_example.com");
        assert_eq!(sanitize_sender("a+b/c@x-y.io"), "a_b_c_x-y.io");
        assert_eq!(sanitize_sender("üser@exämple.de"), "üser_exämple.de");
        assert_eq!(sanitize_sender(""), "unknown");
    }

    #[test]
    fn test_month_folder() {
        // 2024-03-15T12:00:00Z
        assert_eq!(month_folder(1_710_504_000_000), "2024-03");
        // Last millisecond of January 2024
        assert_eq!(month_folder(1_706_745_599_999), "2024-01");
        assert_eq!(month_folder(0), "1970-01");
    }

    #[test]
    fn test_destination() {
        let starred = destination("Base", true, "jane.doe@example.com", 0);
        assert_eq!(
            starred.segments(),
            ["Base", STARRED_FOLDER_NAME, "jane.doe_example.com"]
        );

        let dated = destination("Base", false, "jane.doe@example.com", 1_710_504_000_000);
        assert_eq!(dated.segments(), ["Base", "2024-03"]);
    }

    #[tokio::test]
    async fn test_resolve_is_idempotent() {
        let store = MemoryStore::default();
        let mut resolver = FolderResolver::new(&store);

        let first = resolver.resolve("Base", None).await.unwrap();
        let second = resolver.resolve("Base", None).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(store.create_folder_calls(), 1);

        // A fresh resolver (next run) finds the folder instead of creating it
        let mut next_run = FolderResolver::new(&store);
        assert_eq!(next_run.resolve("Base", None).await.unwrap(), first);
        assert_eq!(store.create_folder_calls(), 1);
    }

    #[tokio::test]
    async fn test_same_name_under_different_parents() {
        let store = MemoryStore::default();
        let mut resolver = FolderResolver::new(&store);

        let a = resolver.resolve("A", None).await.unwrap();
        let b = resolver.resolve("B", None).await.unwrap();
        let under_a = resolver.resolve("2024-03", Some(&a)).await.unwrap();
        let under_b = resolver.resolve("2024-03", Some(&b)).await.unwrap();
        assert_ne!(under_a, under_b);
        assert_eq!(store.create_folder_calls(), 4);
    }

    #[tokio::test]
    async fn test_resolve_path() {
        let store = MemoryStore::default();
        let mut resolver = FolderResolver::new(&store);
        let path = destination("Base", true, "jane@example.com", 0);

        let leaf = resolver.resolve_path(&path).await.unwrap();
        assert_eq!(store.create_folder_calls(), 3);
        assert_eq!(
            store.folder_path(&leaf),
            ["Base", STARRED_FOLDER_NAME, "jane_example.com"]
        );

        assert_eq!(resolver.resolve_path(&path).await.unwrap(), leaf);
        assert_eq!(store.create_folder_calls(), 3);
    }

    #[tokio::test]
    async fn test_lookup_failure_propagates() {
        let store = MemoryStore::default();
        store.fail_folder_calls();
        let mut resolver = FolderResolver::new(&store);

        assert!(resolver.resolve("Base", None).await.is_err());
        assert_eq!(store.create_folder_calls(), 0);
    }

    proptest! {
        #[test]
        fn prop_sanitized_is_safe(address in "\\PC{0,40}") {
            let safe = sanitize_sender(&address);
            prop_assert!(!safe.is_empty());
            prop_assert!(safe.chars().all(|c| c.is_alphanumeric() || matches!(c, '_' | '.' | '-')));
            if !address.is_empty() {
                prop_assert_eq!(safe.chars().count(), address.chars().count());
            }
        }
    }
}
