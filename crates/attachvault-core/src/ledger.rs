//! Content fingerprints and the persisted dedup ledger.
//!
//! The ledger file is a JSON object mapping fingerprint hex strings to
//! `true`. It is read once when a run starts and written back once when
//! the run ends (or every N uploads when a flush interval is set).

use std::collections::BTreeMap;
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::{Error, Result};

/// SHA-256 digest of an attachment's raw bytes, as lower-case hex.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprints exactly `data`; names and metadata play no part.
    #[must_use]
    pub fn of(data: &[u8]) -> Self {
        let digest = Sha256::digest(data);
        Self(format!("{digest:x}"))
    }

    /// Hex representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Set of fingerprints that have already been transferred.
#[derive(Debug)]
pub struct DedupLedger {
    path: PathBuf,
    entries: BTreeMap<String, bool>,
    unsaved: usize,
}

impl DedupLedger {
    /// An empty ledger that will persist to `path`.
    #[must_use]
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: BTreeMap::new(),
            unsaved: 0,
        }
    }

    /// Loads the ledger stored at `path`.
    ///
    /// A missing file gives an empty ledger. An unreadable or corrupt
    /// file also gives an empty ledger, with a warning: content already
    /// uploaded may then be uploaded once more, but the run goes on.
    #[must_use]
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let mut ledger = Self::empty(path);

        let raw = match std::fs::read_to_string(&ledger.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No ledger at {}, starting empty", ledger.path.display());
                return ledger;
            }
            Err(e) => {
                warn!(
                    "Ledger {} is unreadable ({}), reinitializing",
                    ledger.path.display(),
                    e
                );
                return ledger;
            }
        };

        match serde_json::from_str::<BTreeMap<String, bool>>(&raw) {
            Ok(entries) => {
                debug!("Loaded {} ledger entries", entries.len());
                ledger.entries = entries;
            }
            Err(e) => warn!(
                "Ledger {} was empty or invalid ({}), reinitializing",
                ledger.path.display(),
                e
            ),
        }

        ledger
    }

    /// Whether this content has been transferred before.
    #[must_use]
    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.entries.contains_key(fingerprint.as_str())
    }

    /// Marks content as transferred. Nothing is written until [`persist`].
    ///
    /// Returns `false` if the fingerprint was already present.
    ///
    /// [`persist`]: Self::persist
    pub fn record(&mut self, fingerprint: Fingerprint) -> bool {
        let added = self.entries.insert(fingerprint.0, true).is_none();
        if added {
            self.unsaved += 1;
        }
        added
    }

    /// Number of recorded fingerprints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no fingerprints are recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fingerprints recorded since the last persist.
    #[must_use]
    pub const fn unsaved(&self) -> usize {
        self.unsaved
    }

    /// Location of the ledger file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes the whole ledger to its file.
    ///
    /// The content goes to a sibling temporary file first and is renamed
    /// into place, so a crash mid-write leaves the previous ledger intact.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Ledger`] if the write or the rename fails; the
    /// temporary file is removed when the rename fails.
    pub fn persist(&mut self) -> Result<()> {
        let json = serde_json::to_string(&self.entries)?;
        let failed = |source| Error::Ledger {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(failed)?;
        }

        let mut tmp_name = self.path.file_name().unwrap_or_default().to_os_string();
        tmp_name.push(".tmp");
        let tmp = self.path.with_file_name(tmp_name);

        std::fs::write(&tmp, json).map_err(failed)?;
        if let Err(e) = std::fs::rename(&tmp, &self.path) {
            if let Err(cleanup) = std::fs::remove_file(&tmp) {
                debug!("Could not remove {}: {cleanup}", tmp.display());
            }
            return Err(failed(e));
        }

        info!(
            "Saved ledger with {} entries to {}",
            self.entries.len(),
            self.path.display()
        );
        self.unsaved = 0;
        Ok(())
    }
}
