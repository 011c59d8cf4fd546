//! Sync configuration.
//!
//! Loaded once from a JSON file and passed by reference to whatever
//! needs it. Nothing reads configuration from globals.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::{Error, Result};

/// Settings for one sync run.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// OAuth scopes to request. Empty means the provider defaults.
    #[serde(default)]
    pub scopes: Vec<String>,
    /// Name of the top-level destination folder.
    pub base_folder_name: String,
    /// Only messages after this date (`YYYY/MM/DD`) are listed.
    pub after_date: String,
    /// Cap on the number of messages listed per run.
    pub max_results: u32,
    /// Path of the dedup ledger file.
    #[serde(alias = "ledger_file")]
    pub log_file: PathBuf,
    /// File extensions to skip, matched case-insensitively.
    #[serde(default)]
    pub ignored_extensions: Vec<String>,
    /// Persist the ledger after this many recorded uploads, besides at the end.
    #[serde(default)]
    pub ledger_flush_interval: Option<usize>,
    /// Google client secret downloaded from the cloud console.
    #[serde(default = "default_client_secret_file")]
    pub client_secret_file: PathBuf,
    /// Cached OAuth token.
    #[serde(default = "default_token_file")]
    pub token_file: PathBuf,
}

fn default_client_secret_file() -> PathBuf {
    PathBuf::from("client_secret.json")
}

fn default_token_file() -> PathBuf {
    PathBuf::from("token.json")
}

impl SyncConfig {
    /// Parses, normalizes and validates a JSON configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or a value is invalid.
    pub fn from_json(raw: &str) -> Result<Self> {
        let mut config: Self = serde_json::from_str(raw)?;
        config.ignored_extensions = config
            .ignored_extensions
            .iter()
            .filter_map(|ext| normalize_extension(ext))
            .collect();
        config.validate()?;
        Ok(config)
    }

    /// Reads a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is invalid.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    /// Checks value constraints.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the first offending option.
    pub fn validate(&self) -> Result<()> {
        if self.base_folder_name.trim().is_empty() {
            return Err(Error::Config("base_folder_name must not be empty".into()));
        }
        if self.after_date.trim().is_empty() {
            return Err(Error::Config("after_date must not be empty".into()));
        }
        if self.max_results == 0 {
            return Err(Error::Config("max_results must be greater than 0".into()));
        }
        if self.ledger_flush_interval == Some(0) {
            return Err(Error::Config(
                "ledger_flush_interval must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    /// Message search query: attachments only, after the configured date.
    #[must_use]
    pub fn query(&self) -> String {
        format!("has:attachment after:{}", self.after_date)
    }

    /// Whether `filename` has an ignored extension.
    #[must_use]
    pub fn is_ignored(&self, filename: &str) -> bool {
        Path::new(filename)
            .extension()
            .and_then(|ext| normalize_extension(&ext.to_string_lossy()))
            .is_some_and(|ext| self.ignored_extensions.contains(&ext))
    }
}

/// `"EXE"`, `".exe"` and `" .Exe "` all become `".exe"`.
fn normalize_extension(ext: &str) -> Option<String> {
    let bare = ext.trim().trim_start_matches('.');
    if bare.is_empty() {
        None
    } else {
        Some(format!(".{}", bare.to_lowercase()))
    }
}
