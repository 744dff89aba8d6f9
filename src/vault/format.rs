//! Vault file format.
//!
//! The collection is stored as one pretty-printed JSON document:
//!
//! ```text
//! {
//!   "entries": [
//!     { "site", "account", "secret_ciphertext", "notes", "created_at", "modified_at" },
//!     ...
//!   ],
//!   "last_modified": "2024-05-01T12:00:00Z"
//! }
//! ```
//!
//! Only secrets are encrypted; site, account and notes are plain text so
//! the file stays diffable.  Every write replaces the whole file.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::record::Record;
use crate::errors::{Result, VaultError};
use crate::persist;

/// Suffix appended to a vault file that could not be parsed.
pub const QUARANTINE_SUFFIX: &str = "corrupt";

/// Suffix of the re-encrypted collection written during a passphrase
/// change, before it replaces the vault file.
pub const STAGING_SUFFIX: &str = "rekey";

/// The ordered record collection plus its modification stamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    #[serde(default)]
    pub entries: Vec<Record>,
    pub last_modified: DateTime<Utc>,
}

impl Collection {
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
            last_modified: Utc::now(),
        }
    }
}

/// Result of reading the vault file.
#[derive(Debug)]
pub enum VaultLoad {
    /// No vault file yet.
    Missing,
    Loaded(Collection),
    /// The file exists but is not a valid collection.
    Corrupt(String),
}

/// Read the vault file at `path`.
///
/// A missing or unparsable file is an expected outcome and reported
/// through [`VaultLoad`]; only real I/O failures are errors.
pub fn read_vault(path: &Path) -> Result<VaultLoad> {
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(VaultLoad::Missing),
        Err(e) => return Err(e.into()),
    };

    Ok(match serde_json::from_slice::<Collection>(&data) {
        Ok(collection) => VaultLoad::Loaded(collection),
        Err(e) => VaultLoad::Corrupt(e.to_string()),
    })
}

/// Serialize `collection` and write it to `path` atomically.
pub fn write_vault(path: &Path, collection: &Collection) -> Result<()> {
    let json = serde_json::to_vec_pretty(collection)
        .map_err(|e| VaultError::SerializationError(format!("vault: {e}")))?;
    persist::write_atomic(path, &json)
}

/// Move an unreadable vault file aside so a fresh one can take its place.
///
/// Returns the path the file was moved to (`<path>.corrupt`).  An older
/// quarantined copy is overwritten.
pub fn quarantine(path: &Path) -> Result<PathBuf> {
    let target = sibling(path, QUARANTINE_SUFFIX);
    fs::rename(path, &target)?;
    Ok(target)
}

/// Where a re-encrypted collection is staged for the vault at `path`.
pub fn staging_path(path: &Path) -> PathBuf {
    sibling(path, STAGING_SUFFIX)
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(format!(".{suffix}"));
    path.with_file_name(name)
}
