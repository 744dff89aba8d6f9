//! Record types: the stored (sealed) form, the decrypted view handed to
//! callers, and partial updates.
//!
//! A `Record` only ever holds the secret as an AEAD envelope.  Plaintext
//! exists solely inside a `DecryptedRecord`, which is built on demand
//! and zeroes its secret when dropped.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

/// A single stored entry, exactly as persisted in the vault file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub site: String,
    pub account: String,

    /// AEAD envelope of the secret (see `crypto::encryption::seal`).
    pub secret_ciphertext: String,

    #[serde(default)]
    pub notes: String,

    /// Never changes after the record is added.
    pub created_at: DateTime<Utc>,

    /// Refreshed on every field mutation.
    pub modified_at: DateTime<Utc>,
}

impl Record {
    /// Duplicate detection key: site compared case-insensitively,
    /// account compared exactly.
    pub fn same_identity(&self, site: &str, account: &str) -> bool {
        self.site.to_lowercase() == site.to_lowercase() && self.account == account
    }

    /// Case-insensitive substring match on site, account or notes.
    /// `needle` must already be lowercase.
    pub(crate) fn matches(&self, needle: &str) -> bool {
        self.site.to_lowercase().contains(needle)
            || self.account.to_lowercase().contains(needle)
            || self.notes.to_lowercase().contains(needle)
    }
}

/// Outcome of decrypting one record's secret.
///
/// A record whose envelope fails authentication is reported as
/// `Failed` instead of aborting the whole listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretField {
    Plaintext(Zeroizing<String>),
    Failed,
}

impl SecretField {
    pub fn as_plaintext(&self) -> Option<&str> {
        match self {
            Self::Plaintext(s) => Some(s.as_str()),
            Self::Failed => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed)
    }
}

/// A record with its secret freshly decrypted, as returned by
/// `VaultStore::get_records`.
#[derive(Debug, Clone)]
pub struct DecryptedRecord {
    pub site: String,
    pub account: String,
    pub secret: SecretField,
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

/// A partial update: `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct RecordUpdate {
    pub site: Option<String>,
    pub account: Option<String>,
    pub secret: Option<Zeroizing<String>>,
    pub notes: Option<String>,
}

impl RecordUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn site(mut self, site: impl Into<String>) -> Self {
        self.site = Some(site.into());
        self
    }

    pub fn account(mut self, account: impl Into<String>) -> Self {
        self.account = Some(account.into());
        self
    }

    pub fn secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(Zeroizing::new(secret.into()));
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.site.is_none() && self.account.is_none() && self.secret.is_none() && self.notes.is_none()
    }
}
