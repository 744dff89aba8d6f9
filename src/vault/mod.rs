//! Vault module: the record collection and its lock lifecycle.
//!
//! This module provides:
//! - `Record`, `DecryptedRecord` and `RecordUpdate` types (`record`)
//! - The JSON vault file format (`format`)
//! - High-level `VaultStore` for unlocking, locking and managing records (`store`)

pub mod format;
pub mod record;
pub mod store;

pub use format::Collection;
pub use record::{DecryptedRecord, Record, RecordUpdate, SecretField};
pub use store::{VaultState, VaultStore, MIN_PASSPHRASE_LEN};
