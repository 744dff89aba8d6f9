//! Cryptographic primitives for SecureVault.
//!
//! This module provides:
//! - AES-256-GCM envelopes (`encryption`)
//! - PBKDF2 / Argon2id passphrase key derivation (`kdf`)
//! - HKDF sub-keys and the zeroizing master key (`keys`)
//! - The on-disk credential record (`credential`)
//! - `KeyManager`, which ties them into a lock/unlock session (`manager`)

pub mod credential;
pub mod encryption;
pub mod kdf;
pub mod keys;
pub mod manager;

pub use credential::CredentialRecord;
pub use encryption::{decrypt, encrypt, open, seal};
pub use kdf::{derive_key, generate_salt, KdfParams};
pub use keys::MasterKey;
pub use manager::{KeyManager, PendingCredential};
