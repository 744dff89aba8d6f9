//! The credential record: salt + sealed sentinel + KDF parameters.
//!
//! One record exists per vault.  It never contains the key or the
//! passphrase; it only lets a candidate passphrase be checked by
//! re-deriving the key and opening the sentinel envelope.
//!
//! On disk it is a small JSON document:
//!
//! ```text
//! { "salt": "<base64>", "verification": "<envelope>", "kdf": { "algorithm": ... } }
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::kdf::{KdfParams, SALT_LEN};
use crate::errors::{Result, VaultError};
use crate::persist::{self, base64_decode, base64_encode};

/// Fixed plaintext sealed under the verification key.
pub const SENTINEL: &[u8] = b"PASSWORD_CORRECT";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialRecord {
    /// Salt fed to the KDF (base64 in JSON).
    #[serde(serialize_with = "base64_encode", deserialize_with = "base64_decode")]
    pub salt: Vec<u8>,

    /// AEAD envelope of [`SENTINEL`].
    pub verification: String,

    /// KDF used when this record was written.  Records from before the
    /// field existed were always PBKDF2 with the minimum round count.
    #[serde(default = "KdfParams::legacy")]
    pub kdf: KdfParams,
}

impl CredentialRecord {
    /// Read and structurally validate the record at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read(path)?;
        let record: Self = serde_json::from_slice(&contents)
            .map_err(|e| VaultError::InvalidCredential(format!("{}: {e}", path.display())))?;

        if record.salt.len() != SALT_LEN {
            return Err(VaultError::InvalidCredential(format!(
                "salt must be {SALT_LEN} bytes, got {}",
                record.salt.len()
            )));
        }

        Ok(record)
    }

    /// Replace whatever record is at `path` with this one.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_vec_pretty(self)
            .map_err(|e| VaultError::SerializationError(format!("credential: {e}")))?;
        persist::write_atomic(path, &json)
    }
}
