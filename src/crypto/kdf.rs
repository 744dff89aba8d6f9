//! Passphrase-based key derivation.
//!
//! Two algorithms are supported:
//! - **PBKDF2-HMAC-SHA256** (default), deliberately slow but memory-light.
//! - **Argon2id**, memory-hard, for hosts that can afford the RAM.
//!
//! The chosen parameters are stored next to the salt in the credential
//! record so an existing vault always re-derives with what it was
//! created with, whatever the current settings say.

use argon2::{Algorithm, Argon2, Params, Version};
use hmac::Hmac;
use rand::TryRngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use super::keys::{MasterKey, KEY_LEN};
use crate::errors::{Result, VaultError};

/// Length of the salt in bytes (128 bits).
pub const SALT_LEN: usize = 16;

/// Floor for PBKDF2 rounds; anything below is refused.
pub const MIN_PBKDF2_ITERATIONS: u32 = 100_000;

/// Default PBKDF2 rounds for newly created credentials.
pub const DEFAULT_PBKDF2_ITERATIONS: u32 = 600_000;

/// Minimum safe Argon2 memory cost in KiB (8 MB).
pub const MIN_ARGON2_MEMORY_KIB: u32 = 8_192;

/// Key-derivation algorithm and its cost parameters.
///
/// Serialized as an internally tagged table, e.g.
/// `{ algorithm = "pbkdf2-sha256", iterations = 600000 }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all = "kebab-case")]
pub enum KdfParams {
    Pbkdf2Sha256 {
        iterations: u32,
    },
    Argon2id {
        /// Memory cost in KiB.
        memory_kib: u32,
        iterations: u32,
        /// Parallelism lanes.
        parallelism: u32,
    },
}

impl Default for KdfParams {
    fn default() -> Self {
        Self::Pbkdf2Sha256 {
            iterations: DEFAULT_PBKDF2_ITERATIONS,
        }
    }
}

impl KdfParams {
    /// Parameters assumed for credential records written before the
    /// KDF was recorded alongside the salt.
    pub fn legacy() -> Self {
        Self::Pbkdf2Sha256 {
            iterations: MIN_PBKDF2_ITERATIONS,
        }
    }

    /// Reject parameters weaker than the enforced floors.
    pub fn validate(&self) -> Result<()> {
        match *self {
            Self::Pbkdf2Sha256 { iterations } => {
                if iterations < MIN_PBKDF2_ITERATIONS {
                    return Err(VaultError::KeyDerivationFailed(format!(
                        "PBKDF2 iterations must be at least {MIN_PBKDF2_ITERATIONS} (got {iterations})"
                    )));
                }
            }
            Self::Argon2id {
                memory_kib,
                iterations,
                parallelism,
            } => {
                if memory_kib < MIN_ARGON2_MEMORY_KIB {
                    return Err(VaultError::KeyDerivationFailed(format!(
                        "Argon2 memory_kib must be at least {MIN_ARGON2_MEMORY_KIB} (got {memory_kib})"
                    )));
                }
                if iterations < 1 {
                    return Err(VaultError::KeyDerivationFailed(
                        "Argon2 iterations must be at least 1".into(),
                    ));
                }
                if parallelism < 1 {
                    return Err(VaultError::KeyDerivationFailed(
                        "Argon2 parallelism must be at least 1".into(),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Derive a 256-bit master key from a passphrase and salt.
///
/// The same passphrase + salt + params will always produce the same key.
pub fn derive_key(passphrase: &[u8], salt: &[u8], params: &KdfParams) -> Result<MasterKey> {
    params.validate()?;

    let mut key = MasterKey::zeroed();
    match *params {
        KdfParams::Pbkdf2Sha256 { iterations } => {
            pbkdf2::pbkdf2::<Hmac<Sha256>>(passphrase, salt, iterations, key.as_mut_bytes())
                .map_err(|e| VaultError::KeyDerivationFailed(format!("PBKDF2 failed: {e}")))?;
        }
        KdfParams::Argon2id {
            memory_kib,
            iterations,
            parallelism,
        } => {
            let argon2_params = Params::new(memory_kib, iterations, parallelism, Some(KEY_LEN))
                .map_err(|e| {
                    VaultError::KeyDerivationFailed(format!("invalid Argon2 params: {e}"))
                })?;
            Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params)
                .hash_password_into(passphrase, salt, key.as_mut_bytes())
                .map_err(|e| {
                    VaultError::KeyDerivationFailed(format!("Argon2id hashing failed: {e}"))
                })?;
        }
    }

    Ok(key)
}

/// Generate a random 16-byte salt from the operating system RNG.
pub fn generate_salt() -> Result<[u8; SALT_LEN]> {
    let mut salt = [0u8; SALT_LEN];
    rand::rngs::OsRng
        .try_fill_bytes(&mut salt)
        .map_err(|e| VaultError::KeyDerivationFailed(format!("OS random source failed: {e}")))?;
    Ok(salt)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FAST_PBKDF2: KdfParams = KdfParams::Pbkdf2Sha256 {
        iterations: MIN_PBKDF2_ITERATIONS,
    };

    #[test]
    fn pbkdf2_is_deterministic() {
        let a = derive_key(b"passphrase", b"0123456789abcdef", &FAST_PBKDF2).unwrap();
        let b = derive_key(b"passphrase", b"0123456789abcdef", &FAST_PBKDF2).unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn pbkdf2_salt_changes_key() {
        let a = derive_key(b"passphrase", b"0123456789abcdef", &FAST_PBKDF2).unwrap();
        let b = derive_key(b"passphrase", b"fedcba9876543210", &FAST_PBKDF2).unwrap();
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn argon2id_is_deterministic() {
        let params = KdfParams::Argon2id {
            memory_kib: MIN_ARGON2_MEMORY_KIB,
            iterations: 1,
            parallelism: 1,
        };
        let a = derive_key(b"passphrase", b"0123456789abcdef", &params).unwrap();
        let b = derive_key(b"passphrase", b"0123456789abcdef", &params).unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn algorithms_produce_different_keys() {
        let argon = KdfParams::Argon2id {
            memory_kib: MIN_ARGON2_MEMORY_KIB,
            iterations: 1,
            parallelism: 1,
        };
        let a = derive_key(b"passphrase", b"0123456789abcdef", &FAST_PBKDF2).unwrap();
        let b = derive_key(b"passphrase", b"0123456789abcdef", &argon).unwrap();
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn weak_pbkdf2_iterations_are_rejected() {
        let weak = KdfParams::Pbkdf2Sha256 { iterations: 1_000 };
        assert!(matches!(
            derive_key(b"pw", b"salt", &weak),
            Err(VaultError::KeyDerivationFailed(_))
        ));
    }

    #[test]
    fn weak_argon2_memory_is_rejected() {
        let weak = KdfParams::Argon2id {
            memory_kib: 1_024,
            iterations: 3,
            parallelism: 4,
        };
        assert!(weak.validate().is_err());
    }

    #[test]
    fn salts_are_unique() {
        let a = generate_salt().unwrap();
        let b = generate_salt().unwrap();
        assert_eq!(a.len(), SALT_LEN);
        assert_ne!(a, b);
    }

    #[test]
    fn params_serialize_as_tagged_table() {
        let json = serde_json::to_string(&KdfParams::default()).unwrap();
        assert_eq!(json, r#"{"algorithm":"pbkdf2-sha256","iterations":600000}"#);

        let parsed: KdfParams =
            serde_json::from_str(r#"{"algorithm":"argon2id","memory_kib":65536,"iterations":3,"parallelism":4}"#)
                .unwrap();
        assert_eq!(
            parsed,
            KdfParams::Argon2id {
                memory_kib: 65_536,
                iterations: 3,
                parallelism: 4
            }
        );
    }
}
