//! Master key container and HKDF-SHA256 sub-key derivation.
//!
//! From the passphrase-derived master key we expand two independent
//! sub-keys:
//! - a **verification** key that seals the sentinel in the credential record;
//! - a **records** key that seals every stored secret.
//!
//! HKDF (RFC 5869) uses the master key as input keying material (IKM)
//! and a context string (`info`) to produce each sub-key.

use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::errors::{Result, VaultError};

/// Length of the master key and all sub-keys (256 bits).
pub const KEY_LEN: usize = 32;

const VERIFICATION_INFO: &[u8] = b"securevault-verification-key";
const RECORDS_INFO: &[u8] = b"securevault-records-key";

/// A 256-bit sub-key, zeroed when dropped.
pub type SubKey = Zeroizing<[u8; KEY_LEN]>;

/// Derive the key that seals the credential sentinel.
pub fn derive_verification_key(master_key: &[u8]) -> Result<SubKey> {
    hkdf_derive(master_key, VERIFICATION_INFO)
}

/// Derive the key that seals record secrets.
pub fn derive_records_key(master_key: &[u8]) -> Result<SubKey> {
    hkdf_derive(master_key, RECORDS_INFO)
}

fn hkdf_derive(ikm: &[u8], info: &[u8]) -> Result<SubKey> {
    // No HKDF salt: the passphrase salt is already folded into the IKM.
    let hk = Hkdf::<Sha256>::new(None, ikm);

    let mut okm = Zeroizing::new([0u8; KEY_LEN]);
    hk.expand(info, &mut okm[..])
        .map_err(|e| VaultError::KeyDerivationFailed(format!("HKDF expand failed: {e}")))?;

    Ok(okm)
}

/// A wrapper around the 32-byte passphrase-derived key that zeroes its
/// memory when dropped.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct MasterKey {
    bytes: [u8; KEY_LEN],
}

impl MasterKey {
    pub fn new(bytes: [u8; KEY_LEN]) -> Self {
        Self { bytes }
    }

    pub(crate) fn zeroed() -> Self {
        Self {
            bytes: [0u8; KEY_LEN],
        }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }

    pub(crate) fn as_mut_bytes(&mut self) -> &mut [u8; KEY_LEN] {
        &mut self.bytes
    }

    pub fn verification_key(&self) -> Result<SubKey> {
        derive_verification_key(&self.bytes)
    }

    pub fn records_key(&self) -> Result<SubKey> {
        derive_records_key(&self.bytes)
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MasterKey(..)")
    }
}
