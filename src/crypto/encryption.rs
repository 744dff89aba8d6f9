//! AES-256-GCM authenticated encryption.
//!
//! Each call to `encrypt` generates a fresh random 12-byte nonce and
//! prepends it to the ciphertext.  `decrypt` splits the nonce back out
//! before decrypting.
//!
//! Layout of the returned byte buffer:
//!   [ 12-byte nonce | ciphertext + 16-byte auth tag ]
//!
//! `seal` / `open` wrap the same layout in standard base64 so the
//! envelope can live inside a JSON string.

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::errors::{Result, VaultError};

/// Size of the AES-256-GCM nonce in bytes.
pub const NONCE_LEN: usize = 12;

/// Size of the GCM authentication tag in bytes.
pub const TAG_LEN: usize = 16;

/// Encrypt `plaintext` with a 32-byte `key`.
///
/// Returns the nonce prepended to the ciphertext (nonce || ciphertext).
pub fn encrypt(key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| VaultError::EncryptionFailed(format!("invalid key length: {e}")))?;

    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|e| VaultError::EncryptionFailed(format!("encryption error: {e}")))?;

    let mut output = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    output.extend_from_slice(&nonce);
    output.extend_from_slice(&ciphertext);
    Ok(output)
}

/// Decrypt data that was produced by `encrypt`.
///
/// Any failure (short input, wrong key, flipped bit) is reported as
/// `DecryptionFailed` and never as garbage plaintext.
pub fn decrypt(key: &[u8], ciphertext_with_nonce: &[u8]) -> Result<Vec<u8>> {
    if ciphertext_with_nonce.len() < NONCE_LEN + TAG_LEN {
        return Err(VaultError::DecryptionFailed);
    }

    let (nonce_bytes, ciphertext) = ciphertext_with_nonce.split_at(NONCE_LEN);
    let nonce = Nonce::from_slice(nonce_bytes);

    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| VaultError::DecryptionFailed)?;

    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| VaultError::DecryptionFailed)
}

/// Encrypt and encode as a base64 envelope string.
pub fn seal(key: &[u8], plaintext: &[u8]) -> Result<String> {
    Ok(BASE64.encode(encrypt(key, plaintext)?))
}

/// Decode a base64 envelope string and decrypt it.
///
/// A malformed envelope is indistinguishable from a tampered one.
pub fn open(key: &[u8], envelope: &str) -> Result<Vec<u8>> {
    let raw = BASE64
        .decode(envelope.trim())
        .map_err(|_| VaultError::DecryptionFailed)?;
    decrypt(key, &raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_open_roundtrip() {
        let key = [0x5Au8; 32];
        let envelope = seal(&key, b"hunter2").unwrap();
        assert_eq!(open(&key, &envelope).unwrap(), b"hunter2");
    }

    #[test]
    fn envelope_is_nonce_plus_tag_longer_than_plaintext() {
        let key = [0x01u8; 32];
        let raw = encrypt(&key, b"abc").unwrap();
        assert_eq!(raw.len(), NONCE_LEN + 3 + TAG_LEN);
    }

    #[test]
    fn open_rejects_non_base64() {
        let key = [0x01u8; 32];
        assert!(matches!(
            open(&key, "%%% not base64 %%%"),
            Err(VaultError::DecryptionFailed)
        ));
    }

    #[test]
    fn decrypt_rejects_input_shorter_than_nonce_and_tag() {
        let key = [0x01u8; 32];
        assert!(matches!(
            decrypt(&key, &[0u8; NONCE_LEN + TAG_LEN - 1]),
            Err(VaultError::DecryptionFailed)
        ));
    }
}
