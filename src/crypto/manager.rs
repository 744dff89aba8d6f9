//! `KeyManager`: passphrase lifecycle and field-level encryption.
//!
//! Owns the path to the credential record and, while unlocked, the
//! records sub-key.  Nothing derived from the passphrase is ever
//! written to disk; the session key lives only in this struct and is
//! zeroed when cleared or dropped.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use subtle::ConstantTimeEq;
use tracing::{debug, warn};
use zeroize::{Zeroize, Zeroizing};

use super::credential::{CredentialRecord, SENTINEL};
use super::encryption::{open, seal};
use super::kdf::{derive_key, generate_salt, KdfParams};
use super::keys::SubKey;
use crate::errors::{Result, VaultError};

pub struct KeyManager {
    credential_path: PathBuf,

    /// Parameters used when a new credential record is written.
    kdf: KdfParams,

    /// Records key for the current session (`None` while locked).
    session: Option<SubKey>,
}

impl KeyManager {
    pub fn new(credential_path: impl Into<PathBuf>, kdf: KdfParams) -> Self {
        Self {
            credential_path: credential_path.into(),
            kdf,
            session: None,
        }
    }

    /// True iff a credential record exists on disk.
    pub fn is_configured(&self) -> bool {
        self.credential_path.exists()
    }

    pub fn is_unlocked(&self) -> bool {
        self.session.is_some()
    }

    pub fn credential_path(&self) -> &Path {
        &self.credential_path
    }

    pub fn kdf_params(&self) -> &KdfParams {
        &self.kdf
    }

    /// Create (or fully replace) the credential record for `passphrase`.
    ///
    /// A fresh salt is drawn every time, so re-running this with the same
    /// passphrase still produces a different record.  On success the new
    /// key becomes the session key.
    pub fn set_passphrase(&mut self, passphrase: &str) -> Result<()> {
        let pending = self.prepare_passphrase(passphrase)?;
        self.install(pending)
    }

    /// Derive a credential record and records key for `passphrase`
    /// without touching the disk or the current session.
    pub fn prepare_passphrase(&self, passphrase: &str) -> Result<PendingCredential> {
        let salt = generate_salt()?;
        let master = derive_key(passphrase.as_bytes(), &salt, &self.kdf)?;

        let verification_key = master.verification_key()?;
        let record = CredentialRecord {
            salt: salt.to_vec(),
            verification: seal(&verification_key[..], SENTINEL)?,
            kdf: self.kdf,
        };

        Ok(PendingCredential {
            record,
            key: master.records_key()?,
        })
    }

    /// Write a prepared credential record and adopt its key.
    ///
    /// The record is written atomically; if that fails the previous record
    /// and session are left as they were.
    pub fn install(&mut self, pending: PendingCredential) -> Result<()> {
        pending.record.save(&self.credential_path)?;
        self.session = Some(pending.key);
        debug!(path = %self.credential_path.display(), "credential record written");
        Ok(())
    }

    /// Remove the credential record and end the session.
    pub fn discard_credential(&mut self) -> Result<()> {
        self.session = None;
        match fs::remove_file(&self.credential_path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Check `passphrase` against the stored credential record.
    ///
    /// Fails closed: a missing, unreadable or malformed record yields
    /// `false`, as does any decryption failure.  On success the derived
    /// key becomes the session key; on failure the session is untouched.
    pub fn verify_passphrase(&mut self, passphrase: &str) -> bool {
        match self.try_verify(passphrase) {
            Ok(Some(key)) => {
                self.session = Some(key);
                true
            }
            Ok(None) => false,
            Err(e) => {
                warn!(error = %e, "passphrase verification failed closed");
                false
            }
        }
    }

    fn try_verify(&self, passphrase: &str) -> Result<Option<SubKey>> {
        if !self.is_configured() {
            return Ok(None);
        }

        let record = CredentialRecord::load(&self.credential_path)?;
        let master = derive_key(passphrase.as_bytes(), &record.salt, &record.kdf)?;
        let verification_key = master.verification_key()?;

        let Ok(plaintext) = open(&verification_key[..], &record.verification) else {
            return Ok(None);
        };
        let plaintext = Zeroizing::new(plaintext);

        if bool::from(plaintext.as_slice().ct_eq(SENTINEL)) {
            Ok(Some(master.records_key()?))
        } else {
            Ok(None)
        }
    }

    /// Seal `plaintext` under the session key.
    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        let key = self.session.as_ref().ok_or(VaultError::NotUnlocked)?;
        seal(&key[..], plaintext.as_bytes())
    }

    /// Open an envelope produced by [`KeyManager::encrypt`].
    ///
    /// Tampering, a foreign key, a malformed envelope and non-UTF-8
    /// plaintext all surface as `DecryptionFailed`.
    pub fn decrypt(&self, envelope: &str) -> Result<Zeroizing<String>> {
        let key = self.session.as_ref().ok_or(VaultError::NotUnlocked)?;
        let bytes = open(&key[..], envelope)?;

        String::from_utf8(bytes).map(Zeroizing::new).map_err(|e| {
            let mut bad_bytes = e.into_bytes();
            bad_bytes.zeroize();
            VaultError::DecryptionFailed
        })
    }

    /// Discard the session key.
    pub fn clear_session(&mut self) {
        self.session = None;
    }
}

/// A credential record and its records key that are not on disk yet.
///
/// Lets a caller re-encrypt data under the new key before committing to
/// the new passphrase.
pub struct PendingCredential {
    record: CredentialRecord,
    key: SubKey,
}

impl PendingCredential {
    /// Seal `plaintext` under the pending records key.
    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        seal(&self.key[..], plaintext.as_bytes())
    }
}
