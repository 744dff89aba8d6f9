//! High-level vault operations used by the presentation layer.
//!
//! `VaultStore` owns the record collection and the lock state machine:
//!
//! ```text
//! Uninitialized --set_passphrase--> Unlocked
//! Locked        --unlock(ok)------> Unlocked
//! Locked        --unlock(wrong)---> Locked
//! Unlocked      --lock------------> Locked
//! ```
//!
//! All key material lives in the [`KeyManager`]; the store only ever
//! asks it to seal or open individual secrets.  Every mutating call
//! writes the whole collection before it returns, and the in-memory
//! collection is only replaced once that write succeeded.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::config::Settings;
use crate::crypto::credential::CredentialRecord;
use crate::crypto::manager::KeyManager;
use crate::errors::{Result, VaultError};

use super::format::{self, Collection, VaultLoad};
use super::record::{DecryptedRecord, Record, RecordUpdate, SecretField};

#[cfg(feature = "audit-log")]
use crate::audit::{AuditEntry, AuditEvent, AuditLog};

/// Minimum master passphrase length, in characters.
pub const MIN_PASSPHRASE_LEN: usize = 8;

/// Where the store is in its lock lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VaultState {
    /// No credential record exists yet.
    Uninitialized,
    /// Credential record exists, no session key.
    Locked,
    /// Session key held and collection loaded.
    Unlocked,
}

/// The main vault handle.
pub struct VaultStore {
    data_dir: PathBuf,

    /// Path to the vault JSON file.
    vault_path: PathBuf,

    keys: KeyManager,

    /// `Some` exactly while unlocked; dropped wholesale on lock.
    collection: Option<Collection>,

    #[cfg(feature = "audit-log")]
    audit: Option<AuditLog>,

    #[cfg(feature = "audit-log")]
    audit_enabled: bool,
}

impl VaultStore {
    // ------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------

    /// Open the vault rooted at `data_dir`, reading `.securevault.toml`
    /// if present.  The store starts locked (or uninitialized).
    pub fn open(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.into();
        let settings = Settings::load(&data_dir)?;
        Ok(Self::with_settings(data_dir, &settings))
    }

    /// Build a store from explicit settings without touching the config file.
    pub fn with_settings(data_dir: impl Into<PathBuf>, settings: &Settings) -> Self {
        let data_dir = data_dir.into();

        #[cfg(feature = "audit-log")]
        let audit = if settings.audit_log && data_dir.is_dir() {
            AuditLog::open(&data_dir)
        } else {
            None
        };

        Self {
            vault_path: settings.vault_path(&data_dir),
            keys: KeyManager::new(settings.credential_path(&data_dir), settings.kdf),
            data_dir,
            collection: None,
            #[cfg(feature = "audit-log")]
            audit,
            #[cfg(feature = "audit-log")]
            audit_enabled: settings.audit_log,
        }
    }

    // ------------------------------------------------------------------
    // Lock lifecycle
    // ------------------------------------------------------------------

    pub fn state(&self) -> VaultState {
        if self.is_unlocked() {
            VaultState::Unlocked
        } else if self.keys.is_configured() {
            VaultState::Locked
        } else {
            VaultState::Uninitialized
        }
    }

    /// True iff a master passphrase has been set for this data directory.
    pub fn is_configured(&self) -> bool {
        self.keys.is_configured()
    }

    pub fn is_unlocked(&self) -> bool {
        self.collection.is_some() && self.keys.is_unlocked()
    }

    /// Set the master passphrase of a new vault and unlock it.
    ///
    /// Writes the credential record, then an empty vault file.  If the
    /// vault file can't be written the credential record is removed
    /// again, so a failed call leaves the store uninitialized.
    pub fn set_passphrase(&mut self, passphrase: &str) -> Result<()> {
        check_strength(passphrase)?;
        if self.keys.is_configured() {
            return Err(VaultError::AlreadyConfigured);
        }

        self.keys.set_passphrase(passphrase)?;

        let collection = Collection::empty();
        if let Err(e) = format::write_vault(&self.vault_path, &collection) {
            if let Err(cleanup) = self.keys.discard_credential() {
                warn!(error = %cleanup, "could not remove credential record after failed setup");
            }
            return Err(e);
        }
        self.collection = Some(collection);

        self.reopen_audit();
        info!(dir = %self.data_dir.display(), "vault initialized");
        self.audit(Event::Init, None, None, None);
        Ok(())
    }

    /// Try to unlock with `passphrase`.
    ///
    /// `Ok(false)` means the passphrase is wrong (or no vault is
    /// configured); the store stays locked.  `Err` is reserved for
    /// structural failures such as an unreadable vault file.
    pub fn unlock(&mut self, passphrase: &str) -> Result<bool> {
        if !self.keys.verify_passphrase(passphrase) {
            debug!("unlock rejected");
            self.audit(Event::UnlockFailed, None, None, None);
            return Ok(false);
        }

        match self.load_collection() {
            Ok(collection) => {
                info!(entries = collection.entries.len(), "vault unlocked");
                self.collection = Some(collection);
                self.audit(Event::Unlock, None, None, None);
                Ok(true)
            }
            Err(e) => {
                self.keys.clear_session();
                self.collection = None;
                Err(e)
            }
        }
    }

    /// Drop the collection and the session key.  Nothing is written:
    /// the file already matches memory.
    pub fn lock(&mut self) {
        let was_unlocked = self.is_unlocked();
        self.collection = None;
        self.keys.clear_session();
        if was_unlocked {
            info!("vault locked");
            self.audit(Event::Lock, None, None, None);
        }
    }

    /// Replace the master passphrase, re-encrypting every secret.
    ///
    /// Returns `Ok(false)` if `current` is wrong.  Every secret is
    /// decrypted before anything is written, so one unreadable record
    /// aborts the change with `DecryptionFailed` and leaves both files
    /// untouched.
    ///
    /// The re-encrypted collection is staged next to the vault file
    /// (`<vault>.rekey`) before the new credential record is written, and
    /// only then moved into place.  If that move fails the previous
    /// credential record is written back.  If even that fails the error
    /// is `RekeyInterrupted`, the store locks, and the next `unlock` with
    /// the new passphrase completes the change from the staged file.
    pub fn change_passphrase(&mut self, current: &str, new: &str) -> Result<bool> {
        self.require_unlocked()?;
        check_strength(new)?;

        if !self.keys.verify_passphrase(current) {
            self.audit(Event::ChangePassphrase, None, None, Some("rejected"));
            return Ok(false);
        }

        let plaintexts = self
            .entries()?
            .iter()
            .map(|r| self.keys.decrypt(&r.secret_ciphertext))
            .collect::<Result<Vec<Zeroizing<String>>>>()?;

        let previous = CredentialRecord::load(self.keys.credential_path())?;
        let pending = self.keys.prepare_passphrase(new)?;

        let mut entries = self.entries()?.to_vec();
        for (record, secret) in entries.iter_mut().zip(&plaintexts) {
            record.secret_ciphertext = pending.encrypt(secret)?;
        }
        let collection = Collection {
            entries,
            last_modified: Utc::now(),
        };

        let staged = format::staging_path(&self.vault_path);
        format::write_vault(&staged, &collection)?;

        if let Err(e) = self.keys.install(pending) {
            discard_staged(&staged);
            return Err(e);
        }

        if let Err(e) = fs::rename(&staged, &self.vault_path) {
            warn!(error = %e, "could not replace vault file, restoring previous credential");
            return Err(self.roll_back_credential(&previous, current, &staged, e.into()));
        }

        self.collection = Some(collection);
        info!("master passphrase changed");
        self.audit(Event::ChangePassphrase, None, None, None);
        Ok(true)
    }

    /// Put `previous` back after a passphrase change failed to replace the
    /// vault file, which still holds secrets sealed under the old key.
    fn roll_back_credential(
        &mut self,
        previous: &CredentialRecord,
        current: &str,
        staged: &Path,
        cause: VaultError,
    ) -> VaultError {
        match previous.save(self.keys.credential_path()) {
            Ok(()) => {
                discard_staged(staged);
                if !self.keys.verify_passphrase(current) {
                    self.lock();
                }
                cause
            }
            Err(restore) => {
                // New credential + staged file still match each other.
                warn!(error = %restore, staged = %staged.display(), "previous credential not restored");
                self.lock();
                VaultError::RekeyInterrupted {
                    cause: cause.to_string(),
                    restore: restore.to_string(),
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Record operations
    // ------------------------------------------------------------------

    /// Append a new record.
    ///
    /// Rejected with `Duplicate` when a record with the same site
    /// (ignoring case) and account already exists.
    pub fn add_record(&mut self, site: &str, account: &str, secret: &str, notes: &str) -> Result<()> {
        self.require_unlocked()?;

        let site = required("site", site)?;
        let account = required("account", account)?;
        if secret.is_empty() {
            return Err(VaultError::MissingField("secret"));
        }

        if self.entries()?.iter().any(|r| r.same_identity(site, account)) {
            return Err(VaultError::Duplicate {
                site: site.to_string(),
                account: account.to_string(),
            });
        }

        let now = Utc::now();
        let record = Record {
            site: site.to_string(),
            account: account.to_string(),
            secret_ciphertext: self.keys.encrypt(secret)?,
            notes: notes.to_string(),
            created_at: now,
            modified_at: now,
        };

        let mut entries = self.entries()?.to_vec();
        entries.push(record);
        self.commit(entries)?;

        debug!(site, account, "record added");
        self.audit(Event::Add, Some(site), Some(account), None);
        Ok(())
    }

    /// Apply a partial update to the record at `index`.
    ///
    /// Only fields set in `update` change; a new secret is re-encrypted.
    /// `modified_at` is refreshed even for an empty update.
    pub fn update_record(&mut self, index: usize, update: RecordUpdate) -> Result<()> {
        self.require_unlocked()?;

        let mut entries = self.entries()?.to_vec();
        let len = entries.len();
        let record = entries
            .get_mut(index)
            .ok_or(VaultError::IndexOutOfRange { index, len })?;

        let mut changed = Vec::new();
        if let Some(site) = &update.site {
            record.site = required("site", site)?.to_string();
            changed.push("site");
        }
        if let Some(account) = &update.account {
            record.account = required("account", account)?.to_string();
            changed.push("account");
        }
        if let Some(secret) = &update.secret {
            if secret.is_empty() {
                return Err(VaultError::MissingField("secret"));
            }
            record.secret_ciphertext = self.keys.encrypt(secret)?;
            changed.push("secret");
        }
        if let Some(notes) = update.notes {
            record.notes = notes;
            changed.push("notes");
        }
        record.modified_at = Utc::now();

        let (site, account) = (record.site.clone(), record.account.clone());
        self.commit(entries)?;

        debug!(index, site = %site, "record updated");
        self.audit(
            Event::Update,
            Some(&site),
            Some(&account),
            Some(&changed.join(",")),
        );
        Ok(())
    }

    /// Remove the record at `index`.  Later records shift down by one,
    /// so indices from an earlier listing must not be reused.
    pub fn delete_record(&mut self, index: usize) -> Result<()> {
        self.require_unlocked()?;

        let mut entries = self.entries()?.to_vec();
        if index >= entries.len() {
            return Err(VaultError::IndexOutOfRange {
                index,
                len: entries.len(),
            });
        }
        let removed = entries.remove(index);
        self.commit(entries)?;

        debug!(index, site = %removed.site, "record deleted");
        self.audit(Event::Delete, Some(&removed.site), Some(&removed.account), None);
        Ok(())
    }

    /// List records with their secrets decrypted.
    ///
    /// An empty `search_term` returns everything; otherwise only records
    /// whose site, account or notes contain it (ignoring case).  Order and
    /// indices are those of the full collection.  A record that fails to
    /// decrypt is returned with `SecretField::Failed`.
    pub fn get_records(&self, search_term: &str) -> Result<Vec<(usize, DecryptedRecord)>> {
        self.require_unlocked()?;

        let needle = search_term.to_lowercase();
        let records = self
            .entries()?
            .iter()
            .enumerate()
            .filter(|(_, r)| needle.is_empty() || r.matches(&needle))
            .map(|(i, r)| (i, self.decrypt_record(r)))
            .collect();

        Ok(records)
    }

    fn decrypt_record(&self, record: &Record) -> DecryptedRecord {
        let secret = match self.keys.decrypt(&record.secret_ciphertext) {
            Ok(plaintext) => SecretField::Plaintext(plaintext),
            Err(e) => {
                warn!(site = %record.site, error = %e, "record secret could not be decrypted");
                SecretField::Failed
            }
        };

        DecryptedRecord {
            site: record.site.clone(),
            account: record.account.clone(),
            secret,
            notes: record.notes.clone(),
            created_at: record.created_at,
            modified_at: record.modified_at,
        }
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn vault_path(&self) -> &Path {
        &self.vault_path
    }

    pub fn credential_path(&self) -> &Path {
        self.keys.credential_path()
    }

    /// Number of records (0 while locked).
    pub fn len(&self) -> usize {
        self.collection.as_ref().map_or(0, |c| c.entries.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Timestamp of the last successful write, while unlocked.
    pub fn last_modified(&self) -> Option<DateTime<Utc>> {
        self.collection.as_ref().map(|c| c.last_modified)
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    fn load_collection(&mut self) -> Result<Collection> {
        self.settle_staged()?;

        match format::read_vault(&self.vault_path)? {
            VaultLoad::Loaded(collection) => Ok(collection),
            VaultLoad::Missing => {
                debug!(path = %self.vault_path.display(), "no vault file, starting empty");
                let collection = Collection::empty();
                format::write_vault(&self.vault_path, &collection)?;
                Ok(collection)
            }
            VaultLoad::Corrupt(reason) => {
                warn!(path = %self.vault_path.display(), %reason, "vault file is corrupt, starting empty");
                let details = match format::quarantine(&self.vault_path) {
                    Ok(moved) => format!("moved to {}", moved.display()),
                    Err(e) => {
                        warn!(error = %e, "could not move corrupt vault file aside");
                        format!("left in place: {e}")
                    }
                };
                self.audit(Event::Recover, None, None, Some(&details));
                Ok(Collection::empty())
            }
        }
    }

    /// Deal with a `<vault>.rekey` file left by an interrupted passphrase
    /// change.  Runs with the session key of the credential on disk.
    ///
    /// The staged collection replaces the vault file when it is newer
    /// and opens under the session key; the new credential record was
    /// written but the final rename never happened.  Otherwise it belongs
    /// to a change that was rolled back and is removed.
    fn settle_staged(&mut self) -> Result<()> {
        let staged = format::staging_path(&self.vault_path);
        if !staged.exists() {
            return Ok(());
        }

        let staged_collection = match format::read_vault(&staged)? {
            VaultLoad::Loaded(collection) => collection,
            VaultLoad::Missing | VaultLoad::Corrupt(_) => {
                discard_staged(&staged);
                return Ok(());
            }
        };

        let newer = match format::read_vault(&self.vault_path)? {
            VaultLoad::Loaded(current) => staged_collection.last_modified > current.last_modified,
            VaultLoad::Missing | VaultLoad::Corrupt(_) => true,
        };
        let opens = staged_collection
            .entries
            .first()
            .map_or(true, |r| self.keys.decrypt(&r.secret_ciphertext).is_ok());

        if newer && opens {
            fs::rename(&staged, &self.vault_path)?;
            info!("completed interrupted passphrase change");
            self.audit(
                Event::Recover,
                None,
                None,
                Some("completed interrupted passphrase change"),
            );
        } else {
            debug!(path = %staged.display(), "removing stale staged vault");
            discard_staged(&staged);
        }
        Ok(())
    }

    /// Write `entries` to disk, then adopt them as the in-memory state.
    fn commit(&mut self, entries: Vec<Record>) -> Result<()> {
        let collection = Collection {
            entries,
            last_modified: Utc::now(),
        };
        format::write_vault(&self.vault_path, &collection)?;
        self.collection = Some(collection);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn require_unlocked(&self) -> Result<()> {
        if self.is_unlocked() {
            Ok(())
        } else {
            Err(VaultError::Locked)
        }
    }

    fn entries(&self) -> Result<&[Record]> {
        self.collection
            .as_ref()
            .map(|c| c.entries.as_slice())
            .ok_or(VaultError::Locked)
    }

    /// The data directory may only come into existence with the first
    /// write, after `with_settings` gave up on opening the audit log.
    #[cfg(feature = "audit-log")]
    fn reopen_audit(&mut self) {
        if self.audit_enabled && self.audit.is_none() {
            self.audit = AuditLog::open(&self.data_dir);
        }
    }

    #[cfg(not(feature = "audit-log"))]
    fn reopen_audit(&mut self) {}

    #[cfg(feature = "audit-log")]
    fn audit(&self, event: Event, site: Option<&str>, account: Option<&str>, details: Option<&str>) {
        if let Some(audit) = &self.audit {
            audit.record(event, site, account, details);
        }
    }

    #[cfg(not(feature = "audit-log"))]
    fn audit(&self, _event: Event, _site: Option<&str>, _account: Option<&str>, _details: Option<&str>) {}

    /// Audit log entries, newest first, optionally only those at or after
    /// `since`.  Empty when audit logging is off.
    #[cfg(feature = "audit-log")]
    pub fn audit_entries(&self, limit: usize, since: Option<DateTime<Utc>>) -> Result<Vec<AuditEntry>> {
        match &self.audit {
            Some(audit) => audit.entries(limit, since),
            None => Ok(Vec::new()),
        }
    }

    /// Drop audit entries recorded before `cutoff`, including the site and
    /// account names of deleted records.  Returns how many were removed.
    #[cfg(feature = "audit-log")]
    pub fn prune_audit(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        match &self.audit {
            Some(audit) => audit.prune(cutoff),
            None => Ok(0),
        }
    }
}

#[cfg(feature = "audit-log")]
type Event = AuditEvent;

/// Stand-in so call sites read the same with the audit log compiled out.
#[cfg(not(feature = "audit-log"))]
#[derive(Clone, Copy)]
enum Event {
    Init,
    Unlock,
    UnlockFailed,
    Lock,
    Add,
    Update,
    Delete,
    ChangePassphrase,
    Recover,
}

fn discard_staged(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        warn!(path = %path.display(), error = %e, "could not remove staged vault file");
    }
}

fn check_strength(passphrase: &str) -> Result<()> {
    if passphrase.chars().count() < MIN_PASSPHRASE_LEN {
        return Err(VaultError::WeakPassphrase {
            min: MIN_PASSPHRASE_LEN,
        });
    }
    Ok(())
}

fn required<'a>(field: &'static str, value: &'a str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(VaultError::MissingField(field))
    } else {
        Ok(trimmed)
    }
}
