//! SecureVault: a local, passphrase-protected password vault engine.
//!
//! A [`VaultStore`] rooted at a data directory keeps an ordered list of
//! site/account/secret records.  Secrets are sealed one by one with
//! AES-256-GCM under a key derived from the master passphrase and are
//! only decrypted when a caller lists records.
//!
//! ```no_run
//! use securevault::{VaultStore, RecordUpdate};
//!
//! # fn main() -> securevault::Result<()> {
//! let mut store = VaultStore::open("/home/me/.securevault")?;
//! if !store.is_configured() {
//!     store.set_passphrase("correct horse battery staple")?;
//! } else if !store.unlock("correct horse battery staple")? {
//!     eprintln!("wrong passphrase");
//!     return Ok(());
//! }
//!
//! store.add_record("example.com", "me@example.com", "s3cret!", "")?;
//! for (index, record) in store.get_records("example")? {
//!     println!("{index}: {} / {}", record.site, record.account);
//! }
//! store.update_record(0, RecordUpdate::new().notes("rotated in May"))?;
//! store.lock();
//! # Ok(())
//! # }
//! ```

#[cfg(feature = "audit-log")]
pub mod audit;
pub mod config;
pub mod crypto;
pub mod errors;
pub mod generator;
pub mod persist;
pub mod vault;

pub use config::Settings;
pub use crypto::{KdfParams, KeyManager};
pub use errors::{Result, VaultError};
pub use generator::{generate_password, PasswordOptions};
pub use vault::{DecryptedRecord, RecordUpdate, SecretField, VaultState, VaultStore};
