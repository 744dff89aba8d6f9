use thiserror::Error;

/// All errors that can occur in SecureVault.
///
/// A wrong passphrase is not an error: verification reports it as a
/// plain `false`.
#[derive(Debug, Error)]
pub enum VaultError {
    // --- State errors ---
    #[error("Vault is locked — unlock it with the master passphrase first")]
    Locked,

    #[error("No session key — the key manager has not been unlocked")]
    NotUnlocked,

    #[error("A master passphrase is already configured (use change_passphrase)")]
    AlreadyConfigured,

    // --- Validation errors ---
    #[error("Master passphrase must be at least {min} characters long")]
    WeakPassphrase { min: usize },

    #[error("Field '{0}' is required and cannot be empty")]
    MissingField(&'static str),

    #[error("An entry for '{site}' with account '{account}' already exists")]
    Duplicate { site: String, account: String },

    #[error("Entry index {index} is out of range (vault holds {len} entries)")]
    IndexOutOfRange { index: usize, len: usize },

    // --- Crypto errors ---
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed — wrong key or corrupted data")]
    DecryptionFailed,

    #[error("Key derivation failed: {0}")]
    KeyDerivationFailed(String),

    #[error("Invalid credential record: {0}")]
    InvalidCredential(String),

    #[error(
        "Passphrase change interrupted ({cause}) and the previous credential could not be \
         restored ({restore}); unlock with the new passphrase to complete it"
    )]
    RekeyInterrupted { cause: String, restore: String },

    // --- IO errors ---
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // --- Serialization errors ---
    #[error("Serialization error: {0}")]
    SerializationError(String),

    // --- Config errors ---
    #[error("Config file error: {0}")]
    ConfigError(String),

    #[error("Audit error: {0}")]
    AuditError(String),
}

/// Convenience type alias for SecureVault results.
pub type Result<T> = std::result::Result<T, VaultError>;
