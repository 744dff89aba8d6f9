use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::crypto::kdf::KdfParams;
use crate::errors::{Result, VaultError};

/// Vault configuration, loaded from `<data_dir>/.securevault.toml`.
///
/// Every field has a sensible default so SecureVault works out-of-the-box
/// without any config file at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// File name of the credential record (salt + sealed sentinel).
    #[serde(default = "default_credential_file")]
    pub credential_file: String,

    /// File name of the encrypted record collection.
    #[serde(default = "default_vault_file")]
    pub vault_file: String,

    /// KDF used when a passphrase is set or changed.  Existing vaults
    /// keep the parameters recorded in their credential file.
    #[serde(default)]
    pub kdf: KdfParams,

    /// Record vault operations in `<data_dir>/audit.db`.
    #[serde(default = "default_audit_log")]
    pub audit_log: bool,
}

// ── Serde default helpers ────────────────────────────────────────────

fn default_credential_file() -> String {
    "master_password.json".to_string()
}

fn default_vault_file() -> String {
    "passwords.json".to_string()
}

fn default_audit_log() -> bool {
    true
}

// ── Implementation ───────────────────────────────────────────────────

impl Default for Settings {
    fn default() -> Self {
        Self {
            credential_file: default_credential_file(),
            vault_file: default_vault_file(),
            kdf: KdfParams::default(),
            audit_log: default_audit_log(),
        }
    }
}

impl Settings {
    /// Name of the config file we look for in the data directory.
    pub const FILE_NAME: &'static str = ".securevault.toml";

    /// Load settings from `<data_dir>/.securevault.toml`.
    ///
    /// If the file does not exist, sensible defaults are returned.
    /// If the file exists but cannot be parsed, an error is returned.
    pub fn load(data_dir: &Path) -> Result<Self> {
        let config_path = data_dir.join(Self::FILE_NAME);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path)?;

        let settings: Settings = toml::from_str(&contents).map_err(|e| {
            VaultError::ConfigError(format!("Failed to parse {}: {e}", config_path.display()))
        })?;

        settings.kdf.validate().map_err(|e| {
            VaultError::ConfigError(format!("{}: {e}", config_path.display()))
        })?;

        Ok(settings)
    }

    /// Example: `data_dir/master_password.json`
    pub fn credential_path(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(&self.credential_file)
    }

    /// Example: `data_dir/passwords.json`
    pub fn vault_path(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(&self.vault_file)
    }
}

// ── Tests ────────────────────────────────────────────────────────────
