//! Vault configuration from environment variables.
//!
//! ```bash
//! # Optional; backends fall back to their default location when unset
//! KEYRACK_DATABASE_URL=sqlite:///var/lib/keyrack/store.db
//!
//! # Required: the passphrase the vault master key is derived from
//! KEYRACK_MASTER_PASSPHRASE=...
//!
//! # Required: hex-encoded KDF salt, at least 16 bytes
//! KEYRACK_KDF_SALT=00112233445566778899aabbccddeeff
//! ```

use keyrack_crypto::{KdfError, MasterKey};
use thiserror::Error;

const MIN_SALT_LEN: usize = 16;

/// Vault configuration
#[derive(Clone, Debug)]
pub struct VaultConfig {
    pub database_url: Option<String>,
    pub master_passphrase: String,
    pub kdf_salt: Vec<u8>,
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("KEYRACK_MASTER_PASSPHRASE is not set")]
    MissingPassphrase,

    #[error("KEYRACK_KDF_SALT is not set")]
    MissingSalt,

    #[error("KEYRACK_KDF_SALT is not valid hex: {0}")]
    InvalidSalt(#[from] hex::FromHexError),

    #[error("KEYRACK_KDF_SALT must be at least {MIN_SALT_LEN} bytes, got {0}")]
    SaltTooShort(usize),
}

impl VaultConfig {
    /// Read configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Read configuration through a lookup function. Lets tests supply
    /// variables without touching process-global state.
    pub fn from_env_with<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let master_passphrase = lookup("KEYRACK_MASTER_PASSPHRASE")
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::MissingPassphrase)?;

        let salt_hex = lookup("KEYRACK_KDF_SALT")
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::MissingSalt)?;
        let kdf_salt = hex::decode(salt_hex)?;
        if kdf_salt.len() < MIN_SALT_LEN {
            return Err(ConfigError::SaltTooShort(kdf_salt.len()));
        }

        Ok(Self {
            database_url: lookup("KEYRACK_DATABASE_URL").filter(|v| !v.is_empty()),
            master_passphrase,
            kdf_salt,
        })
    }

    /// Derive the vault master key. Done once at startup; the derived key is
    /// what services hold, never the passphrase.
    pub fn derive_master_key(&self) -> Result<MasterKey, KdfError> {
        keyrack_crypto::derive_master_key(&self.master_passphrase, &self.kdf_salt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn from(map: &HashMap<String, String>) -> Result<VaultConfig, ConfigError> {
        VaultConfig::from_env_with(|key| map.get(key).cloned())
    }

    #[test]
    fn full_configuration_parses() {
        let map = vars(&[
            ("KEYRACK_DATABASE_URL", "sqlite::memory:"),
            ("KEYRACK_MASTER_PASSPHRASE", "correct horse"),
            ("KEYRACK_KDF_SALT", "00112233445566778899aabbccddeeff"),
        ]);
        let config = from(&map).unwrap();
        assert_eq!(config.database_url.as_deref(), Some("sqlite::memory:"));
        assert_eq!(config.master_passphrase, "correct horse");
        assert_eq!(config.kdf_salt.len(), 16);
    }

    #[test]
    fn database_url_is_optional() {
        let map = vars(&[
            ("KEYRACK_MASTER_PASSPHRASE", "correct horse"),
            ("KEYRACK_KDF_SALT", "00112233445566778899aabbccddeeff"),
        ]);
        let config = from(&map).unwrap();
        assert!(config.database_url.is_none());
    }

    #[test]
    fn missing_passphrase_is_an_error() {
        let map = vars(&[("KEYRACK_KDF_SALT", "00112233445566778899aabbccddeeff")]);
        assert!(matches!(from(&map), Err(ConfigError::MissingPassphrase)));
    }

    #[test]
    fn empty_passphrase_is_an_error() {
        let map = vars(&[
            ("KEYRACK_MASTER_PASSPHRASE", ""),
            ("KEYRACK_KDF_SALT", "00112233445566778899aabbccddeeff"),
        ]);
        assert!(matches!(from(&map), Err(ConfigError::MissingPassphrase)));
    }

    #[test]
    fn short_salt_is_an_error() {
        let map = vars(&[
            ("KEYRACK_MASTER_PASSPHRASE", "correct horse"),
            ("KEYRACK_KDF_SALT", "0011223344"),
        ]);
        assert!(matches!(from(&map), Err(ConfigError::SaltTooShort(5))));
    }

    #[test]
    fn non_hex_salt_is_an_error() {
        let map = vars(&[
            ("KEYRACK_MASTER_PASSPHRASE", "correct horse"),
            ("KEYRACK_KDF_SALT", "not-hex-at-all!!"),
        ]);
        assert!(matches!(from(&map), Err(ConfigError::InvalidSalt(_))));
    }
}
