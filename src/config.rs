//! Storage configuration.
//!
//! Defaults live under `~/.compass-connections`. Two environment variables
//! override them:
//! - `COMPASS_CONNECTIONS_HOME` - data directory
//! - `COMPASS_CONNECTIONS_SECRETS` - `keyring` or `database`

use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

pub const HOME_ENV: &str = "COMPASS_CONNECTIONS_HOME";
pub const SECRETS_ENV: &str = "COMPASS_CONNECTIONS_SECRETS";

const DEFAULT_DIR_NAME: &str = ".compass-connections";
const DATABASE_FILE_NAME: &str = "connections.db";
const DEFAULT_KEYRING_SERVICE: &str = "compass-connections";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not find home directory")]
    NoHomeDir,
    #[error("unknown secret backend '{0}' (expected 'keyring' or 'database')")]
    UnknownSecretBackend(String),
}

/// Where connection secrets are persisted
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SecretBackend {
    /// System keyring, one entry per connection id
    #[default]
    Keyring,
    /// Inline in the SQLite database next to the public record
    Database,
}

impl FromStr for SecretBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "keyring" => Ok(SecretBackend::Keyring),
            "database" | "db" => Ok(SecretBackend::Database),
            other => Err(ConfigError::UnknownSecretBackend(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub keyring_service: String,
    pub secret_backend: SecretBackend,
}

impl StorageConfig {
    /// Configuration rooted at `data_dir` with default settings
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            keyring_service: DEFAULT_KEYRING_SERVICE.to_string(),
            secret_backend: SecretBackend::default(),
        }
    }

    /// Defaults plus environment overrides
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let data_dir = match lookup(HOME_ENV).filter(|dir| !dir.is_empty()) {
            Some(dir) => PathBuf::from(dir),
            None => dirs::home_dir()
                .ok_or(ConfigError::NoHomeDir)?
                .join(DEFAULT_DIR_NAME),
        };

        let mut config = Self::new(data_dir);
        if let Some(backend) = lookup(SECRETS_ENV).filter(|b| !b.is_empty()) {
            config.secret_backend = backend.parse()?;
        }
        Ok(config)
    }

    pub fn with_secret_backend(mut self, backend: SecretBackend) -> Self {
        self.secret_backend = backend;
        self
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(DATABASE_FILE_NAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_env_overrides() {
        let config = StorageConfig::from_lookup(lookup(&[
            (HOME_ENV, "/tmp/compass-test"),
            (SECRETS_ENV, "Database"),
        ]))
        .unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/tmp/compass-test"));
        assert_eq!(
            config.database_path(),
            PathBuf::from("/tmp/compass-test/connections.db")
        );
        assert_eq!(config.secret_backend, SecretBackend::Database);
        assert_eq!(config.keyring_service, "compass-connections");
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let result = StorageConfig::from_lookup(lookup(&[
            (HOME_ENV, "/tmp/compass-test"),
            (SECRETS_ENV, "vault"),
        ]));
        assert!(matches!(
            result,
            Err(ConfigError::UnknownSecretBackend(name)) if name == "vault"
        ));
    }

    #[test]
    fn test_defaults_use_keyring() {
        let config = StorageConfig::new("/data");
        assert_eq!(config.secret_backend, SecretBackend::Keyring);
        assert_eq!(
            config.with_secret_backend(SecretBackend::Database).secret_backend,
            SecretBackend::Database
        );
    }
}
