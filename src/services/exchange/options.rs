use serde_json::Value;

use crate::services::crypto::DEFAULT_KDF_ITERATIONS;
use crate::services::storage::ConnectionInfo;
use crate::services::telemetry::TrackingProps;

/// Predicate choosing which profiles take part
pub type ConnectionFilter<'a> = Box<dyn Fn(&ConnectionInfo) -> bool + 'a>;

/// Settings for one export.
///
/// By default only favorites are exported and secrets stay in plaintext.
pub struct ExportOptions<'a> {
    pub filter: ConnectionFilter<'a>,
    /// Encrypt secrets with this passphrase; empty counts as none
    pub passphrase: Option<String>,
    /// Drop secrets instead of exporting them
    pub remove_secrets: bool,
    pub tracking_props: TrackingProps,
    /// PBKDF2 rounds for the encryption key
    pub kdf_iterations: u32,
}

impl Default for ExportOptions<'_> {
    fn default() -> Self {
        Self {
            filter: Box::new(ConnectionInfo::is_favorite),
            passphrase: None,
            remove_secrets: false,
            tracking_props: TrackingProps::new(),
            kdf_iterations: DEFAULT_KDF_ITERATIONS,
        }
    }
}

impl<'a> ExportOptions<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Export every profile, not only favorites
    pub fn all_connections(self) -> Self {
        self.filter(|_| true)
    }

    pub fn filter(mut self, filter: impl Fn(&ConnectionInfo) -> bool + 'a) -> Self {
        self.filter = Box::new(filter);
        self
    }

    pub fn passphrase(mut self, passphrase: impl Into<String>) -> Self {
        self.passphrase = Some(passphrase.into());
        self
    }

    pub fn remove_secrets(mut self) -> Self {
        self.remove_secrets = true;
        self
    }

    pub fn tracking_prop(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.tracking_props.insert(key.into(), value.into());
        self
    }

    pub fn kdf_iterations(mut self, iterations: u32) -> Self {
        self.kdf_iterations = iterations;
        self
    }
}

/// Settings for one import.
///
/// By default every record in the file is saved.
pub struct ImportOptions<'a> {
    pub filter: ConnectionFilter<'a>,
    pub passphrase: Option<String>,
    pub tracking_props: TrackingProps,
}

impl Default for ImportOptions<'_> {
    fn default() -> Self {
        Self {
            filter: Box::new(|_: &ConnectionInfo| true),
            passphrase: None,
            tracking_props: TrackingProps::new(),
        }
    }
}

impl<'a> ImportOptions<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: impl Fn(&ConnectionInfo) -> bool + 'a) -> Self {
        self.filter = Box::new(filter);
        self
    }

    pub fn passphrase(mut self, passphrase: impl Into<String>) -> Self {
        self.passphrase = Some(passphrase.into());
        self
    }

    pub fn tracking_prop(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.tracking_props.insert(key.into(), value.into());
        self
    }
}
