use thiserror::Error;

use crate::services::crypto::EnvelopeError;
use crate::services::extjson::ExtJsonError;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The import file is not something we can read
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Could not parse connections list: {source}")]
    Parse {
        #[source]
        source: BoxError,
    },
    #[error("Input is in unrecognized format (expected Compass import file)")]
    UnrecognizedFormat,
    #[error("Input is in unrecognized format (expected version {expected}, got {found})")]
    UnsupportedVersion { expected: i32, found: String },
    #[error("Input does not contain a list of connections")]
    MissingConnections,
    #[error("Connection entry {index} is invalid: {source}")]
    InvalidEntry {
        index: usize,
        #[source]
        source: BoxError,
    },
    #[error("Input file contains encrypted secrets but no passphrase was provided")]
    MissingPassphrase,
    #[error("Input file contained invalid encrypted data")]
    InvalidEncryptedData,
}

impl ImportError {
    pub(crate) fn parse(source: impl Into<BoxError>) -> Self {
        ImportError::Parse {
            source: source.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("Cannot both specify to remove secrets and provide a passphrase for encrypting secrets")]
    ConflictingOptions,
    #[error(transparent)]
    Import(#[from] ImportError),
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),
    #[error(transparent)]
    Store(anyhow::Error),
    #[error("Failed to serialize connections: {0}")]
    Serialize(#[from] ExtJsonError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExchangeError {
    /// True for every failure caused by the content of an import file
    pub fn is_import_error(&self) -> bool {
        matches!(self, ExchangeError::Import(_))
    }
}
