//! Export and import of saved connections.
//!
//! This module provides:
//! - `ConnectionExchange` - Runs exports and imports against a store
//! - `ExportOptions` / `ImportOptions` - Per-call settings
//! - `ExportDocument` - The versioned file format
//! - `ExchangeError` / `ImportError` - What can go wrong

mod document;
mod error;
mod export;
mod import;
mod options;


pub use document::{
    CURRENT_VERSION, ExportDocument, ExportRecord, FILE_TYPE, SECRETS_FIELD, SecretsPayload,
};
pub use error::{ExchangeError, ImportError};
pub use options::{ConnectionFilter, ExportOptions, ImportOptions};

use std::path::Path;

use super::storage::ConnectionStorage;
use super::telemetry::{Telemetry, TracingTelemetry};

/// Export/import service over an injected store and telemetry sink
pub struct ConnectionExchange<S, T = TracingTelemetry> {
    storage: S,
    telemetry: T,
}

impl<S: ConnectionStorage> ConnectionExchange<S> {
    /// Service that reports telemetry through `tracing`
    pub fn with_storage(storage: S) -> Self {
        Self::new(storage, TracingTelemetry)
    }
}

impl<S: ConnectionStorage, T: Telemetry> ConnectionExchange<S, T> {
    pub fn new(storage: S, telemetry: T) -> Self {
        Self { storage, telemetry }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Export to `path`, overwriting it
    pub async fn export_to_file(
        &self,
        path: impl AsRef<Path>,
        options: ExportOptions<'_>,
    ) -> Result<(), ExchangeError> {
        let text = self.export_connections(options).await?;
        async_fs::write(path.as_ref(), text).await?;
        Ok(())
    }

    /// Import the export file at `path`
    pub async fn import_from_file(
        &self,
        path: impl AsRef<Path>,
        options: ImportOptions<'_>,
    ) -> Result<(), ExchangeError> {
        let text = async_fs::read_to_string(path.as_ref()).await?;
        self.import_connections(&text, options).await
    }
}
