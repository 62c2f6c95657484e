use async_lock::OnceCell;
use bson::{Bson, Document};
use futures::future::try_join_all;

use super::document::{ExportDocument, SECRETS_FIELD, SecretsPayload};
use super::error::{ExchangeError, ImportError};
use super::options::ImportOptions;
use super::ConnectionExchange;
use crate::services::crypto::Decrypter;
use crate::services::extjson;
use crate::services::secrets::merge_secrets;
use crate::services::storage::{ConnectionInfo, ConnectionStorage};
use crate::services::telemetry::Telemetry;

impl<S: ConnectionStorage, T: Telemetry> ConnectionExchange<S, T> {
    /// Read an export document and save every accepted record.
    ///
    /// The whole file is validated and decrypted before the first save.
    /// Records are then saved one by one in file order; a store failure stops
    /// the loop and leaves earlier records saved.
    pub async fn import_connections(
        &self,
        payload: &str,
        options: ImportOptions<'_>,
    ) -> Result<(), ExchangeError> {
        let ImportOptions {
            filter,
            passphrase,
            mut tracking_props,
        } = options;
        let passphrase = passphrase.filter(|p| !p.is_empty());

        let entries = ExportDocument::parse_entries(payload)?;

        tracing::info!(
            has_passphrase = passphrase.is_some(),
            count = entries.len(),
            "Reading import file"
        );
        tracking_props.insert("count".to_string(), entries.len().into());
        self.telemetry.track("Connection Imported", tracking_props);

        let decrypter = OnceCell::new();
        let connections: Vec<ConnectionInfo> =
            try_join_all(entries.into_iter().enumerate().map(|(index, entry)| {
                read_entry(index, entry, passphrase.as_deref(), &decrypter)
            }))
            .await?
            .into_iter()
            .filter(|info| filter(info))
            .collect();

        tracing::info!(count = connections.len(), "Starting connection import");

        for info in &connections {
            self.storage.save(info).await.map_err(|e| {
                tracing::warn!(id = %info.id, "Failed to save imported connection");
                ExchangeError::Store(e)
            })?;
        }

        tracing::info!(count = connections.len(), "Connection import complete");
        Ok(())
    }
}

/// Turn one raw entry into a profile, decrypting its secrets if present
async fn read_entry(
    index: usize,
    mut entry: Document,
    passphrase: Option<&str>,
    decrypter: &OnceCell<Decrypter>,
) -> Result<ConnectionInfo, ExchangeError> {
    let encrypted = match entry.remove(SECRETS_FIELD) {
        None | Some(Bson::Null) => None,
        Some(Bson::String(blob)) if blob.is_empty() => None,
        Some(Bson::String(blob)) => Some(blob),
        Some(_) => return Err(ImportError::InvalidEncryptedData.into()),
    };

    let info: ConnectionInfo = bson::from_document(entry).map_err(|e| ImportError::InvalidEntry {
        index,
        source: e.into(),
    })?;

    let Some(encrypted) = encrypted else {
        return Ok(info);
    };

    let passphrase = passphrase.ok_or(ImportError::MissingPassphrase)?;
    let decrypter = decrypter
        .get_or_try_init(|| async move { Decrypter::new(passphrase) })
        .await?;

    let plaintext = decrypter.decrypt(&encrypted).await?;
    let secrets = extjson::from_str::<SecretsPayload>(&plaintext)
        .ok()
        .and_then(|payload| payload.secrets)
        .ok_or(ImportError::InvalidEncryptedData)?;

    Ok(merge_secrets(info, &secrets))
}
