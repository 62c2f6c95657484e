use futures::future::try_join_all;

use super::document::{ExportDocument, ExportRecord, SecretsPayload};
use super::error::ExchangeError;
use super::options::ExportOptions;
use super::ConnectionExchange;
use crate::services::crypto::Encrypter;
use crate::services::extjson;
use crate::services::secrets::{ExtractedSecrets, extract_secrets};
use crate::services::storage::{ConnectionInfo, ConnectionStorage};
use crate::services::telemetry::Telemetry;

impl<S: ConnectionStorage, T: Telemetry> ConnectionExchange<S, T> {
    /// Serialize the selected profiles into an export document.
    ///
    /// Secrets are kept in plaintext, removed (`remove_secrets`), or encrypted
    /// into `connectionSecrets` (`passphrase`). The store is never modified.
    pub async fn export_connections(
        &self,
        options: ExportOptions<'_>,
    ) -> Result<String, ExchangeError> {
        let ExportOptions {
            filter,
            passphrase,
            remove_secrets,
            mut tracking_props,
            kdf_iterations,
        } = options;
        let passphrase = passphrase.filter(|p| !p.is_empty());

        if passphrase.is_some() && remove_secrets {
            return Err(ExchangeError::ConflictingOptions);
        }

        let selected: Vec<ConnectionInfo> = self
            .storage
            .load_all()
            .await
            .map_err(ExchangeError::Store)?
            .into_iter()
            .filter(|info| filter(info))
            .collect();

        tracing::info!(
            has_passphrase = passphrase.is_some(),
            remove_secrets,
            count = selected.len(),
            "Exporting connections"
        );
        tracking_props.insert("count".to_string(), selected.len().into());
        self.telemetry.track("Connection Exported", tracking_props);

        let records = match passphrase {
            Some(passphrase) => {
                let encrypter = Encrypter::with_iterations(&passphrase, kdf_iterations)?;
                try_join_all(selected.iter().map(|info| encrypt_record(&encrypter, info))).await?
            }
            None if remove_secrets => selected
                .iter()
                .map(|info| ExportRecord::plain(extract_secrets(info).connection_info))
                .collect(),
            None => selected.into_iter().map(ExportRecord::plain).collect(),
        };

        Ok(ExportDocument::new(records).to_extended_json()?)
    }
}

async fn encrypt_record(
    encrypter: &Encrypter,
    info: &ConnectionInfo,
) -> Result<ExportRecord, ExchangeError> {
    let ExtractedSecrets {
        connection_info,
        secrets,
    } = extract_secrets(info);

    let plaintext = extjson::to_canonical_string(&SecretsPayload {
        secrets: Some(secrets),
    })?;
    let encrypted = encrypter.encrypt(&plaintext).await?;

    Ok(ExportRecord {
        info: connection_info,
        connection_secrets: Some(encrypted),
    })
}
