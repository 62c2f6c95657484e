//! Connection repository using SQLite and system keyring.

use anyhow::{Context, Result};
use keyring::Entry;
use sqlx::SqlitePool;
use std::sync::Arc;

use super::notify::{ChangeNotifier, ConnectionEvent, Subscription};
use super::types::{ConnectionInfo, ConnectionSecrets};
use super::ConnectionStorage;
use crate::config::SecretBackend;
use crate::services::extjson;
use crate::services::secrets::{ExtractedSecrets, extract_secrets, merge_secrets};

/// Repository for connection CRUD operations.
///
/// The public part of each profile is stored in SQLite as canonical extended
/// JSON. Secrets go to the system keyring or, with `SecretBackend::Database`,
/// into the `secrets` column of the same row.
#[derive(Debug, Clone)]
pub struct ConnectionsRepository {
    pool: SqlitePool,
    secret_backend: SecretBackend,
    keyring_service: String,
    notifier: Arc<ChangeNotifier<ConnectionEvent>>,
}

impl ConnectionsRepository {
    pub(crate) fn new(
        pool: SqlitePool,
        secret_backend: SecretBackend,
        keyring_service: String,
        notifier: Arc<ChangeNotifier<ConnectionEvent>>,
    ) -> Self {
        Self {
            pool,
            secret_backend,
            keyring_service,
            notifier,
        }
    }

    // ========== Keyring Methods ==========

    fn get_keyring_entry(&self, connection_id: &str) -> Result<Entry> {
        Entry::new(&self.keyring_service, connection_id).context("Failed to create keyring entry")
    }

    fn store_keyring_secrets(&self, connection_id: &str, secrets: &ConnectionSecrets) -> Result<()> {
        let entry = self.get_keyring_entry(connection_id)?;
        if secrets.is_empty() {
            // Ignore errors if nothing was stored before
            let _ = entry.delete_credential();
            return Ok(());
        }
        let payload = serde_json::to_string(secrets)?;
        entry
            .set_password(&payload)
            .context("Failed to store secrets in keyring")
    }

    fn load_keyring_secrets(&self, connection_id: &str) -> Result<ConnectionSecrets> {
        let entry = self.get_keyring_entry(connection_id)?;
        match entry.get_password() {
            Ok(payload) => {
                serde_json::from_str(&payload).context("Invalid secrets payload in keyring")
            }
            Err(keyring::Error::NoEntry) => Ok(ConnectionSecrets::default()),
            Err(e) => Err(e).context("Failed to retrieve secrets from keyring"),
        }
    }

    fn delete_keyring_secrets(&self, connection_id: &str) -> Result<()> {
        let entry = self.get_keyring_entry(connection_id)?;
        let _ = entry.delete_credential();
        Ok(())
    }

    // ========== CRUD Methods ==========

    /// Load all saved connections with their secrets
    pub async fn load_all(&self) -> Result<Vec<ConnectionInfo>> {
        let rows = sqlx::query_as::<_, (String, String, Option<String>)>(
            "SELECT id, info, secrets FROM connections ORDER BY rowid",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(id, info, secrets)| self.decode_row(&id, &info, secrets.as_deref(), true))
            .collect()
    }

    /// Load all saved connections without touching the keyring.
    ///
    /// Keyring reads can prompt the user, so listings skip secrets and callers
    /// load them on demand.
    pub async fn list(&self) -> Result<Vec<ConnectionInfo>> {
        let rows = sqlx::query_as::<_, (String, String)>(
            "SELECT id, info FROM connections ORDER BY rowid",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(id, info)| self.decode_row(&id, &info, None, false))
            .collect()
    }

    /// Get a single connection by ID
    pub async fn get(&self, id: &str) -> Result<Option<ConnectionInfo>> {
        let row = sqlx::query_as::<_, (String, String, Option<String>)>(
            "SELECT id, info, secrets FROM connections WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|(id, info, secrets)| self.decode_row(&id, &info, secrets.as_deref(), true))
            .transpose()
    }

    /// Insert or update a connection
    pub async fn save(&self, connection: &ConnectionInfo) -> Result<()> {
        let ExtractedSecrets {
            connection_info,
            secrets,
        } = extract_secrets(connection);

        let info = extjson::to_canonical_string(&connection_info)
            .context("Failed to encode connection")?;

        let inline_secrets = match self.secret_backend {
            SecretBackend::Keyring => {
                self.store_keyring_secrets(&connection.id, &secrets)?;
                None
            }
            SecretBackend::Database if secrets.is_empty() => None,
            SecretBackend::Database => Some(serde_json::to_string(&secrets)?),
        };

        sqlx::query(
            r#"
            INSERT INTO connections (id, name, info, secrets, updated_at)
            VALUES (?1, ?2, ?3, ?4, CURRENT_TIMESTAMP)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                info = excluded.info,
                secrets = excluded.secrets,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(&connection.id)
        .bind(connection.display_name())
        .bind(info)
        .bind(inline_secrets)
        .execute(&self.pool)
        .await?;

        self.notifier.notify(&ConnectionEvent::Saved {
            id: connection.id.clone(),
        });
        Ok(())
    }

    /// Delete a connection by ID
    pub async fn delete(&self, id: &str) -> Result<()> {
        if self.secret_backend == SecretBackend::Keyring {
            self.delete_keyring_secrets(id)?;
        }
        sqlx::query("DELETE FROM connections WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        self.notifier.notify(&ConnectionEvent::Removed { id: id.to_string() });
        Ok(())
    }

    pub fn subscribe(
        &self,
        callback: impl Fn(&ConnectionEvent) + Send + Sync + 'static,
    ) -> Subscription {
        self.notifier.subscribe(callback)
    }

    // ========== Private Helpers ==========

    fn decode_row(
        &self,
        id: &str,
        info: &str,
        inline_secrets: Option<&str>,
        with_secrets: bool,
    ) -> Result<ConnectionInfo> {
        let public: ConnectionInfo = extjson::from_str(info)
            .with_context(|| format!("Invalid connection record '{}' in database", id))?;

        if !with_secrets {
            return Ok(public);
        }

        let secrets = match (&self.secret_backend, inline_secrets) {
            (SecretBackend::Keyring, _) => self.load_keyring_secrets(id)?,
            (SecretBackend::Database, Some(payload)) => serde_json::from_str(payload)
                .with_context(|| format!("Invalid secrets for connection '{}'", id))?,
            (SecretBackend::Database, None) => ConnectionSecrets::default(),
        };

        Ok(merge_secrets(public, &secrets))
    }
}

impl ConnectionStorage for ConnectionsRepository {
    async fn load_all(&self) -> Result<Vec<ConnectionInfo>> {
        ConnectionsRepository::load_all(self).await
    }

    async fn save(&self, info: &ConnectionInfo) -> Result<()> {
        ConnectionsRepository::save(self, info).await
    }
}
