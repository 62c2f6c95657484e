//! Connection storage.
//!
//! `ConnectionStorage` is the seam the exchange reads from and writes to.
//! Two implementations live here: an in-memory store and the SQLite-backed
//! `ConnectionsRepository` handed out by `AppStore`.

mod connections;
mod notify;
mod types;

pub use connections::ConnectionsRepository;
pub use notify::{ChangeNotifier, ConnectionEvent, Subscription};
pub use types::*;

use anyhow::{Context, Result};
use async_lock::RwLock;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use crate::config::StorageConfig;

/// Source and sink of saved connection profiles
#[allow(async_fn_in_trait)]
pub trait ConnectionStorage {
    /// Load every saved profile, secrets included
    async fn load_all(&self) -> Result<Vec<ConnectionInfo>>;

    /// Insert or replace the profile with the same id
    async fn save(&self, info: &ConnectionInfo) -> Result<()>;
}

impl<S: ConnectionStorage + ?Sized> ConnectionStorage for &S {
    async fn load_all(&self) -> Result<Vec<ConnectionInfo>> {
        (**self).load_all().await
    }

    async fn save(&self, info: &ConnectionInfo) -> Result<()> {
        (**self).save(info).await
    }
}

/// Connection store kept in process memory
#[derive(Debug, Default)]
pub struct InMemoryConnectionStorage {
    connections: RwLock<Vec<ConnectionInfo>>,
    notifier: ChangeNotifier<ConnectionEvent>,
}

impl InMemoryConnectionStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_connections(connections: Vec<ConnectionInfo>) -> Self {
        Self {
            connections: RwLock::new(connections),
            notifier: ChangeNotifier::new(),
        }
    }

    pub async fn get(&self, id: &str) -> Option<ConnectionInfo> {
        self.connections
            .read()
            .await
            .iter()
            .find(|info| info.id == id)
            .cloned()
    }

    pub async fn remove(&self, id: &str) -> bool {
        let removed = {
            let mut connections = self.connections.write().await;
            let before = connections.len();
            connections.retain(|info| info.id != id);
            connections.len() != before
        };
        if removed {
            self.notifier.notify(&ConnectionEvent::Removed { id: id.to_string() });
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.connections.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.connections.read().await.is_empty()
    }

    pub fn subscribe(
        &self,
        callback: impl Fn(&ConnectionEvent) + Send + Sync + 'static,
    ) -> Subscription {
        self.notifier.subscribe(callback)
    }
}

impl ConnectionStorage for InMemoryConnectionStorage {
    async fn load_all(&self) -> Result<Vec<ConnectionInfo>> {
        Ok(self.connections.read().await.clone())
    }

    async fn save(&self, info: &ConnectionInfo) -> Result<()> {
        {
            let mut connections = self.connections.write().await;
            match connections.iter_mut().find(|existing| existing.id == info.id) {
                Some(existing) => *existing = info.clone(),
                None => connections.push(info.clone()),
            }
        }
        self.notifier.notify(&ConnectionEvent::Saved {
            id: info.id.clone(),
        });
        Ok(())
    }
}

/// Shared application storage backed by SQLite.
#[derive(Debug, Clone)]
pub struct AppStore {
    pool: SqlitePool,
    config: StorageConfig,
    notifier: Arc<ChangeNotifier<ConnectionEvent>>,
}

impl AppStore {
    /// Open (creating if needed) the database described by `config`
    pub async fn open(config: &StorageConfig) -> Result<Self> {
        let db_path = config.database_path();
        let pool = Self::connect(&db_path).await?;

        let store = Self {
            pool,
            config: config.clone(),
            notifier: Arc::new(ChangeNotifier::new()),
        };
        store.initialize_schema().await?;
        tracing::debug!(path = %db_path.display(), "Opened connection store");
        Ok(store)
    }

    async fn connect(db_path: &Path) -> Result<SqlitePool> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create data directory {}", parent.display())
            })?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", db_path.display()))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .context("Failed to open connection database")?;
        Ok(pool)
    }

    /// Get a connections repository
    pub fn connections(&self) -> ConnectionsRepository {
        ConnectionsRepository::new(
            self.pool.clone(),
            self.config.secret_backend.clone(),
            self.config.keyring_service.clone(),
            self.notifier.clone(),
        )
    }

    /// Subscribe to saves and deletes made through any repository of this store
    pub fn subscribe(
        &self,
        callback: impl Fn(&ConnectionEvent) + Send + Sync + 'static,
    ) -> Subscription {
        self.notifier.subscribe(callback)
    }

    /// Initialize the database schema
    async fn initialize_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
                CREATE TABLE IF NOT EXISTS connections (
                    id TEXT PRIMARY KEY,
                    name TEXT NOT NULL,
                    info TEXT NOT NULL,
                    secrets TEXT,
                    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
                    updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
                )
                "#,
        )
        .execute(&self.pool)
        .await?;

        // Create index on name for faster lookups
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_connections_name ON connections(name)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_in_memory_upsert_by_id() {
        smol::block_on(async {
            let store = InMemoryConnectionStorage::new();
            let mut info = ConnectionInfo::new("mongodb://localhost:27017");
            store.save(&info).await.unwrap();

            info.connection_options.connection_string = "mongodb://localhost:27018".to_string();
            store.save(&info).await.unwrap();

            let all = store.load_all().await.unwrap();
            assert_eq!(all.len(), 1);
            assert_eq!(
                all[0].connection_options.connection_string,
                "mongodb://localhost:27018"
            );
        });
    }

    #[test]
    fn test_in_memory_preserves_insertion_order() {
        smol::block_on(async {
            let store = InMemoryConnectionStorage::new();
            let a = ConnectionInfo::new("mongodb://a");
            let b = ConnectionInfo::new("mongodb://b");
            store.save(&a).await.unwrap();
            store.save(&b).await.unwrap();
            store.save(&a).await.unwrap();

            let ids: Vec<_> = store.load_all().await.unwrap().into_iter().map(|i| i.id).collect();
            assert_eq!(ids, vec![a.id, b.id]);
        });
    }

    #[test]
    fn test_in_memory_notifies_subscribers() {
        smol::block_on(async {
            let store = InMemoryConnectionStorage::new();
            let events = Arc::new(Mutex::new(Vec::new()));
            let sink = events.clone();
            let _subscription = store.subscribe(move |event| sink.lock().unwrap().push(event.clone()));

            let info = ConnectionInfo::new("mongodb://localhost");
            store.save(&info).await.unwrap();
            assert!(store.remove(&info.id).await);
            assert!(!store.remove(&info.id).await);
            assert!(store.is_empty().await);

            assert_eq!(
                *events.lock().unwrap(),
                vec![
                    ConnectionEvent::Saved {
                        id: info.id.clone()
                    },
                    ConnectionEvent::Removed { id: info.id }
                ]
            );
        });
    }
}
