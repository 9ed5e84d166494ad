use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use crate::auth::JwtKeys;
use crate::config::{AppConfig, StoreBackend};
use crate::storage::{Storage, StorageClient};
use crate::store::{MarketStore, MemoryStore, PgStore};

/// Everything a handler may touch. Built once in `main` and cloned per request.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn MarketStore>,
    pub config: Arc<AppConfig>,
    pub storage: Arc<dyn StorageClient>,
    pub jwt: JwtKeys,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let store: Arc<dyn MarketStore> = match config.store_backend {
            StoreBackend::Postgres => {
                let url = config
                    .database_url
                    .as_deref()
                    .context("DATABASE_URL is not set")?;
                let db = PgPoolOptions::new()
                    .max_connections(10)
                    .connect(url)
                    .await
                    .context("connect to database")?;
                let store = PgStore::new(db);
                sqlx::migrate!("./migrations")
                    .run(store.pool())
                    .await
                    .context("run migrations")?;
                info!("using postgres store");
                Arc::new(store)
            }
            StoreBackend::Memory => {
                info!("using in-memory store; data is lost on restart");
                Arc::new(MemoryStore::new())
            }
        };

        let storage = Arc::new(Storage::new(&config.storage).await?) as Arc<dyn StorageClient>;

        Ok(Self::from_parts(store, config, storage))
    }

    pub fn from_parts(
        store: Arc<dyn MarketStore>,
        config: Arc<AppConfig>,
        storage: Arc<dyn StorageClient>,
    ) -> Self {
        let jwt = JwtKeys::new(&config.jwt);
        Self {
            store,
            config,
            storage,
            jwt,
        }
    }

    #[cfg(test)]
    pub fn fake() -> Self {
        Self::fake_with_storage(Arc::new(crate::storage::fake::FakeStorage::new()))
    }

    #[cfg(test)]
    pub fn fake_with_storage(storage: Arc<dyn StorageClient>) -> Self {
        let config = Arc::new(AppConfig {
            host: "127.0.0.1".into(),
            port: 0,
            store_backend: StoreBackend::Memory,
            database_url: None,
            jwt: crate::config::JwtConfig {
                secret: "test".into(),
                ttl_minutes: 60,
            },
            storage: crate::config::StorageConfig {
                endpoint: "fake".into(),
                bucket: "fake".into(),
                access_key: "fake".into(),
                secret_key: "fake".into(),
                region: "us-east-1".into(),
            },
        });

        Self::from_parts(Arc::new(MemoryStore::new()), config, storage)
    }
}
