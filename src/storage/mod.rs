//! Storage implementations for different backends

#[cfg(feature = "in-memory")]
pub mod in_memory;
#[cfg(any(feature = "mysql", feature = "sqlite"))]
pub mod sql;

pub use crate::core::error::StoreError;
#[cfg(feature = "in-memory")]
pub use in_memory::InMemoryStore;
#[cfg(feature = "mysql")]
pub use sql::MysqlStore;
#[cfg(feature = "sqlite")]
pub use sql::SqliteStore;

use crate::config::{StoreBackend, StoreConfig};
use crate::core::repository::Repository;
use crate::resources::{Arena, Game, Player, Statistic, Team};
use anyhow::{Result, anyhow};
use std::sync::Arc;

/// A store holding every resource table
pub trait Store:
    Repository<Team>
    + Repository<Game>
    + Repository<Arena>
    + Repository<Player>
    + Repository<Statistic>
{
}

impl<S> Store for S where
    S: Repository<Team>
        + Repository<Game>
        + Repository<Arena>
        + Repository<Player>
        + Repository<Statistic>
{
}

/// Open the configured backend, creating the schema for SQL backends
pub async fn open_store(config: &StoreConfig) -> Result<Arc<dyn Store>> {
    match config.backend {
        #[cfg(feature = "in-memory")]
        StoreBackend::InMemory => {
            tracing::info!("using in-memory store");
            Ok(Arc::new(InMemoryStore::new()))
        }
        #[cfg(feature = "mysql")]
        StoreBackend::Mysql => {
            let url = config
                .url
                .as_deref()
                .ok_or_else(|| anyhow!("store.url is required for the mysql backend"))?;
            let store = MysqlStore::connect(url, config.max_connections).await?;
            sql::mysql::ensure_schema(store.pool()).await?;
            tracing::info!(max_connections = config.max_connections, "connected to MySQL");
            Ok(Arc::new(store))
        }
        #[cfg(feature = "sqlite")]
        StoreBackend::Sqlite => {
            let url = config
                .url
                .as_deref()
                .ok_or_else(|| anyhow!("store.url is required for the sqlite backend"))?;
            let store = SqliteStore::connect(url, config.max_connections).await?;
            sql::sqlite::ensure_schema(store.pool()).await?;
            tracing::info!(url, "opened SQLite database");
            Ok(Arc::new(store))
        }
        #[allow(unreachable_patterns)]
        other => Err(anyhow!(
            "store backend '{}' is not compiled into this build",
            other.name()
        )),
    }
}
