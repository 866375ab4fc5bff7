//! Data storage layer
//!
//! Provides the storage backends for captured telemetry:
//! - `sqlite` - Embedded default backend
//! - `postgres` - Shared backend for multi-process deployments
//! - `types` - Payloads handed over by the capture layer and stored rows
//! - `traits` - Repository trait both backends implement
//! - `sql` - SQL dialect abstraction for multi-database support
//! - `fingerprint` - SQL normalization and query digests
//! - `error` - Unified error type for all backends

pub mod error;
pub mod fingerprint;
pub mod postgres;
pub mod sql;
pub mod sqlite;
pub mod traits;
pub mod types;

pub use postgres::PostgresService;
pub use sqlite::SqliteService;

pub use error::DataError;
pub use fingerprint::{Fingerprint, normalize_sql};
pub use traits::TelemetryRepository;

use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::core::config::{DatabaseBackend, DatabaseConfig};
use crate::core::constants::SQLITE_DB_FILENAME;
use crate::core::storage::{AppStorage, DataSubdir};
use sql::Backend;

/// Storage service enum
///
/// Wraps the backend-specific service selected once from configuration.
/// Services are stored as Arc so the repository handle and background tasks
/// can share them.
pub enum StorageService {
    /// SQLite backend (default, embedded)
    Sqlite(Arc<SqliteService>),
    /// PostgreSQL backend (for shared deployments)
    Postgres(Arc<PostgresService>),
}

impl StorageService {
    /// Initialize the storage service based on configuration
    ///
    /// For SQLite, an explicit `database.sqlite.path` wins over the data directory.
    pub async fn init(config: &DatabaseConfig, storage: &AppStorage) -> Result<Self, DataError> {
        match config.backend {
            DatabaseBackend::Sqlite => {
                let path = config.sqlite.path.clone().unwrap_or_else(|| {
                    storage.subdir_path(DataSubdir::Sqlite, SQLITE_DB_FILENAME)
                });
                let service = SqliteService::init(&path).await?;
                Ok(Self::Sqlite(Arc::new(service)))
            }
            DatabaseBackend::Postgres => {
                let pg = config.postgres.as_ref().ok_or_else(|| {
                    DataError::Config("PostgreSQL configuration required".to_string())
                })?;
                let service = PostgresService::init(pg).await?;
                Ok(Self::Postgres(Arc::new(service)))
            }
        }
    }

    /// In-memory SQLite storage with the full schema
    #[cfg(test)]
    pub async fn in_memory() -> Result<Self, DataError> {
        let service = SqliteService::in_memory().await?;
        Ok(Self::Sqlite(Arc::new(service)))
    }

    pub fn backend(&self) -> Backend {
        match self {
            Self::Sqlite(_) => Backend::Sqlite,
            Self::Postgres(_) => Backend::Postgres,
        }
    }

    /// Repository handle shared by the tracker and the API
    pub fn repository(&self) -> Arc<dyn TelemetryRepository> {
        match self {
            Self::Sqlite(s) => Arc::new(Arc::clone(s)),
            Self::Postgres(p) => Arc::new(Arc::clone(p)),
        }
    }

    /// Run a WAL checkpoint (SQLite); PostgreSQL needs none
    pub async fn checkpoint(&self) -> Result<(), DataError> {
        match self {
            Self::Sqlite(s) => s.checkpoint().await.map_err(Into::into),
            Self::Postgres(_) => Ok(()),
        }
    }

    /// Close the database connection gracefully
    pub async fn close(&self) {
        match self {
            Self::Sqlite(s) => s.close().await,
            Self::Postgres(p) => p.close().await,
        }
    }

    /// Start the background checkpoint task (SQLite) or health check task (PostgreSQL)
    pub fn start_background_task(&self, shutdown_rx: watch::Receiver<bool>) -> JoinHandle<()> {
        match self {
            Self::Sqlite(s) => s.start_checkpoint_task(shutdown_rx),
            Self::Postgres(p) => p.start_health_check_task(shutdown_rx),
        }
    }
}
