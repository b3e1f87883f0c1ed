//! Storage factory for runtime backend selection

use std::str::FromStr;
use std::sync::Arc;

use tracing::info;

use crate::domain::experiment::ExperimentStore;
use crate::domain::DomainError;
use crate::infrastructure::experiment::{InMemoryExperimentStore, PostgresExperimentStore};

use super::migrations::PostgresMigrator;
use super::postgres::{connect_pool, PostgresConfig};

/// Backend named by `storage.backend`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageType {
    InMemory,
    Postgres,
}

impl FromStr for StorageType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" | "inmemory" | "in-memory" | "in_memory" => Ok(Self::InMemory),
            "postgres" | "postgresql" | "pg" => Ok(Self::Postgres),
            other => Err(DomainError::invalid_input(format!(
                "Unknown storage backend '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub enum StorageConfig {
    InMemory,
    Postgres(PostgresConfig),
}

impl StorageConfig {
    pub fn in_memory() -> Self {
        Self::InMemory
    }

    pub fn postgres(config: PostgresConfig) -> Self {
        Self::Postgres(config)
    }

    pub fn storage_type(&self) -> StorageType {
        match self {
            Self::InMemory => StorageType::InMemory,
            Self::Postgres(_) => StorageType::Postgres,
        }
    }
}

#[derive(Debug)]
pub struct StorageFactory;

impl StorageFactory {
    /// Creates the experiment store described by the configuration
    ///
    /// The Postgres backend applies pending migrations before it is returned.
    pub async fn create_experiment_store(
        config: &StorageConfig,
    ) -> Result<Arc<dyn ExperimentStore>, DomainError> {
        match config {
            StorageConfig::InMemory => {
                info!("Using in-memory experiment store");
                Ok(Arc::new(InMemoryExperimentStore::new()))
            }
            StorageConfig::Postgres(pg_config) => {
                let pool = connect_pool(pg_config).await?;
                PostgresMigrator::new(pool.clone()).migrate_up().await?;
                info!(
                    max_connections = pg_config.max_connections,
                    "Using PostgreSQL experiment store"
                );
                Ok(Arc::new(PostgresExperimentStore::new(pool)))
            }
        }
    }
}
