//! A/B Testing API
//!
//! Registers split-test experiments with their variations, assigns
//! participants to a uniformly random variation and records conversions.
//! Experiments are kept in memory or in PostgreSQL.

pub mod api;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;

use std::sync::Arc;

use api::state::AppState;
use infrastructure::experiment::UniformSelector;
use infrastructure::services::ExperimentService;
use infrastructure::storage::StorageFactory;
use tracing::info;

/// Create the application state with default configuration
pub async fn create_app_state() -> anyhow::Result<AppState> {
    create_app_state_with_config(&AppConfig::default()).await
}

/// Create the application state with custom configuration
///
/// Builds the experiment store once. With the Postgres backend this connects
/// the pool and applies pending migrations.
pub async fn create_app_state_with_config(config: &AppConfig) -> anyhow::Result<AppState> {
    let storage_config = config.storage.resolve()?;
    info!("Storage backend: {:?}", storage_config.storage_type());

    let store = StorageFactory::create_experiment_store(&storage_config).await?;
    let selector = Arc::new(UniformSelector::new());
    let experiment_service = Arc::new(ExperimentService::new(store, selector));

    Ok(AppState::new(experiment_service, config.cors.clone()))
}
