//! Application state for shared services

use std::sync::Arc;

use crate::config::CorsConfig;
use crate::domain::experiment::{ExperimentStore, VariationSelector};
use crate::infrastructure::experiment::{InMemoryExperimentStore, UniformSelector};
use crate::infrastructure::services::ExperimentService;

/// Application state shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub experiment_service: Arc<ExperimentService>,
    pub cors: CorsConfig,
}

impl AppState {
    pub fn new(experiment_service: Arc<ExperimentService>, cors: CorsConfig) -> Self {
        Self {
            experiment_service,
            cors,
        }
    }

    /// Build state over the given store and selector with default CORS settings
    pub fn with_store(
        store: Arc<dyn ExperimentStore>,
        selector: Arc<dyn VariationSelector>,
    ) -> Self {
        Self::new(
            Arc::new(ExperimentService::new(store, selector)),
            CorsConfig::default(),
        )
    }

    /// In-memory state with a uniform selector, for tests and local runs
    pub fn in_memory() -> Self {
        Self::with_store(
            Arc::new(InMemoryExperimentStore::new()),
            Arc::new(UniformSelector::new()),
        )
    }
}
