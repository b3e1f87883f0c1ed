//! Infrastructure layer for experiment A/B testing
//!
//! Provides the experiment store backends and the variation selector.

mod in_memory_store;
mod postgres_store;
mod uniform_selector;

pub use in_memory_store::InMemoryExperimentStore;
pub use postgres_store::PostgresExperimentStore;
pub use uniform_selector::UniformSelector;
