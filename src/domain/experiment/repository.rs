//! Experiment store trait

use async_trait::async_trait;

use super::entity::{Experiment, ExperimentId, NewExperiment, Variation, VariationId};
use crate::domain::DomainError;

#[cfg(test)]
use mockall::automock;

/// Persistence for experiments, variations and their counters
///
/// Counter increments must be atomic with respect to concurrent callers:
/// N successful increments always raise the stored value by exactly N.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ExperimentStore: Send + Sync {
    /// Creates an experiment and all of its variations in one atomic step
    ///
    /// Fails with `DuplicateName` when the experiment name is taken. On any
    /// failure nothing is persisted.
    async fn create_experiment(&self, new: NewExperiment) -> Result<Experiment, DomainError>;

    /// Finds an experiment, with its variations, by ID
    async fn get_experiment(&self, id: &ExperimentId) -> Result<Option<Experiment>, DomainError>;

    /// Lists all experiments in creation order
    async fn list_experiments(&self) -> Result<Vec<Experiment>, DomainError>;

    /// Finds a variation by ID
    async fn get_variation(&self, id: &VariationId) -> Result<Option<Variation>, DomainError>;

    /// Lists the variations of an experiment in creation order
    async fn list_variations(
        &self,
        experiment_id: &ExperimentId,
    ) -> Result<Vec<Variation>, DomainError>;

    /// Atomically adds one participant and returns the new count
    async fn increment_participants(&self, id: &VariationId) -> Result<u64, DomainError>;

    /// Atomically adds one conversion and returns the new count
    async fn increment_conversions(&self, id: &VariationId) -> Result<u64, DomainError>;

    /// Checks that the backing store is reachable
    async fn health_check(&self) -> Result<(), DomainError>;
}
