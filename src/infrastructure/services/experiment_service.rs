//! Experiment service for A/B testing
//!
//! Registers experiments, assigns participants to variations at random and
//! records conversions. All counter changes go through the store's atomic
//! increments.

use std::sync::Arc;

use tracing::{debug, error, info};

use crate::domain::experiment::{
    Assignment, Experiment, ExperimentId, ExperimentStore, NewExperiment, Variation, VariationId,
    VariationSelector,
};
use crate::domain::DomainError;
use crate::infrastructure::observability::{
    record_assignment, record_conversion, record_registration,
};

// ============================================================================
// Request Types
// ============================================================================

/// Request to register a new experiment
#[derive(Debug, Clone)]
pub struct RegisterExperimentRequest {
    pub name: String,
    /// Variation names in the order they should be created
    pub variation_names: Vec<String>,
}

// ============================================================================
// Experiment Service
// ============================================================================

/// Service for managing A/B testing experiments
pub struct ExperimentService {
    store: Arc<dyn ExperimentStore>,
    selector: Arc<dyn VariationSelector>,
}

impl std::fmt::Debug for ExperimentService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExperimentService").finish_non_exhaustive()
    }
}

impl ExperimentService {
    /// Create a new experiment service
    pub fn new(store: Arc<dyn ExperimentStore>, selector: Arc<dyn VariationSelector>) -> Self {
        Self { store, selector }
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Register an experiment together with its variations
    ///
    /// The experiment and every variation become visible at once, or not at
    /// all.
    pub async fn register(
        &self,
        request: RegisterExperimentRequest,
    ) -> Result<Experiment, DomainError> {
        debug!(name = %request.name, "Registering experiment");

        let new = NewExperiment::new(request.name, request.variation_names)?;
        let experiment = self.store.create_experiment(new).await?;

        record_registration(experiment.variations().len());
        info!(
            experiment_id = %experiment.id(),
            name = %experiment.name(),
            variations = experiment.variations().len(),
            "Experiment registered"
        );

        Ok(experiment)
    }

    // ========================================================================
    // Assignment
    // ========================================================================

    /// Assign a participant to one of the experiment's variations
    ///
    /// Every variation is equally likely. The chosen variation's participant
    /// counter is incremented by exactly one.
    pub async fn assign(&self, experiment_id: &ExperimentId) -> Result<Assignment, DomainError> {
        let experiment = self.get(experiment_id).await?;
        let variations = experiment.variations();

        if variations.is_empty() {
            error!(
                experiment_id = %experiment_id,
                "Experiment has no variations"
            );
            return Err(DomainError::no_variations(format!(
                "Experiment '{}' has no variations",
                experiment_id
            )));
        }

        let index = self.selector.select(variations.len())?;
        let variation = variations.get(index).ok_or_else(|| {
            DomainError::internal(format!(
                "Selected index {} out of range for {} variations",
                index,
                variations.len()
            ))
        })?;

        let participants = self.store.increment_participants(&variation.id()).await?;

        record_assignment();
        debug!(
            experiment_id = %experiment_id,
            variation_id = %variation.id(),
            participants,
            "Participant assigned"
        );

        Ok(Assignment::new(
            *experiment_id,
            variation.id(),
            variation.name(),
            participants,
        ))
    }

    // ========================================================================
    // Conversions
    // ========================================================================

    /// Record a conversion against a variation, returning the new count
    ///
    /// Prior assignment is not checked.
    pub async fn record_conversion(&self, variation_id: &VariationId) -> Result<u64, DomainError> {
        let conversions = self.store.increment_conversions(variation_id).await?;

        record_conversion();
        debug!(variation_id = %variation_id, conversions, "Conversion recorded");

        Ok(conversions)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// List all experiments in creation order with current counters
    pub async fn list(&self) -> Result<Vec<Experiment>, DomainError> {
        self.store.list_experiments().await
    }

    /// Get an experiment by ID
    pub async fn get(&self, id: &ExperimentId) -> Result<Experiment, DomainError> {
        let experiment = self
            .store
            .get_experiment(id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("Experiment '{}' not found", id)))?;

        debug!(
            experiment_id = %id,
            participants = experiment.total_participants(),
            conversions = experiment.total_conversions(),
            "Fetched experiment"
        );

        Ok(experiment)
    }

    /// Get a variation by ID
    pub async fn get_variation(&self, id: &VariationId) -> Result<Variation, DomainError> {
        self.store
            .get_variation(id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("Variation '{}' not found", id)))
    }

    /// Check the backing store
    pub async fn health_check(&self) -> Result<(), DomainError> {
        self.store.health_check().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::experiment::{MockExperimentStore, MockVariationSelector};
    use crate::infrastructure::experiment::{InMemoryExperimentStore, UniformSelector};
    use futures::future::join_all;

    fn create_service() -> ExperimentService {
        ExperimentService::new(
            Arc::new(InMemoryExperimentStore::new()),
            Arc::new(UniformSelector::new()),
        )
    }

    fn request(name: &str, variations: &[&str]) -> RegisterExperimentRequest {
        RegisterExperimentRequest {
            name: name.to_string(),
            variation_names: variations.iter().map(|v| v.to_string()).collect(),
        }
    }

    fn participants(experiment: &Experiment) -> Vec<u64> {
        experiment
            .variations()
            .iter()
            .map(Variation::participants)
            .collect()
    }

    // ========================================================================
    // Registration
    // ========================================================================

    #[tokio::test]
    async fn test_register_lists_variations_in_order() {
        let service = create_service();
        let created = service
            .register(request("Checkout", &["C", "A", "B"]))
            .await
            .unwrap();

        let listed = service.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0], created);

        let names: Vec<_> = listed[0].variations().iter().map(Variation::name).collect();
        assert_eq!(names, vec!["C", "A", "B"]);
        assert!(listed[0]
            .variations()
            .iter()
            .all(|v| v.participants() == 0 && v.conversions() == 0));
    }

    #[tokio::test]
    async fn test_register_requires_two_variations() {
        let service = create_service();

        let result = service.register(request("Solo", &["Only"])).await;
        assert!(matches!(result, Err(DomainError::InvalidInput { .. })));

        let result = service.register(request("Empty", &[])).await;
        assert!(matches!(result, Err(DomainError::InvalidInput { .. })));

        assert!(service.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_register_rejects_blank_names() {
        let service = create_service();

        let result = service.register(request("  ", &["A", "B"])).await;
        assert!(matches!(result, Err(DomainError::InvalidInput { .. })));

        let result = service.register(request("Layout", &["A", ""])).await;
        assert!(matches!(result, Err(DomainError::InvalidInput { .. })));

        assert!(service.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_register_duplicate_name() {
        let service = create_service();
        let original = service
            .register(request("Checkout", &["A", "B"]))
            .await
            .unwrap();

        let result = service.register(request("Checkout", &["X", "Y"])).await;
        assert!(matches!(result, Err(DomainError::DuplicateName { .. })));

        let listed = service.list().await.unwrap();
        assert_eq!(listed, vec![original]);
    }

    // ========================================================================
    // Assignment
    // ========================================================================

    #[tokio::test]
    async fn test_assign_increments_exactly_one_variation() {
        let service = create_service();
        let exp = service
            .register(request("Copy", &["A", "B", "C"]))
            .await
            .unwrap();

        let assignment = service.assign(&exp.id()).await.unwrap();
        assert_eq!(assignment.experiment_id(), exp.id());
        assert_eq!(assignment.participants(), 1);

        let after = service.get(&exp.id()).await.unwrap();
        let chosen = after.variation(assignment.variation_id()).unwrap();
        assert_eq!(chosen.name(), assignment.variation_name());
        assert_eq!(chosen.participants(), 1);
        assert_eq!(after.total_participants(), 1);
    }

    #[tokio::test]
    async fn test_sequential_assignments_are_balanced() {
        let service = create_service();
        let exp = service
            .register(request("Balance", &["A", "B"]))
            .await
            .unwrap();

        let draws = 10_000;
        for _ in 0..draws {
            service.assign(&exp.id()).await.unwrap();
        }

        let counts = participants(&service.get(&exp.id()).await.unwrap());
        assert_eq!(counts.iter().sum::<u64>(), draws);

        let expected = draws as f64 / 2.0;
        for count in counts {
            assert!((count as f64 - expected).abs() / expected < 0.10);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_assignments_are_all_counted() {
        let service = Arc::new(create_service());
        let exp = service
            .register(request("Concurrent", &["A", "B"]))
            .await
            .unwrap();
        let id = exp.id();

        let tasks = (0..100).map(|_| {
            let service = Arc::clone(&service);
            tokio::spawn(async move { service.assign(&id).await })
        });

        for result in join_all(tasks).await {
            result.unwrap().unwrap();
        }

        let after = service.get(&id).await.unwrap();
        assert_eq!(after.total_participants(), 100);
    }

    #[tokio::test]
    async fn test_assign_missing_experiment() {
        let service = create_service();
        let missing = ExperimentId::new(404).unwrap();

        let result = service.assign(&missing).await;
        assert!(matches!(result, Err(DomainError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_assign_without_variations_fails() {
        let exp_id = ExperimentId::new(1).unwrap();
        let mut store = MockExperimentStore::new();
        store
            .expect_get_experiment()
            .returning(move |_| Ok(Some(Experiment::new(exp_id, "Hollow"))));
        store.expect_increment_participants().never();

        let mut selector = MockVariationSelector::new();
        selector.expect_select().never();

        let service = ExperimentService::new(Arc::new(store), Arc::new(selector));

        let result = service.assign(&exp_id).await;
        assert!(matches!(result, Err(DomainError::NoVariations { .. })));
    }

    #[tokio::test]
    async fn test_assign_out_of_range_selection_is_internal() {
        let exp_id = ExperimentId::new(1).unwrap();
        let experiment = Experiment::new(exp_id, "Skewed")
            .with_variation(Variation::new(VariationId::new(1).unwrap(), exp_id, "A"))
            .with_variation(Variation::new(VariationId::new(2).unwrap(), exp_id, "B"));

        let mut store = MockExperimentStore::new();
        store
            .expect_get_experiment()
            .returning(move |_| Ok(Some(experiment.clone())));
        store.expect_increment_participants().never();

        let mut selector = MockVariationSelector::new();
        selector.expect_select().returning(|count| Ok(count));

        let service = ExperimentService::new(Arc::new(store), Arc::new(selector));

        let result = service.assign(&exp_id).await;
        assert!(matches!(result, Err(DomainError::Internal { .. })));
    }

    #[tokio::test]
    async fn test_assign_uses_selected_index() {
        let exp_id = ExperimentId::new(3).unwrap();
        let second = VariationId::new(8).unwrap();
        let experiment = Experiment::new(exp_id, "Pinned")
            .with_variation(Variation::new(VariationId::new(7).unwrap(), exp_id, "A"))
            .with_variation(Variation::new(second, exp_id, "B"));

        let mut store = MockExperimentStore::new();
        store
            .expect_get_experiment()
            .returning(move |_| Ok(Some(experiment.clone())));
        store
            .expect_increment_participants()
            .withf(move |id| *id == second)
            .times(1)
            .returning(|_| Ok(5));

        let mut selector = MockVariationSelector::new();
        selector.expect_select().returning(|_| Ok(1));

        let service = ExperimentService::new(Arc::new(store), Arc::new(selector));

        let assignment = service.assign(&exp_id).await.unwrap();
        assert_eq!(assignment.variation_id(), second);
        assert_eq!(assignment.variation_name(), "B");
        assert_eq!(assignment.participants(), 5);
    }

    #[tokio::test]
    async fn test_store_unavailable_propagates() {
        let mut store = MockExperimentStore::new();
        store
            .expect_get_experiment()
            .returning(|_| Err(DomainError::store_unavailable("connection refused")));
        store
            .expect_increment_conversions()
            .returning(|_| Err(DomainError::store_unavailable("connection refused")));

        let service = ExperimentService::new(Arc::new(store), Arc::new(UniformSelector::new()));

        let result = service.assign(&ExperimentId::new(1).unwrap()).await;
        assert!(matches!(result, Err(DomainError::StoreUnavailable { .. })));

        let result = service
            .record_conversion(&VariationId::new(1).unwrap())
            .await;
        assert!(matches!(result, Err(DomainError::StoreUnavailable { .. })));
    }

    // ========================================================================
    // Conversions
    // ========================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_conversions_are_all_counted() {
        let service = Arc::new(create_service());
        let exp = service
            .register(request("Signup", &["A", "B"]))
            .await
            .unwrap();
        let variation_id = exp.variations()[0].id();

        let tasks = (0..250).map(|_| {
            let service = Arc::clone(&service);
            tokio::spawn(async move { service.record_conversion(&variation_id).await })
        });

        for result in join_all(tasks).await {
            result.unwrap().unwrap();
        }

        let variation = service.get_variation(&variation_id).await.unwrap();
        assert_eq!(variation.conversions(), 250);
        assert!(variation.conversions() > variation.participants());
    }

    #[tokio::test]
    async fn test_conversion_on_missing_variation() {
        let service = create_service();

        let result = service
            .record_conversion(&VariationId::new(77).unwrap())
            .await;
        assert!(matches!(result, Err(DomainError::NotFound { .. })));

        let result = service.get_variation(&VariationId::new(77).unwrap()).await;
        assert!(matches!(result, Err(DomainError::NotFound { .. })));
    }

    // ========================================================================
    // End to end
    // ========================================================================

    #[tokio::test]
    async fn test_button_color_scenario() {
        let service = create_service();
        let exp = service
            .register(request("Button Color", &["Red", "Blue"]))
            .await
            .unwrap();

        let assignment = service.assign(&exp.id()).await.unwrap();
        assert!(["Red", "Blue"].contains(&assignment.variation_name()));
        assert_eq!(assignment.participants(), 1);

        let conversions = service
            .record_conversion(&assignment.variation_id())
            .await
            .unwrap();
        assert_eq!(conversions, 1);

        let listed = service.list().await.unwrap();
        assert_eq!(listed.len(), 1);

        let view = &listed[0];
        assert_eq!(view.name(), "Button Color");

        let chosen = view.variation(assignment.variation_id()).unwrap();
        assert_eq!((chosen.participants(), chosen.conversions()), (1, 1));

        let other = view
            .variations()
            .iter()
            .find(|v| v.id() != assignment.variation_id())
            .unwrap();
        assert_eq!((other.participants(), other.conversions()), (0, 0));
        assert_eq!(view.total_participants(), 1);
        assert_eq!(view.total_conversions(), 1);
    }
}
