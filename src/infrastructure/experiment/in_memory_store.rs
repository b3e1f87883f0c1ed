//! In-memory implementation of the experiment store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use crate::domain::experiment::{
    Experiment, ExperimentId, ExperimentStore, NewExperiment, Variation, VariationId,
};
use crate::domain::DomainError;

/// Stored variation with lock-free counters
#[derive(Debug)]
struct VariationRow {
    id: VariationId,
    experiment_id: ExperimentId,
    name: String,
    participants: AtomicU64,
    conversions: AtomicU64,
    created_at: DateTime<Utc>,
}

impl VariationRow {
    fn snapshot(&self) -> Variation {
        Variation::new(self.id, self.experiment_id, self.name.clone())
            .with_counts(
                self.participants.load(Ordering::Acquire),
                self.conversions.load(Ordering::Acquire),
            )
            .with_created_at(self.created_at)
    }
}

#[derive(Debug)]
struct ExperimentRow {
    id: ExperimentId,
    name: String,
    created_at: DateTime<Utc>,
    variations: Vec<Arc<VariationRow>>,
}

impl ExperimentRow {
    fn snapshot(&self) -> Experiment {
        Experiment::new(self.id, self.name.clone())
            .with_created_at(self.created_at)
            .with_variations(self.variations.iter().map(|v| v.snapshot()).collect())
    }
}

#[derive(Debug, Default)]
struct Inner {
    /// Experiments in creation order
    experiments: Vec<ExperimentRow>,
    /// Experiment ID to position in `experiments`
    by_id: HashMap<ExperimentId, usize>,
    names: HashMap<String, ExperimentId>,
    variations: HashMap<VariationId, Arc<VariationRow>>,
    next_experiment_id: i64,
    next_variation_id: i64,
}

impl Inner {
    fn experiment(&self, id: &ExperimentId) -> Option<&ExperimentRow> {
        self.by_id.get(id).and_then(|idx| self.experiments.get(*idx))
    }
}

/// In-memory experiment store
///
/// The structural index sits behind a single `RwLock` that is only taken for
/// writing while an experiment is registered. Counter updates take the read
/// lock and bump the variation's atomics, so increments on different
/// variations never wait on each other.
#[derive(Debug, Default)]
pub struct InMemoryExperimentStore {
    inner: RwLock<Inner>,
}

impl InMemoryExperimentStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn increment(
        &self,
        id: &VariationId,
        counter: impl Fn(&VariationRow) -> &AtomicU64,
    ) -> Result<u64, DomainError> {
        let inner = self.inner.read().map_err(|e| {
            DomainError::store_unavailable(format!("Failed to acquire read lock: {}", e))
        })?;

        let row = inner
            .variations
            .get(id)
            .ok_or_else(|| DomainError::not_found(format!("Variation '{}' not found", id)))?;

        Ok(counter(row).fetch_add(1, Ordering::AcqRel) + 1)
    }
}

fn next_id(sequence: &mut i64) -> i64 {
    *sequence += 1;
    *sequence
}

#[async_trait]
impl ExperimentStore for InMemoryExperimentStore {
    async fn create_experiment(&self, new: NewExperiment) -> Result<Experiment, DomainError> {
        let mut inner = self.inner.write().map_err(|e| {
            DomainError::store_unavailable(format!("Failed to acquire write lock: {}", e))
        })?;

        if inner.names.contains_key(new.name()) {
            return Err(DomainError::duplicate_name(format!(
                "Experiment '{}' already exists",
                new.name()
            )));
        }

        let experiment_id = ExperimentId::new(next_id(&mut inner.next_experiment_id))?;
        let created_at = Utc::now();

        let mut variations = Vec::with_capacity(new.variation_names().len());

        for name in new.variation_names() {
            let variation_id = VariationId::new(next_id(&mut inner.next_variation_id))?;
            variations.push(Arc::new(VariationRow {
                id: variation_id,
                experiment_id,
                name: name.clone(),
                participants: AtomicU64::new(0),
                conversions: AtomicU64::new(0),
                created_at,
            }));
        }

        for variation in &variations {
            inner.variations.insert(variation.id, Arc::clone(variation));
        }

        let row = ExperimentRow {
            id: experiment_id,
            name: new.name().to_string(),
            created_at,
            variations,
        };
        let experiment = row.snapshot();

        let position = inner.experiments.len();
        inner.experiments.push(row);
        inner.by_id.insert(experiment_id, position);
        inner.names.insert(new.name().to_string(), experiment_id);

        Ok(experiment)
    }

    async fn get_experiment(&self, id: &ExperimentId) -> Result<Option<Experiment>, DomainError> {
        let inner = self.inner.read().map_err(|e| {
            DomainError::store_unavailable(format!("Failed to acquire read lock: {}", e))
        })?;

        Ok(inner.experiment(id).map(ExperimentRow::snapshot))
    }

    async fn list_experiments(&self) -> Result<Vec<Experiment>, DomainError> {
        let inner = self.inner.read().map_err(|e| {
            DomainError::store_unavailable(format!("Failed to acquire read lock: {}", e))
        })?;

        Ok(inner.experiments.iter().map(ExperimentRow::snapshot).collect())
    }

    async fn get_variation(&self, id: &VariationId) -> Result<Option<Variation>, DomainError> {
        let inner = self.inner.read().map_err(|e| {
            DomainError::store_unavailable(format!("Failed to acquire read lock: {}", e))
        })?;

        Ok(inner.variations.get(id).map(|row| row.snapshot()))
    }

    async fn list_variations(
        &self,
        experiment_id: &ExperimentId,
    ) -> Result<Vec<Variation>, DomainError> {
        let inner = self.inner.read().map_err(|e| {
            DomainError::store_unavailable(format!("Failed to acquire read lock: {}", e))
        })?;

        Ok(inner
            .experiment(experiment_id)
            .map(|row| row.variations.iter().map(|v| v.snapshot()).collect())
            .unwrap_or_default())
    }

    async fn increment_participants(&self, id: &VariationId) -> Result<u64, DomainError> {
        self.increment(id, |row| &row.participants)
    }

    async fn increment_conversions(&self, id: &VariationId) -> Result<u64, DomainError> {
        self.increment(id, |row| &row.conversions)
    }

    async fn health_check(&self) -> Result<(), DomainError> {
        self.inner
            .read()
            .map(|_| ())
            .map_err(|e| DomainError::store_unavailable(format!("Store lock poisoned: {}", e)))
    }
}
