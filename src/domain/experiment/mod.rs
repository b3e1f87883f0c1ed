//! Experiment domain module for A/B testing
//!
//! Experiments own an ordered set of variations. Each variation tracks how
//! many participants were assigned to it and how many conversions were
//! reported against it.

mod assignment;
mod entity;
mod repository;
mod selector;
mod validation;

pub use assignment::Assignment;
pub use entity::{Experiment, ExperimentId, NewExperiment, Variation, VariationId};
pub use repository::ExperimentStore;
pub use selector::VariationSelector;
pub use validation::{
    validate_experiment_name, validate_id, validate_variation_names, ExperimentValidationError,
    MAX_NAME_LENGTH, MIN_VARIATIONS,
};

#[cfg(test)]
pub use repository::MockExperimentStore;
#[cfg(test)]
pub use selector::MockVariationSelector;
