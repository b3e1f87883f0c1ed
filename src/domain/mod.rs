//! Domain layer - Core business logic and entities

pub mod error;
pub mod experiment;

pub use error::DomainError;
pub use experiment::{
    Assignment, Experiment, ExperimentId, ExperimentStore, ExperimentValidationError,
    NewExperiment, Variation, VariationId, VariationSelector,
};
