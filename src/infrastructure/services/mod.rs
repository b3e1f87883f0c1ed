//! Infrastructure services

mod experiment_service;

pub use experiment_service::{ExperimentService, RegisterExperimentRequest};
