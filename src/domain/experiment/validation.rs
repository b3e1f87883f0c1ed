//! Experiment validation utilities

use std::collections::HashSet;

use thiserror::Error;

use crate::domain::DomainError;

/// Maximum length for experiment and variation names
pub const MAX_NAME_LENGTH: usize = 255;

/// Minimum number of variations an experiment is created with
pub const MIN_VARIATIONS: usize = 2;

/// Validation errors for experiments and variations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExperimentValidationError {
    #[error("Experiment name cannot be blank")]
    BlankName,

    #[error("Experiment name cannot contain control characters")]
    ControlCharacterInName,

    #[error("Experiment name exceeds maximum length of {0} characters")]
    NameTooLong(usize),

    #[error("Experiment must have at least 2 variations, got {0}")]
    InsufficientVariations(usize),

    #[error("Variation name at position {0} cannot be blank")]
    BlankVariationName(usize),

    #[error("Variation name at position {0} exceeds maximum length of {1} characters")]
    VariationNameTooLong(usize, usize),

    #[error("Variation name at position {0} cannot contain control characters")]
    ControlCharacterInVariationName(usize),

    #[error("Duplicate variation name: '{0}'")]
    DuplicateVariationName(String),

    #[error("Invalid ID: '{0}' is not a positive integer")]
    InvalidId(String),
}

impl From<ExperimentValidationError> for DomainError {
    fn from(err: ExperimentValidationError) -> Self {
        DomainError::invalid_input(err.to_string())
    }
}

/// Names are stored as text; NUL and other control characters are refused
/// here so every backend rejects them as input errors.
fn has_control_character(name: &str) -> bool {
    name.chars().any(char::is_control)
}

/// Validate an experiment name
pub fn validate_experiment_name(name: &str) -> Result<(), ExperimentValidationError> {
    if name.trim().is_empty() {
        return Err(ExperimentValidationError::BlankName);
    }

    if has_control_character(name) {
        return Err(ExperimentValidationError::ControlCharacterInName);
    }

    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(ExperimentValidationError::NameTooLong(MAX_NAME_LENGTH));
    }

    Ok(())
}

/// Validate the ordered variation names of a new experiment
pub fn validate_variation_names(names: &[String]) -> Result<(), ExperimentValidationError> {
    if names.len() < MIN_VARIATIONS {
        return Err(ExperimentValidationError::InsufficientVariations(
            names.len(),
        ));
    }

    let mut seen = HashSet::new();

    for (position, name) in names.iter().enumerate() {
        if name.trim().is_empty() {
            return Err(ExperimentValidationError::BlankVariationName(position));
        }

        if has_control_character(name) {
            return Err(ExperimentValidationError::ControlCharacterInVariationName(
                position,
            ));
        }

        if name.chars().count() > MAX_NAME_LENGTH {
            return Err(ExperimentValidationError::VariationNameTooLong(
                position,
                MAX_NAME_LENGTH,
            ));
        }

        if !seen.insert(name.as_str()) {
            return Err(ExperimentValidationError::DuplicateVariationName(
                name.clone(),
            ));
        }
    }

    Ok(())
}

/// Validate a raw entity ID
pub fn validate_id(id: i64) -> Result<(), ExperimentValidationError> {
    if id <= 0 {
        return Err(ExperimentValidationError::InvalidId(id.to_string()));
    }

    Ok(())
}
