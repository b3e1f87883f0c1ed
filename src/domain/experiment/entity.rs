//! Experiment domain entities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::validation::{
    validate_experiment_name, validate_id, validate_variation_names, ExperimentValidationError,
};

// ============================================================================
// ExperimentId
// ============================================================================

/// Unique identifier for an experiment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct ExperimentId(i64);

impl ExperimentId {
    /// Create a new experiment ID with validation
    pub fn new(id: i64) -> Result<Self, ExperimentValidationError> {
        validate_id(id)?;
        Ok(Self(id))
    }

    /// Get the raw value
    pub fn value(&self) -> i64 {
        self.0
    }
}

impl TryFrom<i64> for ExperimentId {
    type Error = ExperimentValidationError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ExperimentId> for i64 {
    fn from(id: ExperimentId) -> Self {
        id.0
    }
}

impl FromStr for ExperimentId {
    type Err = ExperimentValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s
            .parse::<i64>()
            .map_err(|_| ExperimentValidationError::InvalidId(s.to_string()))?;
        Self::new(raw)
    }
}

impl fmt::Display for ExperimentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// VariationId
// ============================================================================

/// Unique identifier for a variation, unique across all experiments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct VariationId(i64);

impl VariationId {
    /// Create a new variation ID with validation
    pub fn new(id: i64) -> Result<Self, ExperimentValidationError> {
        validate_id(id)?;
        Ok(Self(id))
    }

    /// Get the raw value
    pub fn value(&self) -> i64 {
        self.0
    }
}

impl TryFrom<i64> for VariationId {
    type Error = ExperimentValidationError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<VariationId> for i64 {
    fn from(id: VariationId) -> Self {
        id.0
    }
}

impl FromStr for VariationId {
    type Err = ExperimentValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s
            .parse::<i64>()
            .map_err(|_| ExperimentValidationError::InvalidId(s.to_string()))?;
        Self::new(raw)
    }
}

impl fmt::Display for VariationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Variation
// ============================================================================

/// One arm of an experiment with its participant and conversion counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variation {
    id: VariationId,
    experiment_id: ExperimentId,
    name: String,
    participants: u64,
    conversions: u64,
    created_at: DateTime<Utc>,
}

impl Variation {
    /// Create a new variation with zeroed counters
    pub fn new(id: VariationId, experiment_id: ExperimentId, name: impl Into<String>) -> Self {
        Self {
            id,
            experiment_id,
            name: name.into(),
            participants: 0,
            conversions: 0,
            created_at: Utc::now(),
        }
    }

    /// Set the counter values, used when hydrating from a store
    pub fn with_counts(mut self, participants: u64, conversions: u64) -> Self {
        self.participants = participants;
        self.conversions = conversions;
        self
    }

    /// Set the creation timestamp
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn id(&self) -> VariationId {
        self.id
    }

    pub fn experiment_id(&self) -> ExperimentId {
        self.experiment_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of assignments that selected this variation
    pub fn participants(&self) -> u64 {
        self.participants
    }

    /// Number of conversions reported against this variation
    pub fn conversions(&self) -> u64 {
        self.conversions
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

// ============================================================================
// Experiment
// ============================================================================

/// A named split test and its ordered variations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Experiment {
    id: ExperimentId,
    name: String,
    variations: Vec<Variation>,
    created_at: DateTime<Utc>,
}

impl Experiment {
    /// Create a new experiment without variations
    pub fn new(id: ExperimentId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            variations: Vec::new(),
            created_at: Utc::now(),
        }
    }

    // Builder methods

    /// Append a variation, keeping creation order
    pub fn with_variation(mut self, variation: Variation) -> Self {
        self.variations.push(variation);
        self
    }

    /// Replace all variations
    pub fn with_variations(mut self, variations: Vec<Variation>) -> Self {
        self.variations = variations;
        self
    }

    /// Set the creation timestamp
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    // Getters

    pub fn id(&self) -> ExperimentId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Variations in creation order
    pub fn variations(&self) -> &[Variation] {
        &self.variations
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Find a variation of this experiment by ID
    pub fn variation(&self, id: VariationId) -> Option<&Variation> {
        self.variations.iter().find(|v| v.id() == id)
    }

    /// Find a variation of this experiment by name
    pub fn variation_by_name(&self, name: &str) -> Option<&Variation> {
        self.variations.iter().find(|v| v.name() == name)
    }

    /// Sum of participants across all variations
    pub fn total_participants(&self) -> u64 {
        self.variations.iter().map(Variation::participants).sum()
    }

    /// Sum of conversions across all variations
    pub fn total_conversions(&self) -> u64 {
        self.variations.iter().map(Variation::conversions).sum()
    }
}

// ============================================================================
// NewExperiment
// ============================================================================

/// Validated input for registering an experiment with its variations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewExperiment {
    name: String,
    variation_names: Vec<String>,
}

impl NewExperiment {
    /// Validate and build a registration input
    ///
    /// Requires a non-blank name and at least two distinct, non-blank
    /// variation names. Variation order is preserved.
    pub fn new(
        name: impl Into<String>,
        variation_names: Vec<String>,
    ) -> Result<Self, ExperimentValidationError> {
        let name = name.into();
        validate_experiment_name(&name)?;
        validate_variation_names(&variation_names)?;

        Ok(Self {
            name,
            variation_names,
        })
    }

    /// Skips validation so stores can be fed input they must refuse
    #[cfg(test)]
    pub(crate) fn unchecked(name: impl Into<String>, variation_names: Vec<String>) -> Self {
        Self {
            name: name.into(),
            variation_names,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn variation_names(&self) -> &[String] {
        &self.variation_names
    }
}
