//! Assignment outcome returned when a participant is placed in a variation

use serde::{Deserialize, Serialize};

use super::entity::{ExperimentId, VariationId};

/// Result of assigning a participant to a variation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    experiment_id: ExperimentId,
    variation_id: VariationId,
    variation_name: String,
    /// Participant count of the chosen variation after this assignment
    participants: u64,
}

impl Assignment {
    pub fn new(
        experiment_id: ExperimentId,
        variation_id: VariationId,
        variation_name: impl Into<String>,
        participants: u64,
    ) -> Self {
        Self {
            experiment_id,
            variation_id,
            variation_name: variation_name.into(),
            participants,
        }
    }

    pub fn experiment_id(&self) -> ExperimentId {
        self.experiment_id
    }

    pub fn variation_id(&self) -> VariationId {
        self.variation_id
    }

    pub fn variation_name(&self) -> &str {
        &self.variation_name
    }

    pub fn participants(&self) -> u64 {
        self.participants
    }
}
