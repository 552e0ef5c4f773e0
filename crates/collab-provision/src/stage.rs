//! Provisioning stage identifiers.

use serde::{Deserialize, Serialize};

/// Identity of one provisioning stage, reported on success and failure.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum StageId {
    /// Create the data handler (no constructor parameters).
    CreateDataHandler,

    /// Create the incentive mechanism with its wait times and cost weight.
    CreateIncentiveMechanism,

    /// Create the classifier with labels, the first weight chunk, bias and learning rate.
    CreateClassifier,

    /// Append one weight chunk starting at `offset`.
    ApplyWeights { offset: usize },

    /// Create the coordinator referencing the other three components.
    CreateCoordinator,

    /// Hand control of the three leaf components to the coordinator.
    TransferControl,
}

impl StageId {
    /// Get the stage name as a string.
    pub fn name(&self) -> &'static str {
        match self {
            StageId::CreateDataHandler => "create_data_handler",
            StageId::CreateIncentiveMechanism => "create_incentive_mechanism",
            StageId::CreateClassifier => "create_classifier",
            StageId::ApplyWeights { .. } => "apply_weights",
            StageId::CreateCoordinator => "create_coordinator",
            StageId::TransferControl => "transfer_control",
        }
    }
}

impl std::fmt::Display for StageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StageId::ApplyWeights { offset } => write!(f, "{}@{}", self.name(), offset),
            _ => f.write_str(self.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_stage_names() {
        assert_eq!(StageId::CreateDataHandler.name(), "create_data_handler");
        assert_eq!(StageId::CreateIncentiveMechanism.name(), "create_incentive_mechanism");
        assert_eq!(StageId::CreateClassifier.name(), "create_classifier");
        assert_eq!(StageId::CreateCoordinator.name(), "create_coordinator");
        assert_eq!(StageId::TransferControl.name(), "transfer_control");
    }

    #[test]
    fn test_apply_weights_display_includes_offset() {
        let id = StageId::ApplyWeights { offset: 500 };
        assert_eq!(id.name(), "apply_weights");
        assert_eq!(id.to_string(), "apply_weights@500");
        assert_eq!(StageId::TransferControl.to_string(), "transfer_control");
    }

    #[test]
    fn test_stage_serialization() {
        assert_eq!(
            serde_json::to_value(StageId::ApplyWeights { offset: 250 }).expect("serialize"),
            json!({"stage": "apply_weights", "offset": 250})
        );
        assert_eq!(
            serde_json::to_value(StageId::CreateCoordinator).expect("serialize"),
            json!({"stage": "create_coordinator"})
        );
    }
}
