//! Catalog metadata describing a deployed model.

use serde::{Deserialize, Serialize};

/// Descriptive record of a model, submitted to the model index once
/// provisioning has finished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelDescriptor {
    pub name: String,
    pub description: String,
    /// Decimal string, e.g. `"0.829"`.
    pub accuracy: String,
    pub model_type: String,
    pub encoder: String,
}

impl ModelDescriptor {
    /// Attach the coordinator's address, producing the record sent to the index.
    pub fn deployed_at(self, address: impl Into<String>) -> ModelRecord {
        ModelRecord {
            descriptor: self,
            address: address.into(),
        }
    }
}

/// A [`ModelDescriptor`] plus the address of the deployed coordinator.
///
/// Serialises flat: `{"name": .., "modelType": .., "address": ..}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelRecord {
    #[serde(flatten)]
    pub descriptor: ModelDescriptor,
    pub address: String,
}
