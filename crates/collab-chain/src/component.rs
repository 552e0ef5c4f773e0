//! Remote component kinds, constructor arguments and call results.

use serde::{Deserialize, Serialize};

use crate::address::Address;

/// Method names invoked on deployed components.
pub mod methods {
    /// `initializeWeights(startIndex, weights)` on the classifier.
    pub const INITIALIZE_WEIGHTS: &str = "initializeWeights";

    /// `transferOwnership(newOwner)` on any ownable component.
    pub const TRANSFER_OWNERSHIP: &str = "transferOwnership";
}

/// The four components that make up a collaborative classifier deployment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    /// Stores submitted training data.
    DataHandler,

    /// Deposits, refunds and rewards for contributors.
    IncentiveMechanism,

    /// The trained model itself.
    Classifier,

    /// Wires the other three together and owns them.
    Coordinator,
}

impl ComponentKind {
    /// Get the component name as a string.
    pub fn name(&self) -> &'static str {
        match self {
            ComponentKind::DataHandler => "data_handler",
            ComponentKind::IncentiveMechanism => "incentive_mechanism",
            ComponentKind::Classifier => "classifier",
            ComponentKind::Coordinator => "coordinator",
        }
    }

    /// Compiled artifact the remote environment instantiates for this kind.
    pub fn artifact(&self) -> &'static str {
        match self {
            ComponentKind::DataHandler => "DataHandler64",
            ComponentKind::IncentiveMechanism => "Stakeable64",
            ComponentKind::Classifier => "SparsePerceptron",
            ComponentKind::Coordinator => "CollaborativeTrainer64",
        }
    }
}

impl std::fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A single constructor or call argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Arg {
    Uint(u64),
    Int(i64),
    IntArray(Vec<i64>),
    StringArray(Vec<String>),
    Address(Address),
}

impl Arg {
    /// Number of storage words this argument occupies in a payload.
    pub fn words(&self) -> u64 {
        match self {
            Arg::Uint(_) | Arg::Int(_) | Arg::Address(_) => 1,
            Arg::IntArray(values) => values.len() as u64,
            Arg::StringArray(values) => values.len() as u64,
        }
    }
}

/// Upper bound on the cost of a single creation or call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceLimit(pub u64);

/// Enough to create a classifier carrying 250 initial weights.
pub const DEFAULT_RESOURCE_LIMIT: ResourceLimit = ResourceLimit(7_900_000);

impl Default for ResourceLimit {
    fn default() -> Self {
        DEFAULT_RESOURCE_LIMIT
    }
}

/// Local reference to a created remote component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentHandle {
    pub kind: ComponentKind,
    pub address: Address,
    /// Transaction that created the component.
    pub transaction: String,
}

/// Proof that a call was finalised by the remote environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confirmation {
    pub transaction: String,
    pub resource_used: Option<u64>,
}
