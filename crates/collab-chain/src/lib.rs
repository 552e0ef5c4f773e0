//! Collab Chain - the remote side of a deployment
//!
//! Remote components are independently addressable, stateful units created
//! and invoked through [`ChainClient`]. Two implementations ship here:
//! - [`rpc::RelayClient`] talks JSON-RPC to a relay that signs, submits and
//!   waits for finality
//! - [`fakes::MemoryChain`] keeps everything in memory for tests and dry runs

pub mod address;
pub mod component;
pub mod error;
pub mod fakes;
pub mod rpc;
pub mod traits;

pub use address::Address;
pub use component::{
    methods, Arg, ComponentKind, Confirmation, DeploymentHandle, ResourceLimit,
    DEFAULT_RESOURCE_LIMIT,
};
pub use error::{ChainError, ChainResult};
pub use rpc::{RelayClient, RelayConfig, DEFAULT_CONNECT_TIMEOUT};
pub use traits::ChainClient;
