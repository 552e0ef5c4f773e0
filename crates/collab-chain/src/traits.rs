//! The capability the provisioner drives.

use async_trait::async_trait;

use crate::component::{Arg, ComponentKind, Confirmation, DeploymentHandle, ResourceLimit};
use crate::error::ChainResult;

/// Create and invoke remote components.
///
/// Guarantees:
/// - A returned handle or confirmation means the operation is final.
/// - Failures before confirmation are decisive; implementations never retry.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Create a component of `kind` with constructor `args`.
    async fn create(
        &self,
        kind: ComponentKind,
        args: Vec<Arg>,
        limit: ResourceLimit,
    ) -> ChainResult<DeploymentHandle>;

    /// Call `method` on an existing component.
    async fn invoke(
        &self,
        handle: &DeploymentHandle,
        method: &str,
        args: Vec<Arg>,
        limit: ResourceLimit,
    ) -> ChainResult<Confirmation>;
}
