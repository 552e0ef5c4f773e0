//! Collab Provision - staged deployment of a collaborative classifier
//!
//! Provides a provisioning driver that:
//! - Creates the data handler, incentive mechanism and classifier in order
//! - Feeds the classifier its weights in resource-bounded chunks
//! - Creates the coordinator and hands it control of the other three
//! - Registers the deployed model with an external index

pub mod deploy;
pub mod fakes;
pub mod plan;
pub mod provisioner;
pub mod registrar;
pub mod report;
pub mod stage;

// Re-export key types
pub use deploy::{deploy_model, prepare_plan, DeployError, DeployOutcome, DeployRequest};
pub use plan::{ClassifierParams, IncentiveParams, PlanError, PlannedStage, ProvisioningPlan};
pub use provisioner::{Deployment, Provisioner, ProvisioningError, StageFailure};
pub use registrar::{
    HttpModelIndex, ModelIndex, RegistrationError, RegistrationMode, RegistrationOutcome,
    Registrar,
};
pub use report::{write_report_json, DeployedComponent, DeploymentReport, StageRecord, StageStatus};
pub use stage::StageId;
