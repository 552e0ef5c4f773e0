//! End-to-end deployment: convert, plan, provision, register.

use collab_chain::{ChainClient, ResourceLimit};
use collab_core::{
    obs, to_fixed_point_scalar, to_fixed_point_vector, BatchPlanner, ConfigError,
    ConversionError, DeployConfig, ModelDescriptor, ModelRecord, ModelSource, Scale,
};
use tracing::{info, Instrument};

use crate::plan::{ClassifierParams, IncentiveParams, PlanError, ProvisioningPlan};
use crate::provisioner::{Deployment, Provisioner, ProvisioningError};
use crate::registrar::{
    ModelIndex, RegistrationError, RegistrationMode, RegistrationOutcome, Registrar,
};
use crate::report::DeploymentReport;

/// Everything that can stop a deployment.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("cannot convert model parameters: {0}")]
    Conversion(#[from] ConversionError),

    #[error("cannot plan deployment: {0}")]
    Plan(#[from] PlanError),

    #[error(transparent)]
    Provisioning(#[from] ProvisioningError),

    /// Provisioning succeeded but the index refused the record.
    #[error("registration failed: {source}")]
    Registration {
        #[source]
        source: RegistrationError,
        report: Box<DeploymentReport>,
    },
}

impl DeployError {
    /// The provisioning report, if any remote call was made.
    pub fn report(&self) -> Option<&DeploymentReport> {
        match self {
            DeployError::Provisioning(err) => Some(&*err.report),
            DeployError::Registration { report, .. } => Some(&**report),
            _ => None,
        }
    }
}

/// Inputs of one deployment, resolved from configuration.
#[derive(Debug, Clone)]
pub struct DeployRequest {
    pub descriptor: ModelDescriptor,
    pub source: ModelSource,
    pub labels: Vec<String>,
    pub learning_rate: f64,
    pub scale: Scale,
    pub planner: BatchPlanner,
    pub incentive: IncentiveParams,
    pub resource_limit: ResourceLimit,
    pub registration_mode: RegistrationMode,
}

impl DeployRequest {
    pub fn from_config(
        config: &DeployConfig,
        source: ModelSource,
        registration_mode: RegistrationMode,
    ) -> Result<Self, DeployError> {
        config.validate()?;
        Ok(Self {
            descriptor: config.model.descriptor(),
            source,
            labels: config.model.labels.clone(),
            learning_rate: config.model.learning_rate,
            scale: config.scale()?,
            planner: config.planner()?,
            incentive: IncentiveParams::from(&config.incentive),
            resource_limit: ResourceLimit(config.chain.resource_limit),
            registration_mode,
        })
    }
}

/// Convert the model and build its plan. Makes no remote call, so any
/// error here leaves nothing deployed.
pub fn prepare_plan(request: &DeployRequest) -> Result<ProvisioningPlan, DeployError> {
    let weights = to_fixed_point_vector(&request.source.coef, request.scale)?;
    let classifier = ClassifierParams {
        labels: request.labels.clone(),
        bias: to_fixed_point_scalar(request.source.intercept, request.scale)?,
        learning_rate: to_fixed_point_scalar(request.learning_rate, request.scale)?,
    };
    let plan = ProvisioningPlan::build(request.incentive, classifier, &weights, &request.planner)?;
    Ok(plan)
}

/// A deployed and (possibly) registered model.
#[derive(Debug)]
pub struct DeployOutcome {
    pub deployment: Deployment,
    pub record: ModelRecord,
    pub registration: RegistrationOutcome,
}

/// Run a full deployment: plan, provision every stage, then register the
/// coordinator's address with `index`.
pub async fn deploy_model(
    client: &dyn ChainClient,
    index: &dyn ModelIndex,
    request: &DeployRequest,
) -> Result<DeployOutcome, DeployError> {
    let plan = prepare_plan(request)?;
    let provisioner = Provisioner::new(client).with_resource_limit(request.resource_limit);
    let span = obs::provision_span(provisioner.deployment_id(), &request.descriptor.name);

    async {
        info!(
            stages = plan.stages().len(),
            updates = plan.update_count(),
            digest = %plan.weights_digest(),
            "Deploying model"
        );

        let deployment = provisioner.execute(&plan).await?;
        let record = request
            .descriptor
            .clone()
            .deployed_at(deployment.coordinator.address.as_str());

        let registrar = Registrar::new(index, request.registration_mode);
        let registration = registrar.register(&record).await.map_err(|source| {
            DeployError::Registration {
                source,
                report: Box::new(deployment.report.clone()),
            }
        })?;

        Ok::<_, DeployError>(DeployOutcome {
            deployment,
            record,
            registration,
        })
    }
    .instrument(span)
    .await
}
