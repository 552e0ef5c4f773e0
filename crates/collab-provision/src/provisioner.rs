//! Provisioning driver.
//!
//! Executes a [`ProvisioningPlan`] against a [`ChainClient`] one stage at a
//! time, waiting for each stage to be confirmed before starting the next.
//! The first failure aborts the rest of the plan. Components that were
//! already created are not rolled back; their addresses are kept in the
//! report carried by the error.

use std::time::Instant;

use collab_chain::{
    methods, Arg, ChainClient, ChainError, ComponentKind, DeploymentHandle, ResourceLimit,
    DEFAULT_RESOURCE_LIMIT,
};
use collab_core::obs;
use futures::future::join_all;
use tracing::info;
use uuid::Uuid;

use crate::plan::{PlannedStage, ProvisioningPlan};
use crate::report::{DeployedComponent, DeploymentReport, StageRecord, StageStatus};
use crate::stage::StageId;

/// Why a stage failed.
#[derive(Debug, thiserror::Error)]
pub enum StageFailure {
    #[error(transparent)]
    Remote(#[from] ChainError),

    /// Some but not all leaf components were handed to the coordinator.
    #[error(
        "control transfer incomplete: transferred [{}], failed [{}]",
        join_kinds(.transferred),
        describe_failures(.failed)
    )]
    PartialTransfer {
        transferred: Vec<ComponentKind>,
        failed: Vec<(ComponentKind, ChainError)>,
    },

    #[error("{0} has not been created")]
    MissingDependency(ComponentKind),
}

fn join_kinds(kinds: &[ComponentKind]) -> String {
    kinds
        .iter()
        .map(ComponentKind::name)
        .collect::<Vec<_>>()
        .join(", ")
}

fn describe_failures(failed: &[(ComponentKind, ChainError)]) -> String {
    failed
        .iter()
        .map(|(kind, err)| format!("{}: {}", kind, err))
        .collect::<Vec<_>>()
        .join("; ")
}

/// A provisioning run that stopped at `stage`.
#[derive(Debug, thiserror::Error)]
#[error("provisioning failed at stage {stage}: {cause}")]
pub struct ProvisioningError {
    pub stage: StageId,
    #[source]
    pub cause: StageFailure,
    /// Stages run so far, including the failed one, and every component created.
    pub report: Box<DeploymentReport>,
}

impl ProvisioningError {
    /// Components created before the failure.
    pub fn deployed(&self) -> &[DeployedComponent] {
        &self.report.deployed
    }
}

/// A fully provisioned deployment. The coordinator controls the other three.
#[derive(Debug, Clone)]
pub struct Deployment {
    pub data_handler: DeploymentHandle,
    pub incentive_mechanism: DeploymentHandle,
    pub classifier: DeploymentHandle,
    pub coordinator: DeploymentHandle,
    pub report: DeploymentReport,
}

#[derive(Debug, Default)]
struct Components {
    data_handler: Option<DeploymentHandle>,
    incentive_mechanism: Option<DeploymentHandle>,
    classifier: Option<DeploymentHandle>,
    coordinator: Option<DeploymentHandle>,
}

impl Components {
    fn slot(&mut self, kind: ComponentKind) -> &mut Option<DeploymentHandle> {
        match kind {
            ComponentKind::DataHandler => &mut self.data_handler,
            ComponentKind::IncentiveMechanism => &mut self.incentive_mechanism,
            ComponentKind::Classifier => &mut self.classifier,
            ComponentKind::Coordinator => &mut self.coordinator,
        }
    }

    fn require(&self, kind: ComponentKind) -> Result<&DeploymentHandle, StageFailure> {
        let slot = match kind {
            ComponentKind::DataHandler => &self.data_handler,
            ComponentKind::IncentiveMechanism => &self.incentive_mechanism,
            ComponentKind::Classifier => &self.classifier,
            ComponentKind::Coordinator => &self.coordinator,
        };
        slot.as_ref().ok_or(StageFailure::MissingDependency(kind))
    }
}

/// What a completed stage produced.
#[derive(Debug, Default)]
struct StageOutcome {
    address: Option<collab_chain::Address>,
    transactions: Vec<String>,
}

/// Drives a [`ProvisioningPlan`] against a remote environment.
pub struct Provisioner<'a> {
    client: &'a dyn ChainClient,
    resource_limit: ResourceLimit,
    deployment_id: String,
}

impl<'a> Provisioner<'a> {
    pub fn new(client: &'a dyn ChainClient) -> Self {
        Self {
            client,
            resource_limit: DEFAULT_RESOURCE_LIMIT,
            deployment_id: Uuid::new_v4().to_string(),
        }
    }

    /// Resource limit applied to every creation and call.
    pub fn with_resource_limit(mut self, limit: ResourceLimit) -> Self {
        self.resource_limit = limit;
        self
    }

    pub fn deployment_id(&self) -> &str {
        &self.deployment_id
    }

    /// Execute every stage of `plan` in order.
    ///
    /// Each stage is logged on start and on completion or failure. On the
    /// first failure the remaining stages are abandoned and the error
    /// carries the report so far.
    pub async fn execute(&self, plan: &ProvisioningPlan) -> Result<Deployment, ProvisioningError> {
        let start = Instant::now();
        let mut report =
            DeploymentReport::new(&self.deployment_id, plan.weights_digest(), plan.total_weights());
        let mut components = Components::default();
        let mut applied = 0usize;

        info!(
            stages = plan.stages().len(),
            weights = plan.total_weights(),
            "Starting provisioning"
        );

        for stage in plan.stages() {
            let id = stage.id();
            let stage_name = id.to_string();
            obs::emit_stage_started(&stage_name);
            let stage_start = Instant::now();

            let result = self
                .run_stage(stage, &mut components, &mut applied, plan.total_weights())
                .await;
            let duration_ms = stage_start.elapsed().as_millis() as u64;

            match result {
                Ok(outcome) => {
                    if let (Some(kind), Some(address)) = (created_kind(&id), &outcome.address) {
                        report.deployed.push(DeployedComponent {
                            kind,
                            address: address.clone(),
                        });
                    }
                    report.stages.push(StageRecord {
                        stage: id,
                        status: StageStatus::Completed,
                        duration_ms,
                        address: outcome.address,
                        transactions: outcome.transactions,
                        error: None,
                    });
                    obs::emit_stage_completed(&stage_name, duration_ms);
                }
                Err(cause) => {
                    obs::emit_stage_failed(&stage_name, &cause);
                    report.stages.push(StageRecord {
                        stage: id,
                        status: StageStatus::Failed,
                        duration_ms,
                        address: None,
                        transactions: Vec::new(),
                        error: Some(cause.to_string()),
                    });
                    report.success = false;
                    report.duration_ms = start.elapsed().as_millis() as u64;
                    return Err(ProvisioningError {
                        stage: id,
                        cause,
                        report: Box::new(report),
                    });
                }
            }
        }

        report.success = true;
        report.duration_ms = start.elapsed().as_millis() as u64;

        let last_stage = plan
            .stages()
            .last()
            .map(PlannedStage::id)
            .unwrap_or(StageId::TransferControl);
        let missing = |kind| ProvisioningError {
            stage: last_stage,
            cause: StageFailure::MissingDependency(kind),
            report: Box::new(report.clone()),
        };
        let Components {
            data_handler,
            incentive_mechanism,
            classifier,
            coordinator,
        } = components;

        let deployment = Deployment {
            data_handler: data_handler.ok_or_else(|| missing(ComponentKind::DataHandler))?,
            incentive_mechanism: incentive_mechanism
                .ok_or_else(|| missing(ComponentKind::IncentiveMechanism))?,
            classifier: classifier.ok_or_else(|| missing(ComponentKind::Classifier))?,
            coordinator: coordinator.ok_or_else(|| missing(ComponentKind::Coordinator))?,
            report: report.clone(),
        };

        info!(
            coordinator = %deployment.coordinator.address,
            duration_ms = report.duration_ms,
            "Provisioning completed"
        );
        Ok(deployment)
    }

    async fn run_stage(
        &self,
        stage: &PlannedStage,
        components: &mut Components,
        applied: &mut usize,
        total_weights: usize,
    ) -> Result<StageOutcome, StageFailure> {
        match stage {
            PlannedStage::CreateDataHandler => {
                self.create(components, ComponentKind::DataHandler, Vec::new())
                    .await
            }
            PlannedStage::CreateIncentiveMechanism(params) => {
                self.create(components, ComponentKind::IncentiveMechanism, params.args())
                    .await
            }
            PlannedStage::CreateClassifier {
                labels,
                initial,
                bias,
                learning_rate,
            } => {
                let args = vec![
                    Arg::StringArray(labels.clone()),
                    Arg::IntArray(initial.values.clone()),
                    Arg::Int(*bias),
                    Arg::Int(*learning_rate),
                ];
                let outcome = self.create(components, ComponentKind::Classifier, args).await?;
                *applied = initial.len();
                obs::emit_weights_applied(0, initial.len(), *applied, total_weights);
                Ok(outcome)
            }
            PlannedStage::ApplyWeights(chunk) => {
                let classifier = components.require(ComponentKind::Classifier)?;
                let args = vec![
                    Arg::Uint(chunk.start_offset as u64),
                    Arg::IntArray(chunk.values.clone()),
                ];
                let confirmation = self
                    .client
                    .invoke(classifier, methods::INITIALIZE_WEIGHTS, args, self.resource_limit)
                    .await?;
                *applied = chunk.end_offset();
                obs::emit_weights_applied(chunk.start_offset, chunk.len(), *applied, total_weights);
                Ok(StageOutcome {
                    address: None,
                    transactions: vec![confirmation.transaction],
                })
            }
            PlannedStage::CreateCoordinator => {
                let args = vec![
                    Arg::Address(components.require(ComponentKind::DataHandler)?.address.clone()),
                    Arg::Address(
                        components
                            .require(ComponentKind::IncentiveMechanism)?
                            .address
                            .clone(),
                    ),
                    Arg::Address(components.require(ComponentKind::Classifier)?.address.clone()),
                ];
                self.create(components, ComponentKind::Coordinator, args)
                    .await
            }
            PlannedStage::TransferControl => self.transfer_control(components).await,
        }
    }

    async fn create(
        &self,
        components: &mut Components,
        kind: ComponentKind,
        args: Vec<Arg>,
    ) -> Result<StageOutcome, StageFailure> {
        let handle = self.client.create(kind, args, self.resource_limit).await?;
        obs::emit_component_deployed(kind.name(), handle.address.as_str());

        let outcome = StageOutcome {
            address: Some(handle.address.clone()),
            transactions: vec![handle.transaction.clone()],
        };
        *components.slot(kind) = Some(handle);
        Ok(outcome)
    }

    /// Hand all three leaf components to the coordinator.
    ///
    /// The transfers are independent and issued together; the stage only
    /// succeeds once all three are confirmed.
    async fn transfer_control(&self, components: &Components) -> Result<StageOutcome, StageFailure> {
        let coordinator = components.require(ComponentKind::Coordinator)?;
        let targets = [
            components.require(ComponentKind::DataHandler)?,
            components.require(ComponentKind::IncentiveMechanism)?,
            components.require(ComponentKind::Classifier)?,
        ];

        let results = join_all(targets.into_iter().map(|target| {
            let args = vec![Arg::Address(coordinator.address.clone())];
            async move {
                let result = self
                    .client
                    .invoke(target, methods::TRANSFER_OWNERSHIP, args, self.resource_limit)
                    .await;
                (target.kind, result)
            }
        }))
        .await;

        let mut transferred = Vec::new();
        let mut transactions = Vec::new();
        let mut failed = Vec::new();
        for (kind, result) in results {
            match result {
                Ok(confirmation) => {
                    obs::emit_control_transferred(kind.name(), coordinator.address.as_str());
                    transferred.push(kind);
                    transactions.push(confirmation.transaction);
                }
                Err(err) => failed.push((kind, err)),
            }
        }

        if !failed.is_empty() {
            return Err(StageFailure::PartialTransfer {
                transferred,
                failed,
            });
        }

        Ok(StageOutcome {
            address: None,
            transactions,
        })
    }
}

/// The component a stage creates, if it creates one.
fn created_kind(stage: &StageId) -> Option<ComponentKind> {
    match stage {
        StageId::CreateDataHandler => Some(ComponentKind::DataHandler),
        StageId::CreateIncentiveMechanism => Some(ComponentKind::IncentiveMechanism),
        StageId::CreateClassifier => Some(ComponentKind::Classifier),
        StageId::CreateCoordinator => Some(ComponentKind::Coordinator),
        StageId::ApplyWeights { .. } | StageId::TransferControl => None,
    }
}
