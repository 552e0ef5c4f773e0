//! The ordered provisioning plan.
//!
//! A plan is a static, total order of stages fixed once the labels and the
//! weight count are known. The provisioner executes it front to back and
//! never skips or reorders a stage.

use std::collections::HashSet;

use collab_chain::Arg;
use collab_core::{BatchPlanner, Chunk, FixedPointScalar, FixedPointVector, IncentiveSection};
use serde::{Deserialize, Serialize};

use crate::stage::StageId;

/// Errors raised while building a plan, before any remote call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    #[error("classifier needs at least two labels, got {0}")]
    TooFewLabels(usize),

    #[error("duplicate classification label '{0}'")]
    DuplicateLabel(String),

    #[error("model has no weights to deploy")]
    EmptyWeights,
}

/// Incentive mechanism constructor parameters.
///
/// Wait times share one unit (seconds). The remote component enforces any
/// ordering between them; it is not re-checked here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncentiveParams {
    pub refund_wait_secs: u64,
    pub owner_claim_wait_secs: u64,
    pub any_address_claim_wait_secs: u64,
    /// Deposit cost weight in the smallest unit of the native currency.
    pub cost_weight: u64,
}

impl IncentiveParams {
    /// Constructor arguments in the order the component expects them.
    pub fn args(&self) -> Vec<Arg> {
        vec![
            Arg::Uint(self.refund_wait_secs),
            Arg::Uint(self.owner_claim_wait_secs),
            Arg::Uint(self.any_address_claim_wait_secs),
            Arg::Uint(self.cost_weight),
        ]
    }
}

impl From<&IncentiveSection> for IncentiveParams {
    fn from(section: &IncentiveSection) -> Self {
        Self {
            refund_wait_secs: section.refund_wait_secs,
            owner_claim_wait_secs: section.owner_claim_wait_secs,
            any_address_claim_wait_secs: section.any_address_claim_wait_secs,
            cost_weight: section.cost_weight,
        }
    }
}

/// Classifier constructor parameters other than the weights.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifierParams {
    pub labels: Vec<String>,
    pub bias: FixedPointScalar,
    pub learning_rate: FixedPointScalar,
}

/// One step of the plan with everything it needs to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannedStage {
    CreateDataHandler,
    CreateIncentiveMechanism(IncentiveParams),
    CreateClassifier {
        labels: Vec<String>,
        initial: Chunk,
        bias: i64,
        learning_rate: i64,
    },
    ApplyWeights(Chunk),
    CreateCoordinator,
    TransferControl,
}

impl PlannedStage {
    pub fn id(&self) -> StageId {
        match self {
            PlannedStage::CreateDataHandler => StageId::CreateDataHandler,
            PlannedStage::CreateIncentiveMechanism(_) => StageId::CreateIncentiveMechanism,
            PlannedStage::CreateClassifier { .. } => StageId::CreateClassifier,
            PlannedStage::ApplyWeights(chunk) => StageId::ApplyWeights {
                offset: chunk.start_offset,
            },
            PlannedStage::CreateCoordinator => StageId::CreateCoordinator,
            PlannedStage::TransferControl => StageId::TransferControl,
        }
    }

    /// Number of weights this stage carries to the remote side.
    pub fn weight_count(&self) -> usize {
        match self {
            PlannedStage::CreateClassifier { initial, .. } => initial.len(),
            PlannedStage::ApplyWeights(chunk) => chunk.len(),
            _ => 0,
        }
    }
}

/// Ordered list of stages for one deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisioningPlan {
    stages: Vec<PlannedStage>,
    update_count: usize,
    total_weights: usize,
    weights_digest: String,
}

impl ProvisioningPlan {
    /// Build the plan: data handler, incentive mechanism, classifier seeded
    /// with the first chunk, one update per remaining chunk, coordinator,
    /// control transfer.
    pub fn build(
        incentive: IncentiveParams,
        classifier: ClassifierParams,
        weights: &FixedPointVector,
        planner: &BatchPlanner,
    ) -> Result<Self, PlanError> {
        validate_labels(&classifier.labels)?;

        let mut chunks = planner.plan(weights).into_iter();
        let initial = chunks.next().ok_or(PlanError::EmptyWeights)?;

        let mut stages = vec![
            PlannedStage::CreateDataHandler,
            PlannedStage::CreateIncentiveMechanism(incentive),
            PlannedStage::CreateClassifier {
                labels: classifier.labels,
                initial,
                bias: classifier.bias.value(),
                learning_rate: classifier.learning_rate.value(),
            },
        ];
        stages.extend(chunks.map(PlannedStage::ApplyWeights));
        stages.push(PlannedStage::CreateCoordinator);
        stages.push(PlannedStage::TransferControl);

        Ok(Self {
            stages,
            update_count: planner.update_calls(weights.len()),
            total_weights: weights.len(),
            weights_digest: weights.digest(),
        })
    }

    pub fn stages(&self) -> &[PlannedStage] {
        &self.stages
    }

    pub fn stage_ids(&self) -> Vec<StageId> {
        self.stages.iter().map(PlannedStage::id).collect()
    }

    /// Number of incremental weight updates after classifier creation.
    pub fn update_count(&self) -> usize {
        self.update_count
    }

    pub fn total_weights(&self) -> usize {
        self.total_weights
    }

    /// Digest of the full fixed-point weight vector.
    pub fn weights_digest(&self) -> &str {
        &self.weights_digest
    }
}

fn validate_labels(labels: &[String]) -> Result<(), PlanError> {
    if labels.len() < 2 {
        return Err(PlanError::TooFewLabels(labels.len()));
    }
    let mut seen = HashSet::new();
    for label in labels {
        if !seen.insert(label.as_str()) {
            return Err(PlanError::DuplicateLabel(label.clone()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use collab_core::DEFAULT_SCALE;
    use std::num::NonZeroUsize;

    fn incentive() -> IncentiveParams {
        IncentiveParams {
            refund_wait_secs: 15,
            owner_claim_wait_secs: 20,
            any_address_claim_wait_secs: 20,
            cost_weight: 1_000_000_000_000_000,
        }
    }

    fn classifier(labels: &[&str]) -> ClassifierParams {
        ClassifierParams {
            labels: labels.iter().map(|l| l.to_string()).collect(),
            bias: FixedPointScalar::from_scaled(-3, DEFAULT_SCALE),
            learning_rate: FixedPointScalar::from_scaled(500_000_000, DEFAULT_SCALE),
        }
    }

    fn weights(n: usize) -> FixedPointVector {
        FixedPointVector::from_scaled((0..n as i64).collect(), DEFAULT_SCALE)
    }

    fn planner(size: usize) -> BatchPlanner {
        BatchPlanner::uniform(NonZeroUsize::new(size).unwrap())
    }

    #[test]
    fn test_plan_order_for_600_weights() {
        let plan = ProvisioningPlan::build(
            incentive(),
            classifier(&["Negative", "Positive"]),
            &weights(600),
            &planner(250),
        )
        .expect("plan");

        assert_eq!(
            plan.stage_ids(),
            vec![
                StageId::CreateDataHandler,
                StageId::CreateIncentiveMechanism,
                StageId::CreateClassifier,
                StageId::ApplyWeights { offset: 250 },
                StageId::ApplyWeights { offset: 500 },
                StageId::CreateCoordinator,
                StageId::TransferControl,
            ]
        );
        let counts: Vec<usize> = plan.stages().iter().map(PlannedStage::weight_count).collect();
        assert_eq!(counts, vec![0, 0, 250, 250, 100, 0, 0]);
        assert_eq!(plan.update_count(), 2);
        assert_eq!(plan.total_weights(), 600);
        assert_eq!(plan.weights_digest(), weights(600).digest());
    }

    #[test]
    fn test_small_model_has_no_updates() {
        let plan = ProvisioningPlan::build(
            incentive(),
            classifier(&["a", "b"]),
            &weights(40),
            &planner(250),
        )
        .expect("plan");
        assert_eq!(plan.update_count(), 0);
        assert_eq!(plan.stages().len(), 5);
        match &plan.stages()[2] {
            PlannedStage::CreateClassifier {
                initial,
                bias,
                learning_rate,
                ..
            } => {
                assert_eq!(initial.len(), 40);
                assert_eq!(*bias, -3);
                assert_eq!(*learning_rate, 500_000_000);
            }
            other => panic!("unexpected stage: {other:?}"),
        }
    }

    #[test]
    fn test_update_count_matches_formula() {
        for n in [1usize, 249, 250, 251, 499, 500, 501, 1000, 1234] {
            let plan =
                ProvisioningPlan::build(incentive(), classifier(&["a", "b"]), &weights(n), &planner(250))
                    .expect("plan");
            let expected = n.saturating_sub(250).div_ceil(250);
            assert_eq!(plan.update_count(), expected, "n = {}", n);
            let update_stages = plan
                .stages()
                .iter()
                .filter(|s| matches!(s, PlannedStage::ApplyWeights(_)))
                .count();
            assert_eq!(update_stages, expected, "n = {}", n);

            if n > 250 {
                let last = plan
                    .stages()
                    .iter()
                    .rev()
                    .find(|s| matches!(s, PlannedStage::ApplyWeights(_)))
                    .expect("update stage");
                let remainder = (n - 250) % 250;
                let expected_len = if remainder == 0 { 250 } else { remainder };
                assert_eq!(last.weight_count(), expected_len, "n = {}", n);
            }
        }
    }

    #[test]
    fn test_rejects_single_label() {
        let err = ProvisioningPlan::build(incentive(), classifier(&["only"]), &weights(3), &planner(2))
            .expect_err("one label");
        assert_eq!(err, PlanError::TooFewLabels(1));
    }

    #[test]
    fn test_rejects_duplicate_labels() {
        let err = ProvisioningPlan::build(
            incentive(),
            classifier(&["yes", "no", "yes"]),
            &weights(3),
            &planner(2),
        )
        .expect_err("duplicate");
        assert_eq!(err, PlanError::DuplicateLabel("yes".to_string()));
    }

    #[test]
    fn test_rejects_empty_weights() {
        let err = ProvisioningPlan::build(incentive(), classifier(&["a", "b"]), &weights(0), &planner(2))
            .expect_err("empty");
        assert_eq!(err, PlanError::EmptyWeights);
    }

    #[test]
    fn test_incentive_args_order() {
        assert_eq!(
            incentive().args(),
            vec![
                Arg::Uint(15),
                Arg::Uint(20),
                Arg::Uint(20),
                Arg::Uint(1_000_000_000_000_000),
            ]
        );
    }
}
