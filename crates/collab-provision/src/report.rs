//! Deployment report: what ran, what was created, and where.
//!
//! The report is kept for failed runs too, so the addresses of components
//! created before the failure are available for manual cleanup.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use collab_chain::{Address, ComponentKind};
use serde::{Deserialize, Serialize};

use crate::stage::StageId;

pub const REPORT_SCHEMA_VERSION: &str = "1";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Completed,
    Failed,
}

/// Result of a single stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StageRecord {
    #[serde(flatten)]
    pub stage: StageId,

    pub status: StageStatus,

    /// Duration in milliseconds.
    pub duration_ms: u64,

    /// Address of the component this stage created, if any.
    pub address: Option<Address>,

    /// Transactions confirmed by this stage.
    pub transactions: Vec<String>,

    pub error: Option<String>,
}

impl StageRecord {
    pub fn passed(&self) -> bool {
        self.status == StageStatus::Completed
    }
}

/// A remote component created during the run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeployedComponent {
    pub kind: ComponentKind,
    pub address: Address,
}

/// Report of a complete or aborted provisioning run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeploymentReport {
    pub schema_version: String,
    pub deployment_id: String,
    pub generated_at: DateTime<Utc>,

    /// Digest of the fixed-point weight vector that was deployed.
    pub weights_digest: String,
    pub total_weights: usize,

    pub stages: Vec<StageRecord>,

    /// Components created so far, in creation order.
    pub deployed: Vec<DeployedComponent>,

    /// Whether every stage completed.
    pub success: bool,

    /// Total duration in milliseconds.
    pub duration_ms: u64,
}

impl DeploymentReport {
    pub fn new(deployment_id: &str, weights_digest: &str, total_weights: usize) -> Self {
        Self {
            schema_version: REPORT_SCHEMA_VERSION.to_string(),
            deployment_id: deployment_id.to_string(),
            generated_at: Utc::now(),
            weights_digest: weights_digest.to_string(),
            total_weights,
            stages: Vec::new(),
            deployed: Vec::new(),
            success: false,
            duration_ms: 0,
        }
    }

    /// Number of stages that completed.
    pub fn passed_count(&self) -> usize {
        self.stages.iter().filter(|s| s.passed()).count()
    }

    /// Number of stages that failed.
    pub fn failed_count(&self) -> usize {
        self.stages.iter().filter(|s| !s.passed()).count()
    }
}

/// Write the report as pretty JSON.
pub fn write_report_json(path: &Path, report: &DeploymentReport) -> Result<()> {
    let content = serde_json::to_string_pretty(report).context("serialize deployment report")?;
    std::fs::write(path, content).with_context(|| format!("write {:?}", path))?;
    Ok(())
}
