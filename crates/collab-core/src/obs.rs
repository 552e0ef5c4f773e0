//! Structured lifecycle events for a provisioning run.
//!
//! Every stage logs when it starts and how it ends, and every created
//! component logs its address immediately, so a failed run's output shows
//! which stage broke and what was already deployed.

use tracing::{info, warn};

/// RAII guard that tags every log line of a deployment with its id and model.
pub struct ProvisionSpan {
    _span: tracing::span::EnteredSpan,
}

impl ProvisionSpan {
    pub fn enter(deployment_id: &str, model_name: &str) -> Self {
        Self {
            _span: provision_span(deployment_id, model_name).entered(),
        }
    }
}

/// Span for one deployment, for use with `tracing::Instrument` across awaits.
pub fn provision_span(deployment_id: &str, model_name: &str) -> tracing::Span {
    tracing::info_span!(
        "collab.deploy",
        deployment_id = %deployment_id,
        model = %model_name
    )
}

pub fn emit_stage_started(stage: &str) {
    info!(event = "stage.started", stage = %stage);
}

pub fn emit_stage_completed(stage: &str, duration_ms: u64) {
    info!(event = "stage.completed", stage = %stage, duration_ms = duration_ms);
}

pub fn emit_stage_failed(stage: &str, error: &dyn std::fmt::Display) {
    tracing::error!(event = "stage.failed", stage = %stage, error = %error);
}

/// Emit event: a remote component now exists at `address`.
pub fn emit_component_deployed(component: &str, address: &str) {
    info!(event = "component.deployed", component = %component, address = %address);
}

/// Emit event: a weight chunk was applied; `applied` is the running total.
pub fn emit_weights_applied(offset: usize, count: usize, applied: usize, total: usize) {
    info!(
        event = "weights.applied",
        offset = offset,
        count = count,
        applied = applied,
        total = total,
    );
}

pub fn emit_control_transferred(component: &str, new_owner: &str) {
    info!(event = "control.transferred", component = %component, new_owner = %new_owner);
}

pub fn emit_registration_succeeded(address: &str) {
    info!(event = "registration.succeeded", address = %address);
}

/// Emit event: registration failed but the run continues (relaxed mode).
pub fn emit_registration_skipped(error: &dyn std::fmt::Display) {
    warn!(event = "registration.skipped", error = %error);
}

pub fn emit_registration_failed(error: &dyn std::fmt::Display) {
    tracing::error!(event = "registration.failed", error = %error);
}
