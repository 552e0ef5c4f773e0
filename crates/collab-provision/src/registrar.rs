//! Registration of a deployed model with the external model index.
//!
//! Registration runs only after provisioning has fully succeeded. Whether a
//! failure here fails the whole run depends on [`RegistrationMode`].

use std::time::Duration;

use async_trait::async_trait;
use collab_core::{obs, ModelRecord};
use tracing::debug;

/// How registration failures are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RegistrationMode {
    /// A failed registration fails the run.
    #[default]
    Strict,
    /// A failed registration is logged and the run still succeeds.
    /// Used in CI where no index service is running.
    Relaxed,
}

impl RegistrationMode {
    /// Derive the mode from the value of the `CI` environment variable.
    ///
    /// Only the exact value `"true"` selects [`RegistrationMode::Relaxed`].
    pub fn from_ci_flag(value: Option<&str>) -> Self {
        match value {
            Some("true") => RegistrationMode::Relaxed,
            _ => RegistrationMode::Strict,
        }
    }
}

/// Errors talking to the model index.
#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    #[error("model index unreachable: {0}")]
    Transport(String),

    #[error("model index answered {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid model index url '{0}'")]
    InvalidUrl(String),
}

impl From<reqwest::Error> for RegistrationError {
    fn from(err: reqwest::Error) -> Self {
        RegistrationError::Transport(err.to_string())
    }
}

/// A catalog that accepts model records.
#[async_trait]
pub trait ModelIndex: Send + Sync {
    async fn submit(&self, record: &ModelRecord) -> Result<(), RegistrationError>;
}

/// The model index's HTTP API: `POST <base>/api/models` with a JSON record.
pub struct HttpModelIndex {
    endpoint: String,
    http_client: reqwest::Client,
}

impl HttpModelIndex {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, RegistrationError> {
        let base = base_url.trim().trim_end_matches('/');
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(RegistrationError::InvalidUrl(base_url.to_string()));
        }

        let http_client = reqwest::Client::builder()
            .user_agent(concat!("collab-provision/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        Ok(Self {
            endpoint: format!("{}/api/models", base),
            http_client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ModelIndex for HttpModelIndex {
    async fn submit(&self, record: &ModelRecord) -> Result<(), RegistrationError> {
        debug!(endpoint = %self.endpoint, name = %record.descriptor.name, "Submitting model record");

        let response = self.http_client.post(&self.endpoint).json(record).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RegistrationError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

/// Result of a registration attempt that did not fail the run.
#[derive(Debug)]
pub enum RegistrationOutcome {
    Registered,
    /// Relaxed mode swallowed this error.
    Skipped { error: RegistrationError },
}

impl RegistrationOutcome {
    pub fn is_registered(&self) -> bool {
        matches!(self, RegistrationOutcome::Registered)
    }
}

/// Submits records to a [`ModelIndex`] under a [`RegistrationMode`].
pub struct Registrar<'a> {
    index: &'a dyn ModelIndex,
    mode: RegistrationMode,
}

impl<'a> Registrar<'a> {
    pub fn new(index: &'a dyn ModelIndex, mode: RegistrationMode) -> Self {
        Self { index, mode }
    }

    /// Submit `record` once. No retries.
    pub async fn register(
        &self,
        record: &ModelRecord,
    ) -> Result<RegistrationOutcome, RegistrationError> {
        match self.index.submit(record).await {
            Ok(()) => {
                obs::emit_registration_succeeded(&record.address);
                Ok(RegistrationOutcome::Registered)
            }
            Err(error) => match self.mode {
                RegistrationMode::Relaxed => {
                    obs::emit_registration_skipped(&error);
                    Ok(RegistrationOutcome::Skipped { error })
                }
                RegistrationMode::Strict => {
                    obs::emit_registration_failed(&error);
                    Err(error)
                }
            },
        }
    }
}
