//! Deployment configuration loaded from TOML.
//!
//! Every section is optional; missing values fall back to the reference
//! IMDB sentiment deployment.
//!
//! ```toml
//! [model]
//! name = "IMDB Review Sentiment Classifier"
//! source = "models/imdb-sentiment-model.json"
//! labels = ["Negative", "Positive"]
//!
//! [batching]
//! initial_chunk_size = 250
//! update_chunk_size = 250
//!
//! [chain]
//! relay_url = "http://127.0.0.1:8545"
//! ```

use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::batch::BatchPlanner;
use crate::domain::{ModelDescriptor, Scale, DEFAULT_SCALE};

/// Errors that can occur when loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read configuration {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level deployment configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployConfig {
    pub model: ModelSection,
    pub fixed_point: FixedPointSection,
    pub batching: BatchingSection,
    pub incentive: IncentiveSection,
    pub chain: ChainSection,
    pub registry: RegistrySection,
}

/// Model metadata, coefficient source and classifier hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSection {
    pub name: String,
    pub description: String,
    pub accuracy: String,
    pub model_type: String,
    pub encoder: String,
    /// Path to the `{coef, intercept}` JSON file.
    pub source: PathBuf,
    /// Classification labels, in the order the classifier indexes them.
    pub labels: Vec<String>,
    pub learning_rate: f64,
}

impl Default for ModelSection {
    fn default() -> Self {
        Self {
            name: "IMDB Review Sentiment Classifier".to_string(),
            description: "A simple IMDB sentiment analysis model.".to_string(),
            accuracy: "0.829".to_string(),
            model_type: "Classifier64".to_string(),
            encoder: "IMDB vocab".to_string(),
            source: PathBuf::from("models/imdb-sentiment-model.json"),
            labels: vec!["Negative".to_string(), "Positive".to_string()],
            learning_rate: 0.5,
        }
    }
}

impl ModelSection {
    pub fn descriptor(&self) -> ModelDescriptor {
        ModelDescriptor {
            name: self.name.clone(),
            description: self.description.clone(),
            accuracy: self.accuracy.clone(),
            model_type: self.model_type.clone(),
            encoder: self.encoder.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FixedPointSection {
    pub scale: i64,
}

impl Default for FixedPointSection {
    fn default() -> Self {
        Self {
            scale: DEFAULT_SCALE.get(),
        }
    }
}

/// Chunk sizes for classifier creation and for each incremental update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchingSection {
    pub initial_chunk_size: usize,
    pub update_chunk_size: usize,
}

impl Default for BatchingSection {
    fn default() -> Self {
        Self {
            initial_chunk_size: 250,
            update_chunk_size: 250,
        }
    }
}

/// Incentive mechanism constructor parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IncentiveSection {
    pub refund_wait_secs: u64,
    pub owner_claim_wait_secs: u64,
    pub any_address_claim_wait_secs: u64,
    /// Deposit cost weight in the smallest unit of the native currency.
    pub cost_weight: u64,
}

impl Default for IncentiveSection {
    fn default() -> Self {
        // Short waits suit test networks.
        Self {
            refund_wait_secs: 15,
            owner_claim_wait_secs: 20,
            any_address_claim_wait_secs: 20,
            cost_weight: 1_000_000_000_000_000,
        }
    }
}

/// Remote relay settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainSection {
    pub relay_url: String,
    /// Upper bound on the cost of each creation or call.
    pub resource_limit: u64,
    /// Optional bound on each relay request. Unset means wait for the relay
    /// to confirm, however long that takes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
}

impl Default for ChainSection {
    fn default() -> Self {
        Self {
            relay_url: "http://127.0.0.1:8545".to_string(),
            resource_limit: 7_900_000,
            request_timeout_secs: None,
        }
    }
}

/// Model index settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrySection {
    pub base_url: String,
    pub request_timeout_secs: u64,
}

impl Default for RegistrySection {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5387".to_string(),
            request_timeout_secs: 30,
        }
    }
}

impl DeployConfig {
    /// Parse configuration from TOML text and validate it.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: DeployConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Check the invariants that would otherwise surface as remote failures.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model.labels.len() < 2 {
            return Err(ConfigError::Invalid(format!(
                "at least two labels are required, got {}",
                self.model.labels.len()
            )));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = self.model.labels.iter().find(|l| !seen.insert(l.as_str())) {
            return Err(ConfigError::Invalid(format!("duplicate label '{}'", dup)));
        }
        if !self.model.learning_rate.is_finite() {
            return Err(ConfigError::Invalid("learning_rate must be finite".to_string()));
        }
        if self.model.accuracy.parse::<f64>().is_err() {
            return Err(ConfigError::Invalid(format!(
                "accuracy '{}' is not a decimal",
                self.model.accuracy
            )));
        }
        if self.fixed_point.scale <= 0 {
            return Err(ConfigError::Invalid(format!(
                "fixed_point.scale must be positive, got {}",
                self.fixed_point.scale
            )));
        }
        if self.batching.initial_chunk_size == 0 || self.batching.update_chunk_size == 0 {
            return Err(ConfigError::Invalid(
                "chunk sizes must be greater than zero".to_string(),
            ));
        }
        if self.chain.resource_limit == 0 {
            return Err(ConfigError::Invalid(
                "chain.resource_limit must be greater than zero".to_string(),
            ));
        }
        if self.chain.relay_url.trim().is_empty() {
            return Err(ConfigError::Invalid("chain.relay_url is empty".to_string()));
        }
        if self.registry.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("registry.base_url is empty".to_string()));
        }
        Ok(())
    }

    pub fn scale(&self) -> Result<Scale, ConfigError> {
        Scale::new(self.fixed_point.scale).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    pub fn planner(&self) -> Result<BatchPlanner, ConfigError> {
        let initial = NonZeroUsize::new(self.batching.initial_chunk_size);
        let update = NonZeroUsize::new(self.batching.update_chunk_size);
        match (initial, update) {
            (Some(initial), Some(update)) => Ok(BatchPlanner::new(initial, update)),
            _ => Err(ConfigError::Invalid(
                "chunk sizes must be greater than zero".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_reference_deployment() {
        let config = DeployConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.model.labels, vec!["Negative", "Positive"]);
        assert_eq!(config.fixed_point.scale, 1_000_000_000);
        assert_eq!(config.batching.initial_chunk_size, 250);
        assert_eq!(config.incentive.refund_wait_secs, 15);
        assert_eq!(config.incentive.any_address_claim_wait_secs, 20);
        assert_eq!(config.chain.resource_limit, 7_900_000);
        assert_eq!(config.model.descriptor().model_type, "Classifier64");
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = DeployConfig::from_toml_str("").expect("parse");
        assert_eq!(config, DeployConfig::default());
    }

    #[test]
    fn test_partial_override() {
        let config = DeployConfig::from_toml_str(
            r#"
            [model]
            name = "Spam Filter"
            labels = ["ham", "spam", "unsure"]

            [batching]
            update_chunk_size = 100
            "#,
        )
        .expect("parse");
        assert_eq!(config.model.name, "Spam Filter");
        assert_eq!(config.model.labels.len(), 3);
        assert_eq!(config.model.encoder, "IMDB vocab");
        assert_eq!(config.batching.initial_chunk_size, 250);
        assert_eq!(config.batching.update_chunk_size, 100);

        let planner = config.planner().expect("planner");
        assert_eq!(planner.update_size(), 100);
    }

    #[test]
    fn test_rejects_single_label() {
        let err = DeployConfig::from_toml_str("[model]\nlabels = [\"only\"]").expect_err("invalid");
        assert!(err.to_string().contains("at least two labels"));
    }

    #[test]
    fn test_rejects_duplicate_labels() {
        let err =
            DeployConfig::from_toml_str("[model]\nlabels = [\"a\", \"b\", \"a\"]").expect_err("dup");
        assert!(err.to_string().contains("duplicate label 'a'"));
    }

    #[test]
    fn test_rejects_zero_chunk_size() {
        let err =
            DeployConfig::from_toml_str("[batching]\ninitial_chunk_size = 0").expect_err("zero");
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_non_positive_scale() {
        let err = DeployConfig::from_toml_str("[fixed_point]\nscale = 0").expect_err("scale");
        assert!(err.to_string().contains("scale"));
    }

    #[test]
    fn test_rejects_bad_accuracy() {
        let err = DeployConfig::from_toml_str("[model]\naccuracy = \"high\"").expect_err("acc");
        assert!(err.to_string().contains("accuracy"));
    }

    #[test]
    fn test_parse_error() {
        let err = DeployConfig::from_toml_str("[model\nname = ").expect_err("syntax");
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(file, "[chain]\nrelay_url = \"http://relay:9000\"").expect("write");
        let config = DeployConfig::load(file.path()).expect("load");
        assert_eq!(config.chain.relay_url, "http://relay:9000");
    }

    #[test]
    fn test_relay_timeout_is_opt_in() {
        let config = DeployConfig::default();
        assert_eq!(config.chain.request_timeout_secs, None);

        let config =
            DeployConfig::from_toml_str("[chain]\nrequest_timeout_secs = 900").expect("parse");
        assert_eq!(config.chain.request_timeout_secs, Some(900));
    }
}
