//! Trained model coefficients loaded from disk.
//!
//! The file is a JSON object with an ordered `coef` array and an
//! `intercept`. It is read once, before anything is deployed, and any
//! malformed content stops the run there.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

/// Errors raised while reading a model source file.
#[derive(Debug, thiserror::Error)]
pub enum ModelSourceError {
    #[error("failed to read model source {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed model source: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("model source has no coefficients")]
    EmptyCoefficients,
}

/// Linear model parameters in the decimal domain.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModelSource {
    pub coef: Vec<f64>,
    #[serde(deserialize_with = "deserialize_intercept")]
    pub intercept: f64,
}

// Exporters write the intercept either as a bare number or as a one-element array.
#[derive(Deserialize)]
#[serde(untagged)]
enum Intercept {
    Scalar(f64),
    Single([f64; 1]),
}

fn deserialize_intercept<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match Intercept::deserialize(deserializer)? {
        Intercept::Scalar(v) => v,
        Intercept::Single([v]) => v,
    })
}

impl ModelSource {
    /// Parse a model source from JSON text.
    pub fn from_json_str(content: &str) -> Result<Self, ModelSourceError> {
        let source: ModelSource = serde_json::from_str(content)?;
        if source.coef.is_empty() {
            return Err(ModelSourceError::EmptyCoefficients);
        }
        Ok(source)
    }

    /// Read and parse a model source file.
    pub fn load(path: &Path) -> Result<Self, ModelSourceError> {
        let content = std::fs::read_to_string(path).map_err(|source| ModelSourceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let source = Self::from_json_str(&content)?;
        debug!(path = ?path, weights = source.coef.len(), "Loaded model source");
        Ok(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_scalar_intercept() {
        let source = ModelSource::from_json_str(r#"{"coef": [0.5, -1.0], "intercept": 0.25}"#)
            .expect("parse");
        assert_eq!(source.coef, vec![0.5, -1.0]);
        assert_eq!(source.intercept, 0.25);
    }

    #[test]
    fn test_parse_array_intercept() {
        let source =
            ModelSource::from_json_str(r#"{"coef": [1.0], "intercept": [-0.75]}"#).expect("parse");
        assert_eq!(source.intercept, -0.75);
    }

    #[test]
    fn test_missing_intercept_is_malformed() {
        let err = ModelSource::from_json_str(r#"{"coef": [1.0]}"#).expect_err("should fail");
        assert!(matches!(err, ModelSourceError::Malformed(_)));
    }

    #[test]
    fn test_non_numeric_coefficient_is_malformed() {
        let err = ModelSource::from_json_str(r#"{"coef": [1.0, "x"], "intercept": 0}"#)
            .expect_err("should fail");
        assert!(matches!(err, ModelSourceError::Malformed(_)));
    }

    #[test]
    fn test_empty_coefficients_rejected() {
        let err = ModelSource::from_json_str(r#"{"coef": [], "intercept": 0}"#)
            .expect_err("should fail");
        assert!(matches!(err, ModelSourceError::EmptyCoefficients));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        write!(file, r#"{{"coef": [0.1, 0.2, 0.3], "intercept": 1.5}}"#).expect("write");

        let source = ModelSource::load(file.path()).expect("load");
        assert_eq!(source.coef.len(), 3);
        assert_eq!(source.intercept, 1.5);
    }

    #[test]
    fn test_load_missing_file() {
        let err = ModelSource::load(Path::new("/nonexistent/model.json")).expect_err("missing");
        assert!(matches!(err, ModelSourceError::Io { .. }));
    }
}
