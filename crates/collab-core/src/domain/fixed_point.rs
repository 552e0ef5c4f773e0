//! Fixed-point values as they cross into the remote environment.
//!
//! The remote components have no fractional number type. Weights, the
//! intercept and the learning rate are sent as integers scaled by a shared
//! factor. The factor itself is never transmitted: the remote side assumes
//! [`DEFAULT_SCALE`], so the two must stay in lockstep.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::error::ConversionError;

/// Multiplier applied to every decimal before it is sent to a remote component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Scale(i64);

/// Scale assumed by the deployed classifier components (1e9).
pub const DEFAULT_SCALE: Scale = Scale(1_000_000_000);

impl Scale {
    /// Create a scale, rejecting zero and negative factors.
    pub fn new(factor: i64) -> Result<Self, ConversionError> {
        if factor <= 0 {
            return Err(ConversionError::InvalidScale(factor));
        }
        Ok(Scale(factor))
    }

    pub fn get(self) -> i64 {
        self.0
    }

    /// Largest absolute error introduced by rounding, in the decimal domain.
    pub fn resolution(self) -> f64 {
        0.5 / self.0 as f64
    }
}

impl Default for Scale {
    fn default() -> Self {
        DEFAULT_SCALE
    }
}

impl TryFrom<i64> for Scale {
    type Error = ConversionError;

    fn try_from(factor: i64) -> Result<Self, Self::Error> {
        Scale::new(factor)
    }
}

impl From<Scale> for i64 {
    fn from(scale: Scale) -> Self {
        scale.0
    }
}

impl std::fmt::Display for Scale {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single scaled decimal, used for the intercept and the learning rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedPointScalar {
    value: i64,
    scale: Scale,
}

impl FixedPointScalar {
    /// Wrap an integer that is already scaled by `scale`.
    pub fn from_scaled(value: i64, scale: Scale) -> Self {
        Self { value, scale }
    }

    pub fn value(&self) -> i64 {
        self.value
    }

    pub fn scale(&self) -> Scale {
        self.scale
    }
}

/// Ordered scaled weights. Same length and order as the decimal source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedPointVector {
    values: Vec<i64>,
    scale: Scale,
}

impl FixedPointVector {
    /// Wrap integers that are already scaled by `scale`.
    pub fn from_scaled(values: Vec<i64>, scale: Scale) -> Self {
        Self { values, scale }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn as_slice(&self) -> &[i64] {
        &self.values
    }

    pub fn scale(&self) -> Scale {
        self.scale
    }

    pub fn into_values(self) -> Vec<i64> {
        self.values
    }

    /// SHA-256 over the big-endian encoding of every element, hex encoded.
    ///
    /// Identical model sources converted with the same scale always share a
    /// digest, which lets two deployments be compared without the full vector.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.scale.get().to_be_bytes());
        for value in &self.values {
            hasher.update(value.to_be_bytes());
        }
        hex::encode(hasher.finalize())
    }
}
