//! Conversion error taxonomy.

/// Errors produced while mapping decimals into the fixed-point domain.
///
/// Any of these aborts a deployment before a single remote call is made.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConversionError {
    #[error("non-finite value {value} cannot be converted to fixed point")]
    NonFinite { value: f64 },

    #[error("value {value} scaled by {scale} does not fit in a signed 64-bit integer")]
    OutOfRange { value: f64, scale: i64 },

    #[error("fixed-point scale must be positive, got {0}")]
    InvalidScale(i64),

    #[error("element {index}: {source}")]
    Element {
        index: usize,
        #[source]
        source: Box<ConversionError>,
    },
}

impl ConversionError {
    /// Attach the position of the offending element within a vector.
    pub fn at(self, index: usize) -> Self {
        ConversionError::Element {
            index,
            source: Box::new(self),
        }
    }
}
