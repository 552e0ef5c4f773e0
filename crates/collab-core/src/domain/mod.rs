//! Deployment domain types.

pub mod chunk;
pub mod descriptor;
pub mod error;
pub mod fixed_point;

pub use chunk::Chunk;
pub use descriptor::{ModelDescriptor, ModelRecord};
pub use error::ConversionError;
pub use fixed_point::{FixedPointScalar, FixedPointVector, Scale, DEFAULT_SCALE};
