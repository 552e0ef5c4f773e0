//! Collab Core - shared building blocks for collaborative classifier deployments
//!
//! Provides:
//! - The deployment domain model (model descriptors, fixed-point weights, chunks)
//! - Decimal to fixed-point conversion for an environment without fractional numbers
//! - Batch planning of large weight vectors under a per-operation resource ceiling
//! - Model source loading, deployment configuration and tracing setup

pub mod batch;
pub mod config;
pub mod convert;
pub mod domain;
pub mod model_source;
pub mod obs;
pub mod telemetry;

pub use batch::{plan, BatchPlanner};
pub use config::{
    BatchingSection, ChainSection, ConfigError, DeployConfig, FixedPointSection, IncentiveSection,
    ModelSection, RegistrySection,
};
pub use convert::{from_fixed_point, to_fixed_point, to_fixed_point_scalar, to_fixed_point_vector};
pub use domain::{
    Chunk, ConversionError, FixedPointScalar, FixedPointVector, ModelDescriptor, ModelRecord,
    Scale, DEFAULT_SCALE,
};
pub use model_source::{ModelSource, ModelSourceError};
pub use obs::{provision_span, ProvisionSpan};
pub use telemetry::{init_tracing, LogFormat};
