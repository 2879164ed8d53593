//! Core error handling, configuration and tensor types for the fusion pipeline.

pub mod config;
pub mod errors;
pub mod tensor;

pub use config::{PipelineConfig, RotationKind};
pub use errors::{FusionError, FusionResult, ProcessingStage};
pub use tensor::{Tensor2D, Tensor3D};
