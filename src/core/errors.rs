//! Error types for the fusion pipeline.
//!
//! This module defines the error types that can occur while fusing,
//! ensembling, caching and finalizing model outputs, together with helper
//! constructors for creating them with appropriate context.

use thiserror::Error;

/// Enum representing different stages of the fusion pipeline.
///
/// Used to identify which stage an error occurred in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStage {
    /// Error occurred during horizontal-flip correction.
    FlipCorrection,
    /// Error occurred while fusing augmented passes.
    Augmentation,
    /// Error occurred during fold accumulation.
    FoldAccumulation,
    /// Error occurred during duplicate consolidation.
    Consolidation,
    /// Error occurred while finalizing detections.
    Finalization,
    /// Generic processing error.
    Generic,
}

impl std::fmt::Display for ProcessingStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessingStage::FlipCorrection => write!(f, "flip correction"),
            ProcessingStage::Augmentation => write!(f, "augmentation fusing"),
            ProcessingStage::FoldAccumulation => write!(f, "fold accumulation"),
            ProcessingStage::Consolidation => write!(f, "duplicate consolidation"),
            ProcessingStage::Finalization => write!(f, "finalization"),
            ProcessingStage::Generic => write!(f, "processing"),
        }
    }
}

/// Enum representing the errors that can occur in the fusion pipeline.
#[derive(Error, Debug)]
pub enum FusionError {
    /// Two channel bundles with differing schemas were combined. The channel
    /// schema is fixed per run, so this indicates a configuration invariant
    /// violated upstream and is always fatal.
    #[error("schema mismatch: {message}")]
    SchemaMismatch {
        /// A message describing the mismatch.
        message: String,
    },

    /// Error indicating invalid input.
    #[error("invalid input: {message}")]
    InvalidInput {
        /// A message describing the invalid input.
        message: String,
    },

    /// Error indicating a configuration problem.
    #[error("configuration: {message}")]
    Config {
        /// A message describing the configuration error.
        message: String,
    },

    /// A fused result was requested before every image received at least one
    /// fold contribution.
    #[error("incomplete fusion: {message}")]
    Incomplete {
        /// A message naming the missing images.
        message: String,
    },

    /// Error occurred during a specific pipeline stage.
    #[error("{stage} failed: {context}")]
    Processing {
        /// The stage where the error occurred.
        stage: ProcessingStage,
        /// Additional context about the error.
        context: String,
        /// The underlying error that caused this error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// I/O error while reading or writing a cache record or artifact.
    #[error("cache io")]
    CacheIo(#[source] std::io::Error),

    /// Error while encoding or decoding a persisted record.
    #[error("cache encoding")]
    CacheEncoding(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Error propagated from the external decode collaborator.
    #[error("decode")]
    Decode(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Error propagated from the external model inference collaborator.
    #[error("inference")]
    Inference(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Convenient result alias for fusion operations.
pub type FusionResult<T> = Result<T, FusionError>;

impl FusionError {
    /// Creates a schema mismatch error with the given message.
    pub fn schema_mismatch(message: impl Into<String>) -> Self {
        FusionError::SchemaMismatch {
            message: message.into(),
        }
    }

    /// Creates an invalid input error with the given message.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        FusionError::InvalidInput {
            message: message.into(),
        }
    }

    /// Creates a configuration error with the given message.
    pub fn config_error(message: impl Into<String>) -> Self {
        FusionError::Config {
            message: message.into(),
        }
    }

    /// Creates an incomplete-fusion error with the given message.
    pub fn incomplete(message: impl Into<String>) -> Self {
        FusionError::Incomplete {
            message: message.into(),
        }
    }

    /// Creates a processing error for the given stage with context and an
    /// underlying source error.
    pub fn processing(
        stage: ProcessingStage,
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        FusionError::Processing {
            stage,
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// Wraps an error from the external decode collaborator.
    pub fn decode_error(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        FusionError::Decode(Box::new(source))
    }

    /// Wraps an error from the external inference collaborator.
    pub fn inference_error(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        FusionError::Inference(Box::new(source))
    }
}
