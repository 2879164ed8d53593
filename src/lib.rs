//! # Pose Fusion
//!
//! Fusion, ensembling and caching pipeline for the raw tensor outputs of a
//! 6-DoF pose-detection model.
//!
//! The model itself, the heatmap-to-3D decoder and the spatial suppression
//! algorithm are external collaborators (see [`pipeline::collaborators`]).
//! This crate owns everything between raw inference output and the final
//! ranked detection list:
//!
//! - test-time flip augmentation with rotation-aware geometric correction
//! - cross-validation fold ensembling (running weighted average per image)
//! - duplicate-image consolidation
//! - resumable disk caching of the fused tensors
//! - decoding, suppression and score thresholding into final detections
//!
//! ## Modules
//!
//! * [`core`] - Error handling, configuration and tensor aliases
//! * [`channels`] - The fixed-schema per-image channel bundle
//! * [`fusion`] - Flip correction, augmentation fusing, fold accumulation,
//!   duplicate consolidation, caching and finalization
//! * [`pipeline`] - End-to-end orchestration and collaborator traits
//! * [`utils`] - Angle helpers used by flip correction

pub mod channels;
pub mod core;
pub mod fusion;
pub mod pipeline;
pub mod utils;

/// Prelude module for convenient imports.
pub mod prelude {
    // Error handling
    pub use crate::core::{FusionError, FusionResult};

    // Configuration
    pub use crate::core::config::{PipelineConfig, RotationKind};

    // Channel bundle
    pub use crate::channels::{ChannelSchema, ChannelSet, MaskRule};

    // Fusion stages
    pub use crate::fusion::{
        AugmentationFuser, DetectionFinalizer, DuplicateConsolidator, FinalizedDetections,
        FlipCorrector, FoldAccumulator, FusedOutputs, FusionCache,
    };

    // Pipeline (high-level API)
    pub use crate::pipeline::collaborators::{
        Decoder, ImageBatch, ModelProvider, PoseModel, Suppressor,
    };
    pub use crate::pipeline::{FusionPipeline, PipelineOutput};
}
