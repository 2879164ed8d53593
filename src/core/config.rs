//! Configuration consumed by the fusion pipeline.
//!
//! The pipeline does not own these options (they come from the training run
//! and the caller), but every stage reads them: the channel schema is derived
//! once from the rotation encoding and the optional heads, and the cache run
//! name is derived from exactly the options that change fused tensors.

use crate::channels::ChannelSchema;
use crate::core::errors::{FusionError, FusionResult};
use serde::{Deserialize, Serialize};

/// The rotation encoding emitted by the model, selected once per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RotationKind {
    /// Three Euler angle channels. Not flip-corrected (spatial mirror only).
    Euler,
    /// Six trigonometric channels: `[cos(yaw), sin(yaw), _, _, cos(roll), sin(roll)]`.
    /// Channels 2-3 are not used by flip correction.
    Trig,
    /// Four quaternion channels. Not flip-corrected (spatial mirror only).
    Quat,
}

impl RotationKind {
    /// Number of channels in this rotation encoding.
    pub fn channel_count(&self) -> usize {
        match self {
            RotationKind::Euler => 3,
            RotationKind::Trig => 6,
            RotationKind::Quat => 4,
        }
    }
}

impl std::fmt::Display for RotationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RotationKind::Euler => write!(f, "euler"),
            RotationKind::Trig => write!(f, "trig"),
            RotationKind::Quat => write!(f, "quat"),
        }
    }
}

/// Configuration for one fusion run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Base name of the run, typically the trained model name.
    pub name: String,
    /// Rotation encoding produced by the model.
    pub rotation: RotationKind,
    /// Whether the model emits the 2-channel size head.
    #[serde(default)]
    pub has_size: bool,
    /// Whether the model emits the 3-channel translation head.
    #[serde(default)]
    pub has_translation: bool,
    /// Number of cross-validation folds to ensemble.
    pub n_folds: usize,
    /// Whether to run horizontal-flip test-time augmentation.
    #[serde(default)]
    pub hflip: bool,
    /// Whether this run uses the uncropped image variant. Duplicate
    /// consolidation only applies to the cropped variant.
    #[serde(default)]
    pub uncropped: bool,
    /// When false, the pipeline short-circuits: it finalizes the first
    /// available fold's raw output and skips fold ensembling, duplicate
    /// consolidation and caching entirely.
    #[serde(default = "PipelineConfig::default_cross_validation")]
    pub cross_validation: bool,
    /// Distance threshold for the external suppression collaborator.
    /// `None` disables suppression.
    #[serde(default)]
    pub suppression_threshold: Option<f32>,
    /// Confidence threshold for the final score filter.
    pub score_threshold: f32,
    /// Minimum number of detections to keep per image. When fewer rows pass
    /// the score filter, the top rows by confidence are kept instead.
    #[serde(default)]
    pub min_samples: usize,
}

impl PipelineConfig {
    fn default_cross_validation() -> bool {
        true
    }

    /// Derives the fixed channel schema every `ChannelSet` of this run must
    /// carry.
    pub fn schema(&self) -> ChannelSchema {
        ChannelSchema {
            rotation: self.rotation,
            has_size: self.has_size,
            has_translation: self.has_translation,
        }
    }

    /// The cache run name.
    ///
    /// Encodes exactly the options that change the fused tensors: the base
    /// name, the fold count, the crop variant and flip augmentation. Reusing
    /// a base name across otherwise-different configurations is a correctness
    /// hazard; the cache does no content hashing.
    pub fn run_name(&self) -> String {
        let mut name = format!("{}_cv{}", self.name, self.n_folds);
        if self.uncropped {
            name.push_str("_uncropped");
        }
        if self.hflip {
            name.push_str("_hf");
        }
        name
    }

    /// The artifact name for decoded/filtered outputs.
    ///
    /// Extends [`run_name`](Self::run_name) with the thresholding parameters,
    /// which change the final detection list but not the fused tensors.
    pub fn artifact_name(&self) -> String {
        let mut name = format!("{}_{:.2}", self.run_name(), self.score_threshold);
        if let Some(th) = self.suppression_threshold {
            name.push_str(&format!("_nms{th:.2}"));
        }
        if self.min_samples > 0 {
            name.push_str(&format!("_min{}", self.min_samples));
        }
        name
    }

    /// Validates the configuration, returning a configuration error on the
    /// first invalid value.
    pub fn validate(&self) -> FusionResult<()> {
        if self.name.is_empty() {
            return Err(FusionError::config_error("run name must not be empty"));
        }
        if self.n_folds == 0 {
            return Err(FusionError::config_error("n_folds must be at least 1"));
        }
        if !self.score_threshold.is_finite() {
            return Err(FusionError::config_error(format!(
                "score_threshold must be finite, got {}",
                self.score_threshold
            )));
        }
        if let Some(th) = self.suppression_threshold {
            if !th.is_finite() || th <= 0.0 {
                return Err(FusionError::config_error(format!(
                    "suppression_threshold must be positive and finite, got {th}"
                )));
            }
        }
        Ok(())
    }
}
