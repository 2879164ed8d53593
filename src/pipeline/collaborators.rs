//! External collaborator seams.
//!
//! The neural network, the heatmap-to-3D decoder and the spatial suppression
//! algorithm are opaque to this crate; these traits pin down exactly the
//! contracts the fusion core depends on.

use crate::channels::ChannelSet;
use crate::core::errors::FusionResult;
use crate::core::tensor::Tensor2D;
use std::path::PathBuf;

/// One batch of test images, identified by id with their paths passed
/// through untouched (this crate performs no image I/O).
#[derive(Debug, Clone)]
pub struct ImageBatch {
    /// Image ids, one per batch item.
    pub image_ids: Vec<String>,
    /// Source paths, parallel to `image_ids`.
    pub image_paths: Vec<PathBuf>,
}

impl ImageBatch {
    /// Creates a batch from parallel id and path vectors.
    pub fn new(image_ids: Vec<String>, image_paths: Vec<PathBuf>) -> Self {
        Self {
            image_ids,
            image_paths,
        }
    }

    /// Number of items in the batch.
    pub fn len(&self) -> usize {
        self.image_ids.len()
    }

    /// Whether the batch is empty.
    pub fn is_empty(&self) -> bool {
        self.image_ids.is_empty()
    }
}

/// One fold's trained model.
///
/// `infer` must return one bundle per batch item, in batch order, already
/// matching the run's channel schema (mask included). With `hflip` set the
/// model runs on the horizontally mirrored input; the returned bundles are
/// then in the mirrored frame and the pipeline applies flip correction.
/// Assumed deterministic given identical weights and input.
pub trait PoseModel {
    /// Runs inference over one batch.
    fn infer(&self, batch: &ImageBatch, hflip: bool) -> FusionResult<Vec<ChannelSet>>;
}

/// Source of per-fold model checkpoints.
pub trait ModelProvider {
    /// Loads the model for `fold` (zero-based), or `None` when that fold's
    /// checkpoint is unavailable. A missing checkpoint is recoverable: the
    /// pipeline skips the fold's contribution and continues.
    fn load_fold(&self, fold: usize) -> FusionResult<Option<Box<dyn PoseModel>>>;
}

/// Decodes one fused bundle into a detection table.
///
/// Rows are `[rotation(3), position(3), score(1), ...]`, at least 7 columns,
/// expected in descending score order. The geometric projection is opaque
/// here.
pub trait Decoder: Send + Sync {
    /// Decodes the bundle into a detection table.
    fn decode(&self, channels: &ChannelSet) -> FusionResult<Tensor2D>;
}

/// Removes near-duplicate detections by a 3D distance metric.
pub trait Suppressor: Send + Sync {
    /// Returns the table with near-duplicates below `distance_threshold`
    /// removed. The algorithm is opaque here.
    fn suppress(&self, detections: Tensor2D, distance_threshold: f32) -> Tensor2D;
}
