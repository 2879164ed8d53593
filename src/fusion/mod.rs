//! Fusion stages: flip correction, augmentation fusing, fold accumulation,
//! duplicate consolidation, disk caching and detection finalization.
//!
//! Control flow over a run: per fold, per batch, inference feeds
//! [`AugmentationFuser`] (when flip TTA is on) and then [`FoldAccumulator`];
//! after all folds [`DuplicateConsolidator`] may run, [`FusionCache`]
//! persists the fused mapping, and [`DetectionFinalizer`] turns each fused
//! bundle into the final detection table.

pub mod augment;
pub mod cache;
pub mod duplicates;
pub mod finalize;
pub mod flip;
pub mod folds;

pub use augment::AugmentationFuser;
pub use cache::FusionCache;
pub use duplicates::DuplicateConsolidator;
pub use finalize::{DetectionFinalizer, FinalizedDetections, DETECTION_COLUMNS, SCORE_COLUMN};
pub use flip::FlipCorrector;
pub use folds::{FoldAccumulator, FusedOutputs};
