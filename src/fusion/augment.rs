//! Fusing of the unflipped and flip-corrected augmentation passes.

use crate::channels::{ChannelSet, MaskRule};
use crate::core::errors::FusionResult;

/// Averages an unflipped bundle with a flip-corrected bundle for the same
/// image.
///
/// Every value channel becomes `(original + corrected) / 2`; the mask is
/// taken from the unflipped pass only, since the validity geometry is
/// augmentation-invariant. When flip TTA is disabled the pipeline never
/// produces a corrected pass and this stage is simply not invoked.
#[derive(Debug, Default)]
pub struct AugmentationFuser;

impl AugmentationFuser {
    /// Creates a new augmentation fuser.
    pub fn new() -> Self {
        Self
    }

    /// Returns the channel-wise mean of the two passes.
    pub fn fuse(&self, original: &ChannelSet, corrected: &ChannelSet) -> FusionResult<ChannelSet> {
        let mut fused = original.scaled(0.5);
        fused.add_weighted(corrected, 0.5, MaskRule::Keep)?;
        Ok(fused)
    }
}
