//! Horizontal-flip geometric correction.
//!
//! A model pass over a mirrored image produces channels in the mirrored
//! frame. [`FlipCorrector`] brings one such bundle back into the original
//! frame so it can be averaged with the unflipped pass.

use crate::channels::ChannelSet;
use crate::core::config::RotationKind;
use crate::core::errors::FusionResult;
use crate::core::tensor::mirror_horizontal;
use crate::utils::angles::wrap_angle;
use ndarray::{s, Zip};
use std::f32::consts::PI;

/// Applies horizontal-flip correction to one inference's channel bundle.
///
/// Pure function of one bundle to one bundle; the only failure mode is a
/// schema violation, which [`ChannelSet::new`] re-checks on reassembly.
///
/// Per-channel behavior:
/// - `heatmap`, `depth`, `size`: spatial mirror only.
/// - `offset`: spatial mirror, then the horizontal component becomes
///   `1 - value` (the sub-pixel offset is measured from the opposite cell
///   edge after mirroring).
/// - `rotation` (`trig` only): spatial mirror, then the yaw pair is rebuilt
///   from the negated `atan2(sin, cos)` angle, and the roll pair is rebuilt
///   through the wrap-compose sequence `wrap(roll, -pi)`, negate,
///   `wrap(roll, +pi)`. The double composition reflects the roll reference
///   axis itself flipping under mirroring; it is matched against the
///   reference implementation, not derived here.
/// - `rotation` (`euler`/`quat`): spatial mirror only. These encodings are
///   not flip-corrected, a known limitation of the configuration space.
/// - `translation`: spatial mirror, then the x component is negated.
/// - `mask`: passed through untouched; augmentation fusing keeps the
///   unflipped pass's mask regardless.
#[derive(Debug, Default)]
pub struct FlipCorrector;

impl FlipCorrector {
    /// Creates a new flip corrector.
    pub fn new() -> Self {
        Self
    }

    /// Returns `channels` aligned to the unmirrored frame.
    pub fn correct(&self, channels: &ChannelSet) -> FusionResult<ChannelSet> {
        let schema = channels.schema();

        let heatmap = mirror_horizontal(&channels.heatmap);
        let depth = mirror_horizontal(&channels.depth);
        let size = channels.size.as_ref().map(mirror_horizontal);

        let mut offset = mirror_horizontal(&channels.offset);
        offset
            .index_axis_mut(ndarray::Axis(0), 0)
            .mapv_inplace(|v| 1.0 - v);

        let mut rotation = mirror_horizontal(&channels.rotation);
        if schema.rotation == RotationKind::Trig {
            correct_trig_rotation(&mut rotation);
        }

        let translation = channels.translation.as_ref().map(|tvec| {
            let mut tvec = mirror_horizontal(tvec);
            tvec.index_axis_mut(ndarray::Axis(0), 0)
                .mapv_inplace(|v| -v);
            tvec
        });

        ChannelSet::new(
            schema,
            heatmap,
            offset,
            depth,
            rotation,
            size,
            translation,
            channels.mask.clone(),
        )
    }
}

/// Rebuilds the yaw and roll cos/sin pairs of an already-mirrored trig
/// rotation tensor. Channels 2-3 are untouched.
fn correct_trig_rotation(rotation: &mut crate::core::tensor::Tensor3D) {
    let (yaw_cos, yaw_sin) = rotation.multi_slice_mut((s![0, .., ..], s![1, .., ..]));
    Zip::from(yaw_cos).and(yaw_sin).for_each(|cos_v, sin_v| {
        // Mirroring reverses the yaw sign.
        let yaw = -(*sin_v).atan2(*cos_v);
        *cos_v = yaw.cos();
        *sin_v = yaw.sin();
    });

    let (roll_cos, roll_sin) = rotation.multi_slice_mut((s![4, .., ..], s![5, .., ..]));
    Zip::from(roll_cos).and(roll_sin).for_each(|cos_v, sin_v| {
        let roll = (*sin_v).atan2(*cos_v);
        let roll = wrap_angle(roll, -PI);
        let roll = -roll;
        let roll = wrap_angle(roll, PI);
        *cos_v = roll.cos();
        *sin_v = roll.sin();
    });
}
