//! The fixed-schema per-image channel bundle.
//!
//! A [`ChannelSet`] holds every tensor the model emits for one image, plus
//! the geometry-only validity mask computed from the input. The set of
//! present optional channels is determined once per run by the configuration
//! and never varies per image; combining bundles with differing schemas is a
//! fatal schema mismatch.

use crate::core::config::RotationKind;
use crate::core::errors::{FusionError, FusionResult};
use crate::core::tensor::Tensor3D;
use serde::{Deserialize, Serialize};

/// The channel layout of one run, derived once from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSchema {
    /// Rotation encoding present in every bundle.
    pub rotation: RotationKind,
    /// Whether the 2-channel size head is present.
    pub has_size: bool,
    /// Whether the 3-channel translation head is present.
    pub has_translation: bool,
}

/// How [`ChannelSet::add_weighted`] treats the validity mask.
///
/// The mask depends only on input geometry, not on model weights, so the
/// stages disagree on what combining it means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskRule {
    /// Add `other.mask * weight` like any value channel. Used by duplicate
    /// consolidation, where group members are distinct photographs.
    Average,
    /// Replace the mask with `other`'s (last-writer-wins). Used by fold
    /// accumulation: every fold sees the same geometry, so the latest
    /// computed mask is the mask.
    Overwrite,
    /// Leave the mask untouched. Used by augmentation fusing, which keeps
    /// the unflipped pass's mask.
    Keep,
}

/// Per-image bundle of model output tensors plus the validity mask.
///
/// All channels are `(C, H, W)` arrays sharing the same spatial dimensions:
/// `heatmap (1)`, `offset (2)`, `depth (1)`, `rotation (3|6|4)`, optional
/// `size (2)` and `translation (3)`, and `mask (1)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelSet {
    schema: ChannelSchema,
    /// Per-pixel object-center confidence.
    pub heatmap: Tensor3D,
    /// Sub-pixel center offset, each component in `[0, 1)`.
    pub offset: Tensor3D,
    /// Scalar depth field.
    pub depth: Tensor3D,
    /// Rotation encoding channels, per `schema.rotation`.
    pub rotation: Tensor3D,
    /// Object size head, present iff `schema.has_size`.
    pub size: Option<Tensor3D>,
    /// Translation head, present iff `schema.has_translation`.
    pub translation: Option<Tensor3D>,
    /// Geometry-only validity mask.
    pub mask: Tensor3D,
}

fn check_channels(name: &str, tensor: &Tensor3D, channels: usize) -> FusionResult<()> {
    if tensor.shape()[0] != channels {
        return Err(FusionError::invalid_input(format!(
            "{name} must have {channels} channels, got {}",
            tensor.shape()[0]
        )));
    }
    Ok(())
}

fn check_spatial(name: &str, tensor: &Tensor3D, height: usize, width: usize) -> FusionResult<()> {
    let shape = tensor.shape();
    if shape[1] != height || shape[2] != width {
        return Err(FusionError::invalid_input(format!(
            "{name} spatial dims ({}, {}) do not match heatmap ({height}, {width})",
            shape[1], shape[2]
        )));
    }
    Ok(())
}

impl ChannelSet {
    /// Assembles and validates a bundle against the given schema.
    ///
    /// Channel counts, optional-head presence and spatial dimensions are all
    /// checked here so downstream arithmetic can rely on them.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        schema: ChannelSchema,
        heatmap: Tensor3D,
        offset: Tensor3D,
        depth: Tensor3D,
        rotation: Tensor3D,
        size: Option<Tensor3D>,
        translation: Option<Tensor3D>,
        mask: Tensor3D,
    ) -> FusionResult<Self> {
        check_channels("heatmap", &heatmap, 1)?;
        check_channels("offset", &offset, 2)?;
        check_channels("depth", &depth, 1)?;
        check_channels("rotation", &rotation, schema.rotation.channel_count())?;
        check_channels("mask", &mask, 1)?;

        match (&size, schema.has_size) {
            (Some(size), true) => check_channels("size", size, 2)?,
            (None, false) => {}
            (Some(_), false) => {
                return Err(FusionError::schema_mismatch(
                    "size channel present but schema has no size head",
                ));
            }
            (None, true) => {
                return Err(FusionError::schema_mismatch(
                    "schema has a size head but no size channel was provided",
                ));
            }
        }
        match (&translation, schema.has_translation) {
            (Some(tvec), true) => check_channels("translation", tvec, 3)?,
            (None, false) => {}
            (Some(_), false) => {
                return Err(FusionError::schema_mismatch(
                    "translation channel present but schema has no translation head",
                ));
            }
            (None, true) => {
                return Err(FusionError::schema_mismatch(
                    "schema has a translation head but no translation channel was provided",
                ));
            }
        }

        let (height, width) = (heatmap.shape()[1], heatmap.shape()[2]);
        check_spatial("offset", &offset, height, width)?;
        check_spatial("depth", &depth, height, width)?;
        check_spatial("rotation", &rotation, height, width)?;
        check_spatial("mask", &mask, height, width)?;
        if let Some(size) = &size {
            check_spatial("size", size, height, width)?;
        }
        if let Some(tvec) = &translation {
            check_spatial("translation", tvec, height, width)?;
        }

        Ok(Self {
            schema,
            heatmap,
            offset,
            depth,
            rotation,
            size,
            translation,
            mask,
        })
    }

    /// The schema this bundle was validated against.
    pub fn schema(&self) -> ChannelSchema {
        self.schema
    }

    /// Spatial dimensions `(height, width)` shared by every channel.
    pub fn spatial_dims(&self) -> (usize, usize) {
        (self.heatmap.shape()[1], self.heatmap.shape()[2])
    }

    /// Returns a schema mismatch error unless `other` has the same schema
    /// and spatial dimensions.
    pub fn ensure_compatible(&self, other: &ChannelSet) -> FusionResult<()> {
        if self.schema != other.schema {
            return Err(FusionError::schema_mismatch(format!(
                "cannot combine bundles with schemas {:?} and {:?}",
                self.schema, other.schema
            )));
        }
        if self.spatial_dims() != other.spatial_dims() {
            return Err(FusionError::schema_mismatch(format!(
                "cannot combine bundles with spatial dims {:?} and {:?}",
                self.spatial_dims(),
                other.spatial_dims()
            )));
        }
        Ok(())
    }

    /// A bundle of the same schema and shape with every channel zeroed,
    /// mask included. The neutral element for weighted accumulation.
    pub fn zeros_like(&self) -> ChannelSet {
        ChannelSet {
            schema: self.schema,
            heatmap: Tensor3D::zeros(self.heatmap.raw_dim()),
            offset: Tensor3D::zeros(self.offset.raw_dim()),
            depth: Tensor3D::zeros(self.depth.raw_dim()),
            rotation: Tensor3D::zeros(self.rotation.raw_dim()),
            size: self.size.as_ref().map(|s| Tensor3D::zeros(s.raw_dim())),
            translation: self
                .translation
                .as_ref()
                .map(|t| Tensor3D::zeros(t.raw_dim())),
            mask: Tensor3D::zeros(self.mask.raw_dim()),
        }
    }

    /// A copy with every value channel scaled by `weight`. The mask is
    /// cloned unscaled: it is geometry, not a model output.
    pub fn scaled(&self, weight: f32) -> ChannelSet {
        ChannelSet {
            schema: self.schema,
            heatmap: &self.heatmap * weight,
            offset: &self.offset * weight,
            depth: &self.depth * weight,
            rotation: &self.rotation * weight,
            size: self.size.as_ref().map(|s| s * weight),
            translation: self.translation.as_ref().map(|t| t * weight),
            mask: self.mask.clone(),
        }
    }

    /// Adds `other * weight` into this bundle, channel by channel, with the
    /// mask handled per `mask_rule`.
    pub fn add_weighted(
        &mut self,
        other: &ChannelSet,
        weight: f32,
        mask_rule: MaskRule,
    ) -> FusionResult<()> {
        self.ensure_compatible(other)?;

        self.heatmap.scaled_add(weight, &other.heatmap);
        self.offset.scaled_add(weight, &other.offset);
        self.depth.scaled_add(weight, &other.depth);
        self.rotation.scaled_add(weight, &other.rotation);
        if let (Some(size), Some(other_size)) = (self.size.as_mut(), other.size.as_ref()) {
            size.scaled_add(weight, other_size);
        }
        if let (Some(tvec), Some(other_tvec)) =
            (self.translation.as_mut(), other.translation.as_ref())
        {
            tvec.scaled_add(weight, other_tvec);
        }

        match mask_rule {
            MaskRule::Average => self.mask.scaled_add(weight, &other.mask),
            MaskRule::Overwrite => self.mask.assign(&other.mask),
            MaskRule::Keep => {}
        }

        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use ndarray::Array3;

    /// Builds a valid trig-rotation bundle where every channel is filled
    /// with `fill`, except the mask which is all ones.
    pub fn filled_trig_set(fill: f32, height: usize, width: usize) -> ChannelSet {
        let schema = ChannelSchema {
            rotation: RotationKind::Trig,
            has_size: true,
            has_translation: true,
        };
        ChannelSet::new(
            schema,
            Array3::from_elem((1, height, width), fill),
            Array3::from_elem((2, height, width), fill),
            Array3::from_elem((1, height, width), fill),
            Array3::from_elem((6, height, width), fill),
            Some(Array3::from_elem((2, height, width), fill)),
            Some(Array3::from_elem((3, height, width), fill)),
            Array3::ones((1, height, width)),
        )
        .expect("valid test bundle")
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::filled_trig_set;
    use super::*;
    use ndarray::Array3;

    #[test]
    fn test_new_rejects_wrong_rotation_channels() {
        let schema = ChannelSchema {
            rotation: RotationKind::Quat,
            has_size: false,
            has_translation: false,
        };
        let result = ChannelSet::new(
            schema,
            Array3::zeros((1, 4, 4)),
            Array3::zeros((2, 4, 4)),
            Array3::zeros((1, 4, 4)),
            Array3::zeros((6, 4, 4)), // quat expects 4
            None,
            None,
            Array3::zeros((1, 4, 4)),
        );
        assert!(matches!(result, Err(FusionError::InvalidInput { .. })));
    }

    #[test]
    fn test_new_rejects_missing_optional_head() {
        let schema = ChannelSchema {
            rotation: RotationKind::Euler,
            has_size: true,
            has_translation: false,
        };
        let result = ChannelSet::new(
            schema,
            Array3::zeros((1, 4, 4)),
            Array3::zeros((2, 4, 4)),
            Array3::zeros((1, 4, 4)),
            Array3::zeros((3, 4, 4)),
            None, // schema says size is present
            None,
            Array3::zeros((1, 4, 4)),
        );
        assert!(matches!(result, Err(FusionError::SchemaMismatch { .. })));
    }

    #[test]
    fn test_add_weighted_accumulates_values() {
        let mut acc = filled_trig_set(1.0, 2, 3);
        let other = filled_trig_set(4.0, 2, 3);
        acc.add_weighted(&other, 0.5, MaskRule::Keep).unwrap();

        assert_eq!(acc.heatmap[[0, 0, 0]], 3.0);
        assert_eq!(acc.depth[[0, 1, 2]], 3.0);
        assert_eq!(acc.rotation[[5, 0, 0]], 3.0);
        assert_eq!(acc.size.as_ref().unwrap()[[1, 0, 0]], 3.0);
        // Keep leaves the mask untouched.
        assert_eq!(acc.mask[[0, 0, 0]], 1.0);
    }

    #[test]
    fn test_add_weighted_mask_rules() {
        let mut averaged = filled_trig_set(0.0, 2, 2).zeros_like();
        let member = filled_trig_set(1.0, 2, 2);
        averaged
            .add_weighted(&member, 0.5, MaskRule::Average)
            .unwrap();
        assert_eq!(averaged.mask[[0, 0, 0]], 0.5);

        let mut overwritten = filled_trig_set(0.0, 2, 2);
        overwritten
            .add_weighted(&member, 0.5, MaskRule::Overwrite)
            .unwrap();
        assert_eq!(overwritten.mask[[0, 0, 0]], 1.0);
    }

    #[test]
    fn test_add_weighted_rejects_shape_mismatch() {
        let mut a = filled_trig_set(1.0, 2, 2);
        let b = filled_trig_set(1.0, 2, 3);
        assert!(matches!(
            a.add_weighted(&b, 1.0, MaskRule::Keep),
            Err(FusionError::SchemaMismatch { .. })
        ));
    }

    #[test]
    fn test_scaled_leaves_mask_unscaled() {
        let scaled = filled_trig_set(2.0, 2, 2).scaled(0.25);
        assert_eq!(scaled.heatmap[[0, 0, 0]], 0.5);
        assert_eq!(scaled.mask[[0, 0, 0]], 1.0);
    }
}
