//! Running weighted average of channel bundles across cross-validation folds.

use crate::channels::{ChannelSet, MaskRule};
use crate::core::errors::{FusionError, FusionResult};
use std::collections::BTreeMap;

/// The fold-fused mapping from image id to channel bundle.
///
/// A `BTreeMap` so iteration (and therefore persistence and finalization)
/// is deterministic.
pub type FusedOutputs = BTreeMap<String, ChannelSet>;

/// Accumulates `bundle / n_folds` per image across fold inference passes.
///
/// Created once per run with the full image id set, mutated fold by fold and
/// batch by batch, then consumed by [`finish`](FoldAccumulator::finish) once
/// every fold has run. Accumulating the same image across all `n_folds`
/// folds yields the arithmetic mean of the fold outputs. Folds whose
/// checkpoint is missing contribute nothing and the denominator is not
/// corrected; the result is then an approximation the caller accepted by
/// skipping the fold.
///
/// Reading an entry mid-run would observe a partial, meaningless sum, so no
/// accessor is exposed; callers gate on completion by calling `finish`.
#[derive(Debug)]
pub struct FoldAccumulator {
    n_folds: usize,
    entries: BTreeMap<String, Option<ChannelSet>>,
}

impl FoldAccumulator {
    /// Creates an accumulator with a neutral entry per image id.
    pub fn new<I, S>(n_folds: usize, image_ids: I) -> FusionResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if n_folds == 0 {
            return Err(FusionError::config_error("n_folds must be at least 1"));
        }
        let entries: BTreeMap<String, Option<ChannelSet>> = image_ids
            .into_iter()
            .map(|id| (id.into(), None))
            .collect();
        if entries.is_empty() {
            return Err(FusionError::invalid_input(
                "fold accumulator needs at least one image id",
            ));
        }
        Ok(Self { n_folds, entries })
    }

    /// The weight applied to each fold contribution.
    pub fn fold_weight(&self) -> f32 {
        1.0 / self.n_folds as f32
    }

    /// Number of registered images.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no images are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Adds one fold's bundle for `image_id`, scaled by `1 / n_folds`.
    ///
    /// Value channels add; the mask is overwritten (last-writer-wins), since
    /// it depends only on input geometry and every fold computes the same
    /// one. All channels of one call commit together.
    pub fn accumulate(&mut self, image_id: &str, channels: &ChannelSet) -> FusionResult<()> {
        let weight = self.fold_weight();
        let slot = self.entries.get_mut(image_id).ok_or_else(|| {
            FusionError::invalid_input(format!(
                "image id {image_id:?} was not registered with the accumulator"
            ))
        })?;

        match slot {
            None => {
                // First contribution seeds the zero-initialized entry.
                *slot = Some(channels.scaled(weight));
            }
            Some(acc) => {
                acc.add_weighted(channels, weight, MaskRule::Overwrite)?;
            }
        }
        Ok(())
    }

    /// Consumes the accumulator and returns the fused mapping.
    ///
    /// Fails if any image never received a contribution (every fold skipped
    /// it): a fused mapping must cover every registered image.
    pub fn finish(self) -> FusionResult<FusedOutputs> {
        let mut missing = Vec::new();
        let mut fused = FusedOutputs::new();
        for (id, slot) in self.entries {
            match slot {
                Some(channels) => {
                    fused.insert(id, channels);
                }
                None => missing.push(id),
            }
        }
        if !missing.is_empty() {
            return Err(FusionError::incomplete(format!(
                "{} image(s) received no fold contribution: {:?}",
                missing.len(),
                missing
            )));
        }
        Ok(fused)
    }
}
