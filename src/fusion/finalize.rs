//! Decoding, suppression and thresholding of fused bundles into final
//! detection tables.

use crate::channels::ChannelSet;
use crate::core::config::PipelineConfig;
use crate::core::errors::{FusionError, FusionResult};
use crate::core::tensor::Tensor2D;
use crate::fusion::folds::FusedOutputs;
use crate::pipeline::collaborators::{Decoder, Suppressor};
use ndarray::Axis;
use rayon::prelude::*;
use std::collections::BTreeMap;

/// Minimum number of columns in a detection table: 3 rotation values,
/// 3 position values and 1 confidence score.
pub const DETECTION_COLUMNS: usize = 7;

/// Column index of the confidence score.
pub const SCORE_COLUMN: usize = 6;

/// The finalized output for one image.
#[derive(Debug, Clone)]
pub struct FinalizedDetections {
    /// The full decoded table, before suppression and thresholding. Kept
    /// for the auditable per-image record.
    pub full: Tensor2D,
    /// The filtered table that feeds the submission row.
    pub kept: Tensor2D,
}

/// Turns each fused bundle into a final detection table via the external
/// decode and suppression collaborators.
pub struct DetectionFinalizer<'a> {
    decoder: &'a dyn Decoder,
    suppressor: &'a dyn Suppressor,
    suppression_threshold: Option<f32>,
    score_threshold: f32,
    min_samples: usize,
}

impl<'a> DetectionFinalizer<'a> {
    /// Creates a finalizer from the run configuration and the external
    /// collaborators. Suppression only runs when the configuration carries
    /// a distance threshold.
    pub fn new(
        config: &PipelineConfig,
        decoder: &'a dyn Decoder,
        suppressor: &'a dyn Suppressor,
    ) -> Self {
        Self {
            decoder,
            suppressor,
            suppression_threshold: config.suppression_threshold,
            score_threshold: config.score_threshold,
            min_samples: config.min_samples,
        }
    }

    /// Finalizes one image's fused bundle.
    ///
    /// A decode failure fails the run for this image rather than producing
    /// an empty row; downstream submission tables require one row per image.
    pub fn finalize_image(
        &self,
        image_id: &str,
        channels: &ChannelSet,
    ) -> FusionResult<FinalizedDetections> {
        let full = self.decoder.decode(channels)?;
        if full.ncols() < DETECTION_COLUMNS {
            return Err(FusionError::invalid_input(format!(
                "decoded table for {image_id:?} has {} columns, expected at least {DETECTION_COLUMNS}",
                full.ncols()
            )));
        }

        let working = match self.suppression_threshold {
            Some(threshold) => self.suppressor.suppress(full.clone(), threshold),
            None => full.clone(),
        };
        let kept = self.filter_by_score(&working);

        tracing::debug!(
            image_id,
            decoded = full.nrows(),
            kept = kept.nrows(),
            "finalized detections"
        );
        Ok(FinalizedDetections { full, kept })
    }

    /// Finalizes every image of a fused mapping, in parallel over image ids.
    ///
    /// Work partitions by image, never by channel, so each image's table
    /// commits as a unit. Any per-image failure fails the whole call.
    pub fn finalize_all(
        &self,
        outputs: &FusedOutputs,
    ) -> FusionResult<BTreeMap<String, FinalizedDetections>> {
        outputs
            .par_iter()
            .map(|(image_id, channels)| {
                let finalized = self.finalize_image(image_id, channels)?;
                Ok((image_id.clone(), finalized))
            })
            .collect()
    }

    /// Keeps rows above the score threshold; when that leaves fewer than
    /// `min_samples` rows, keeps the top `min_samples` rows by score
    /// instead. Selection is stable: ties and the final row order follow
    /// the order the decoder returned.
    fn filter_by_score(&self, table: &Tensor2D) -> Tensor2D {
        let passing: Vec<usize> = (0..table.nrows())
            .filter(|&row| table[[row, SCORE_COLUMN]] > self.score_threshold)
            .collect();

        if passing.len() >= self.min_samples {
            return table.select(Axis(0), &passing);
        }

        let mut order: Vec<usize> = (0..table.nrows()).collect();
        order.sort_by(|&a, &b| {
            table[[b, SCORE_COLUMN]]
                .partial_cmp(&table[[a, SCORE_COLUMN]])
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let mut top: Vec<usize> = order.into_iter().take(self.min_samples).collect();
        top.sort_unstable();
        table.select(Axis(0), &top)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::test_support::filled_trig_set;
    use crate::core::config::RotationKind;
    use ndarray::{array, Array2};

    /// Decoder that returns a fixed table regardless of input.
    struct FixedDecoder(Tensor2D);

    impl Decoder for FixedDecoder {
        fn decode(&self, _channels: &ChannelSet) -> FusionResult<Tensor2D> {
            Ok(self.0.clone())
        }
    }

    /// Suppressor that drops every other row, recording that it ran.
    struct HalvingSuppressor;

    impl Suppressor for HalvingSuppressor {
        fn suppress(&self, detections: Tensor2D, _distance_threshold: f32) -> Tensor2D {
            let rows: Vec<usize> = (0..detections.nrows()).step_by(2).collect();
            detections.select(Axis(0), &rows)
        }
    }

    fn config(score_threshold: f32, min_samples: usize, nms: Option<f32>) -> PipelineConfig {
        PipelineConfig {
            name: "test".to_string(),
            rotation: RotationKind::Trig,
            has_size: true,
            has_translation: true,
            n_folds: 1,
            hflip: false,
            uncropped: false,
            cross_validation: true,
            suppression_threshold: nms,
            score_threshold,
            min_samples,
        }
    }

    fn table_with_scores(scores: &[f32]) -> Tensor2D {
        Array2::from_shape_fn((scores.len(), DETECTION_COLUMNS), |(r, c)| {
            if c == SCORE_COLUMN {
                scores[r]
            } else {
                r as f32
            }
        })
    }

    #[test]
    fn test_rows_above_threshold_are_kept() {
        let decoder = FixedDecoder(table_with_scores(&[0.9, 0.5, 0.2]));
        let suppressor = HalvingSuppressor;
        let cfg = config(0.4, 1, None);
        let finalizer = DetectionFinalizer::new(&cfg, &decoder, &suppressor);

        let out = finalizer
            .finalize_image("img", &filled_trig_set(0.0, 2, 2))
            .unwrap();
        assert_eq!(out.kept.nrows(), 2);
        assert_eq!(out.kept[[0, SCORE_COLUMN]], 0.9);
        assert_eq!(out.kept[[1, SCORE_COLUMN]], 0.5);
        // Full table stays pre-threshold.
        assert_eq!(out.full.nrows(), 3);
    }

    #[test]
    fn test_fallback_to_top_min_samples() {
        // 5 rows all below threshold, min_samples = 2: keep the top 2.
        let decoder = FixedDecoder(table_with_scores(&[0.25, 0.1, 0.2, 0.05, 0.15]));
        let suppressor = HalvingSuppressor;
        let cfg = config(0.3, 2, None);
        let finalizer = DetectionFinalizer::new(&cfg, &decoder, &suppressor);

        let out = finalizer
            .finalize_image("img", &filled_trig_set(0.0, 2, 2))
            .unwrap();
        assert_eq!(out.kept.nrows(), 2);
        // Top-2 scores, emitted in original row order.
        assert_eq!(out.kept[[0, SCORE_COLUMN]], 0.25);
        assert_eq!(out.kept[[1, SCORE_COLUMN]], 0.2);
    }

    #[test]
    fn test_suppression_runs_only_when_configured() {
        let decoder = FixedDecoder(table_with_scores(&[0.9, 0.8, 0.7, 0.6]));
        let suppressor = HalvingSuppressor;

        let cfg = config(0.0, 0, Some(0.1));
        let finalizer = DetectionFinalizer::new(&cfg, &decoder, &suppressor);
        let out = finalizer
            .finalize_image("img", &filled_trig_set(0.0, 2, 2))
            .unwrap();
        assert_eq!(out.kept.nrows(), 2); // every other row dropped

        let cfg = config(0.0, 0, None);
        let finalizer = DetectionFinalizer::new(&cfg, &decoder, &suppressor);
        let out = finalizer
            .finalize_image("img", &filled_trig_set(0.0, 2, 2))
            .unwrap();
        assert_eq!(out.kept.nrows(), 4);
    }

    #[test]
    fn test_narrow_table_is_rejected() {
        let decoder = FixedDecoder(array![[1.0, 2.0, 3.0]]);
        let suppressor = HalvingSuppressor;
        let cfg = config(0.3, 1, None);
        let finalizer = DetectionFinalizer::new(&cfg, &decoder, &suppressor);
        assert!(matches!(
            finalizer.finalize_image("img", &filled_trig_set(0.0, 2, 2)),
            Err(FusionError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_finalize_all_covers_every_image() {
        let decoder = FixedDecoder(table_with_scores(&[0.9]));
        let suppressor = HalvingSuppressor;
        let cfg = config(0.3, 1, None);
        let finalizer = DetectionFinalizer::new(&cfg, &decoder, &suppressor);

        let mut outputs = FusedOutputs::new();
        for id in ["a", "b", "c"] {
            outputs.insert(id.to_string(), filled_trig_set(0.0, 2, 2));
        }
        let finalized = finalizer.finalize_all(&outputs).unwrap();
        assert_eq!(finalized.len(), 3);
        assert!(finalized.contains_key("b"));
    }
}
