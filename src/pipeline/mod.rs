//! End-to-end orchestration: folds x batches x images.
//!
//! For each fold, each batch runs inference (plus the mirrored pass when
//! flip TTA is on), flip correction and augmentation fusing, and feeds the
//! fold accumulator. After all folds the duplicate consolidator may run, the
//! fused mapping is persisted, and the finalizer decodes it into detection
//! tables. A pre-existing cache record for the run name bypasses all fold
//! computation.

pub mod artifacts;
pub mod collaborators;

use crate::channels::ChannelSet;
use crate::core::config::PipelineConfig;
use crate::core::errors::{FusionError, FusionResult};
use crate::fusion::{
    AugmentationFuser, DetectionFinalizer, DuplicateConsolidator, FinalizedDetections,
    FlipCorrector, FoldAccumulator, FusedOutputs, FusionCache,
};
use collaborators::{Decoder, ImageBatch, ModelProvider, PoseModel, Suppressor};
use std::collections::BTreeMap;

/// Everything a finished run produces.
#[derive(Debug)]
pub struct PipelineOutput {
    /// The cache run name this output was computed (or resumed) under.
    pub run_name: String,
    /// The artifact name carrying the thresholding parameters.
    pub artifact_name: String,
    /// The fused per-image mapping the detections were decoded from.
    pub fused: FusedOutputs,
    /// Final detections per image id.
    pub detections: BTreeMap<String, FinalizedDetections>,
}

/// The fusion pipeline over a fixed configuration and its collaborators.
pub struct FusionPipeline<P, D, S> {
    config: PipelineConfig,
    provider: P,
    decoder: D,
    suppressor: S,
    cache: FusionCache,
    duplicates: Option<DuplicateConsolidator>,
    corrector: FlipCorrector,
    fuser: AugmentationFuser,
}

impl<P, D, S> FusionPipeline<P, D, S>
where
    P: ModelProvider,
    D: Decoder,
    S: Suppressor,
{
    /// Creates a pipeline after validating the configuration.
    pub fn new(
        config: PipelineConfig,
        provider: P,
        decoder: D,
        suppressor: S,
        cache: FusionCache,
    ) -> FusionResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            provider,
            decoder,
            suppressor,
            cache,
            duplicates: None,
            corrector: FlipCorrector::new(),
            fuser: AugmentationFuser::new(),
        })
    }

    /// Registers duplicate-image groups. Consolidation runs only for the
    /// cropped variant; the uncropped run goes straight to the cache.
    pub fn with_duplicate_groups(mut self, groups: Vec<Vec<String>>) -> Self {
        self.duplicates = Some(DuplicateConsolidator::new(groups));
        self
    }

    /// The run configuration.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Runs the full pipeline over `batches`.
    ///
    /// With `cross_validation` disabled the pipeline short-circuits to the
    /// first available fold's raw output, skipping ensembling, duplicate
    /// consolidation and caching entirely.
    pub fn run(&self, batches: &[ImageBatch]) -> FusionResult<PipelineOutput> {
        if !self.config.cross_validation {
            return self.run_single_fold(batches);
        }

        let run_name = self.config.run_name();
        let fused = match self.cache.load(&run_name)? {
            Some(fused) => fused,
            None => {
                let fused = self.fuse_folds(batches)?;
                self.cache.store(&run_name, &fused)?;
                fused
            }
        };
        self.finalize(fused)
    }

    /// Accumulates every available fold over all batches, then consolidates
    /// duplicates for the cropped variant.
    fn fuse_folds(&self, batches: &[ImageBatch]) -> FusionResult<FusedOutputs> {
        let image_ids: Vec<String> = batches
            .iter()
            .flat_map(|batch| batch.image_ids.iter().cloned())
            .collect();
        let mut accumulator = FoldAccumulator::new(self.config.n_folds, image_ids)?;

        let mut contributed = 0usize;
        for fold in 0..self.config.n_folds {
            let Some(model) = self.provider.load_fold(fold)? else {
                tracing::warn!(
                    fold = fold + 1,
                    n_folds = self.config.n_folds,
                    "fold checkpoint unavailable, skipping its contribution"
                );
                continue;
            };
            tracing::info!(fold = fold + 1, n_folds = self.config.n_folds, "accumulating fold");
            for batch in batches {
                for (image_id, channels) in self.infer_batch(model.as_ref(), batch)? {
                    accumulator.accumulate(&image_id, &channels)?;
                }
            }
            contributed += 1;
        }
        if contributed == 0 {
            return Err(FusionError::invalid_input(
                "no fold checkpoint was available",
            ));
        }

        let mut fused = accumulator.finish()?;
        if !self.config.uncropped {
            if let Some(duplicates) = &self.duplicates {
                duplicates.consolidate(&mut fused)?;
                tracing::info!(groups = duplicates.group_count(), "consolidated duplicates");
            }
        }
        Ok(fused)
    }

    /// Runs one model over one batch, applying flip TTA when configured.
    /// Returns one per-batch-item bundle, keyed by image id.
    fn infer_batch(
        &self,
        model: &dyn PoseModel,
        batch: &ImageBatch,
    ) -> FusionResult<Vec<(String, ChannelSet)>> {
        let originals = model.infer(batch, false)?;
        if originals.len() != batch.len() {
            return Err(FusionError::invalid_input(format!(
                "model returned {} bundles for a batch of {}",
                originals.len(),
                batch.len()
            )));
        }

        let fused_items = if self.config.hflip {
            let flipped = model.infer(batch, true)?;
            if flipped.len() != batch.len() {
                return Err(FusionError::invalid_input(format!(
                    "model returned {} mirrored bundles for a batch of {}",
                    flipped.len(),
                    batch.len()
                )));
            }
            originals
                .iter()
                .zip(&flipped)
                .map(|(original, mirrored)| {
                    let corrected = self.corrector.correct(mirrored)?;
                    self.fuser.fuse(original, &corrected)
                })
                .collect::<FusionResult<Vec<_>>>()?
        } else {
            originals
        };

        Ok(batch.image_ids.iter().cloned().zip(fused_items).collect())
    }

    /// Alternate terminal path: finalize the first available fold's raw
    /// per-image output without ensembling or caching.
    fn run_single_fold(&self, batches: &[ImageBatch]) -> FusionResult<PipelineOutput> {
        for fold in 0..self.config.n_folds {
            let Some(model) = self.provider.load_fold(fold)? else {
                tracing::warn!(fold = fold + 1, "fold checkpoint unavailable, trying next");
                continue;
            };
            tracing::info!(
                fold = fold + 1,
                "cross-validation disabled, finalizing single fold output"
            );
            let mut fused = FusedOutputs::new();
            for batch in batches {
                for (image_id, channels) in self.infer_batch(model.as_ref(), batch)? {
                    fused.insert(image_id, channels);
                }
            }
            return self.finalize(fused);
        }
        Err(FusionError::invalid_input(
            "no fold checkpoint was available",
        ))
    }

    fn finalize(&self, fused: FusedOutputs) -> FusionResult<PipelineOutput> {
        let finalizer = DetectionFinalizer::new(&self.config, &self.decoder, &self.suppressor);
        let detections = finalizer.finalize_all(&fused)?;
        Ok(PipelineOutput {
            run_name: self.config.run_name(),
            artifact_name: self.config.artifact_name(),
            fused,
            detections,
        })
    }
}
