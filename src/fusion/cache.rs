//! Run-name-addressed disk cache of the fold-fused mapping.
//!
//! The presence of a cache record is the single resume signal: a hit
//! bypasses every fold inference pass. The record is a bincode snapshot of
//! the whole mapping. Run names must encode every option that changes fused
//! tensors (see `PipelineConfig::run_name`); reusing a name across different
//! configurations silently serves stale tensors, since no content hashing
//! guards the record.

use crate::core::errors::{FusionError, FusionResult};
use crate::fusion::folds::FusedOutputs;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

/// Persists and loads fused mappings under a root directory.
#[derive(Debug, Clone)]
pub struct FusionCache {
    root: PathBuf,
}

impl FusionCache {
    /// Creates a cache rooted at `root`. The directory is created lazily on
    /// the first store.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Path of the record for `run_name`.
    pub fn record_path(&self, run_name: &str) -> PathBuf {
        self.root.join(format!("{run_name}.bin"))
    }

    /// Loads the mapping persisted under `run_name`, or `None` when no
    /// record exists (a typed cache miss, not an error).
    pub fn load(&self, run_name: &str) -> FusionResult<Option<FusedOutputs>> {
        let path = self.record_path(run_name);
        if !path.exists() {
            tracing::debug!(run_name, path = %path.display(), "fusion cache miss");
            return Ok(None);
        }
        tracing::info!(run_name, path = %path.display(), "fusion cache hit");
        let file = File::open(&path).map_err(FusionError::CacheIo)?;
        let reader = BufReader::new(file);
        let outputs =
            bincode::deserialize_from(reader).map_err(|e| FusionError::CacheEncoding(e))?;
        Ok(Some(outputs))
    }

    /// Persists the mapping wholesale under `run_name`, replacing any
    /// previous record.
    pub fn store(&self, run_name: &str, outputs: &FusedOutputs) -> FusionResult<()> {
        fs::create_dir_all(&self.root).map_err(FusionError::CacheIo)?;
        let path = self.record_path(run_name);
        let file = File::create(&path).map_err(FusionError::CacheIo)?;
        let writer = BufWriter::new(file);
        bincode::serialize_into(writer, outputs).map_err(|e| FusionError::CacheEncoding(e))?;
        tracing::info!(
            run_name,
            images = outputs.len(),
            path = %path.display(),
            "stored fusion cache record"
        );
        Ok(())
    }

    /// The cache root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }
}
