//! Utility functions for the fusion pipeline.

pub mod angles;

pub use angles::wrap_angle;
