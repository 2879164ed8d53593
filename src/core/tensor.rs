//! Tensor type aliases and small array helpers shared across the pipeline.
//!
//! Per-image channels are `(C, H, W)` arrays of f32; detection tables are
//! 2D arrays with one row per candidate.

use ndarray::s;

/// A 2-dimensional tensor represented as a 2D array of f32 values.
///
/// Used for detection tables (rows x columns).
pub type Tensor2D = ndarray::Array2<f32>;

/// A 3-dimensional tensor represented as a 3D array of f32 values.
///
/// Used for per-image channel planes laid out as `(channels, height, width)`.
pub type Tensor3D = ndarray::Array3<f32>;

/// Mirrors a `(C, H, W)` tensor along its horizontal (width) axis.
///
/// This is the spatial half of flip correction: the array produced by
/// inference on a mirrored image is brought back into the unmirrored frame
/// column order. Applying it twice recovers the original array exactly.
pub fn mirror_horizontal(tensor: &Tensor3D) -> Tensor3D {
    tensor.slice(s![.., .., ..;-1]).to_owned()
}
