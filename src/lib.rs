//! # Dense stereo matching
//!
//! This crate computes dense pixel-to-pixel disparity maps between rectified stereo image
//! rows using incremental windowed cost aggregation. Two aggregation strategies are provided:
//! plain sum-of-absolute-differences and edge-aware guided-filter weighting, both built on the
//! same O(1)-per-step sliding box filter and SIMD-vectorised scoring kernels. Selected
//! disparities are refined to sub-pixel precision and validated by horizontal (and optionally
//! vertical) back-matching.

// -----------------------------------------------------------------------------------------------
// MODULES
// -----------------------------------------------------------------------------------------------

mod boxfilter;
mod consistency;
mod cost;
mod disparity;
mod error;
mod frame;
mod score;
mod select;
mod simd;

pub mod guided;
pub mod matcher;
pub mod sad;

// -----------------------------------------------------------------------------------------------
// EXPORTS
// -----------------------------------------------------------------------------------------------

pub use crate::error::{Error, Result};

pub mod prelude {
    pub use crate::disparity::{AggregationStrategy, DisparityAlgorithm, DisparityMap};
    pub use crate::frame::{GrayFloatImage, StereoFrame};
    pub use crate::matcher::{Params, StereoMatcher};
}
