//! # Error standards
//!
//! This module provides a standardised error enum and result type for this crate.

// -----------------------------------------------------------------------------------------------
// TYPES
// -----------------------------------------------------------------------------------------------

/// Standard result type used in the stereo crate.
pub type Result<T> = std::result::Result<T, Error>;

// -----------------------------------------------------------------------------------------------
// ENUMERATIONS
// -----------------------------------------------------------------------------------------------

#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The left/right (or left/top) views of a frame do not share the same dimensions.
    #[error(
        "the {name} image is {width}x{height} px but the left image is {left_width}x{left_height} px"
    )]
    SizeMismatch {
        name: &'static str,
        width: usize,
        height: usize,
        left_width: usize,
        left_height: usize,
    },

    /// A parameter combination that can never produce a meaningful match.
    #[error("invalid matching parameters: {0}")]
    InvalidParams(String),

    /// The configured window and clamp thresholds can exceed the exactly-representable
    /// integer range of an `f32` score accumulator.
    #[error(
        "score accumulation may overflow: window_size^2 x max element diff = {worst_case} \
         exceeds the exact f32 integer range ({limit})"
    )]
    OverflowRisk { worst_case: f64, limit: f64 },

    /// A window wider than the data it is slid over.
    #[error("input of length {len} is shorter than the box filter width {width}")]
    WindowTooWide { len: usize, width: usize },
}
