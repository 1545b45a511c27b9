//! # Packed score lanes
//!
//! Thin wrappers around `wide::f32x8` used by the vectorised inner loops. All helpers have a
//! scalar equivalent and produce bit-identical results to it, so the scalar remainder loops in
//! the kernels can share one code path with the packed body.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use wide::f32x8;

// -----------------------------------------------------------------------------------------------
// CONSTANTS
// -----------------------------------------------------------------------------------------------

/// Number of score lanes processed per vector operation.
pub const LANES: usize = 8;

// -----------------------------------------------------------------------------------------------
// FUNCTIONS
// -----------------------------------------------------------------------------------------------

/// Load 8 consecutive f32 values into a vector.
#[inline]
pub fn load(slice: &[f32]) -> f32x8 {
    f32x8::from([
        slice[0], slice[1], slice[2], slice[3], slice[4], slice[5], slice[6], slice[7],
    ])
}

/// Store all 8 lanes back to a slice.
#[inline]
pub fn store(v: f32x8, slice: &mut [f32]) {
    slice[..LANES].copy_from_slice(&v.to_array());
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------
