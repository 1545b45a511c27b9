//! # Score algebra
//!
//! Per-pixel dissimilarity primitives: bounded absolute difference with a clamp threshold and
//! convex blending of intensity and derivative scores. Every primitive exists scalarly and over
//! packed `f32x8` lanes with identical numeric results, so the row kernels can vectorise the
//! bulk of a row and fall back to the scalar form for the tail. All functions here are pure.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use wide::f32x8;

use crate::simd::{load, store, LANES};

// -----------------------------------------------------------------------------------------------
// SCALAR PRIMITIVES
// -----------------------------------------------------------------------------------------------

/// Absolute difference clamped to `cap`.
#[inline]
pub fn clamped_abs_diff(a: f32, b: f32, cap: f32) -> f32 {
    (a - b).abs().min(cap)
}

/// Convex combination `x + t * (y - x)`.
#[inline]
pub fn blend(x: f32, y: f32, t: f32) -> f32 {
    x + t * (y - x)
}

// -----------------------------------------------------------------------------------------------
// PACKED PRIMITIVES
// -----------------------------------------------------------------------------------------------

#[inline]
fn clamped_abs_diff_x8(a: f32x8, b: f32x8, cap: f32x8) -> f32x8 {
    (a - b).abs().min(cap)
}

#[inline]
fn blend_x8(x: f32x8, y: f32x8, t: f32x8) -> f32x8 {
    x + t * (y - x)
}

// -----------------------------------------------------------------------------------------------
// ROW KERNELS
// -----------------------------------------------------------------------------------------------

/// Fill `out` with clamped intensity scores for one disparity shift.
///
/// `out[x] = min(|left[x] - right[x - shift]|, cap)` for `x >= shift`; entries before the shift
/// have no valid counterpart in the right row and are zeroed.
pub fn score_row(left: &[f32], right: &[f32], shift: usize, cap: f32, out: &mut [f32]) {
    let width = left.len();
    for slot in out[..shift].iter_mut() {
        *slot = 0.0;
    }

    let cap_v = f32x8::splat(cap);
    let simd_end = shift + (width - shift) / LANES * LANES;

    let mut x = shift;
    while x < simd_end {
        let l = load(&left[x..]);
        let r = load(&right[x - shift..]);
        store(clamped_abs_diff_x8(l, r, cap_v), &mut out[x..]);
        x += LANES;
    }
    while x < width {
        out[x] = clamped_abs_diff(left[x], right[x - shift], cap);
        x += 1;
    }
}

/// Fill `out` with blended intensity + derivative scores for one disparity shift.
///
/// The intensity and derivative differences are clamped independently and combined with
/// `blend`: `t = 0` is intensity only, `t = 1` derivative only.
#[allow(clippy::too_many_arguments)]
pub fn score_row_blended(
    left: &[f32],
    right: &[f32],
    dleft: &[f32],
    dright: &[f32],
    shift: usize,
    cap_i: f32,
    cap_d: f32,
    t: f32,
    out: &mut [f32],
) {
    let width = left.len();
    for slot in out[..shift].iter_mut() {
        *slot = 0.0;
    }

    let cap_i_v = f32x8::splat(cap_i);
    let cap_d_v = f32x8::splat(cap_d);
    let t_v = f32x8::splat(t);
    let simd_end = shift + (width - shift) / LANES * LANES;

    let mut x = shift;
    while x < simd_end {
        let si = clamped_abs_diff_x8(load(&left[x..]), load(&right[x - shift..]), cap_i_v);
        let sd = clamped_abs_diff_x8(load(&dleft[x..]), load(&dright[x - shift..]), cap_d_v);
        store(blend_x8(si, sd, t_v), &mut out[x..]);
        x += LANES;
    }
    while x < width {
        let si = clamped_abs_diff(left[x], right[x - shift], cap_i);
        let sd = clamped_abs_diff(dleft[x], dright[x - shift], cap_d);
        out[x] = blend(si, sd, t);
        x += 1;
    }
}

/// Central-difference horizontal derivative of a row, zero at the two ends.
pub fn derivative_row(row: &[f32], out: &mut [f32]) {
    let width = row.len();
    out[0] = 0.0;
    if width > 1 {
        out[width - 1] = 0.0;
    }
    for x in 1..width.saturating_sub(1) {
        out[x] = 0.5 * (row[x + 1] - row[x - 1]);
    }
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_bounds_the_difference() {
        assert_eq!(clamped_abs_diff(10.0, 2.0, 5.0), 5.0);
        assert_eq!(clamped_abs_diff(2.0, 10.0, 5.0), 5.0);
        assert_eq!(clamped_abs_diff(4.0, 2.0, 5.0), 2.0);
    }

    #[test]
    fn blend_is_convex() {
        assert_eq!(blend(2.0, 6.0, 0.0), 2.0);
        assert_eq!(blend(2.0, 6.0, 1.0), 6.0);
        assert_eq!(blend(2.0, 6.0, 0.5), 4.0);
    }

    #[test]
    fn packed_row_matches_scalar_row() {
        // 21 columns: SIMD body plus a scalar tail.
        let left: Vec<f32> = (0..21).map(|x| ((x * 7 + 3) % 13) as f32).collect();
        let right: Vec<f32> = (0..21).map(|x| ((x * 5 + 1) % 11) as f32).collect();
        let shift = 3;
        let cap = 4.0;

        let mut out = vec![0.0; 21];
        score_row(&left, &right, shift, cap, &mut out);

        for x in 0..21 {
            let expect = if x < shift {
                0.0
            } else {
                clamped_abs_diff(left[x], right[x - shift], cap)
            };
            assert_eq!(out[x], expect, "column {}", x);
        }
    }

    #[test]
    fn blended_row_matches_scalar_formula() {
        let left: Vec<f32> = (0..19).map(|x| (x % 9) as f32).collect();
        let right: Vec<f32> = (0..19).map(|x| ((x * 3) % 7) as f32).collect();
        let mut dleft = vec![0.0; 19];
        let mut dright = vec![0.0; 19];
        derivative_row(&left, &mut dleft);
        derivative_row(&right, &mut dright);

        let mut out = vec![0.0; 19];
        score_row_blended(&left, &right, &dleft, &dright, 2, 3.0, 2.0, 0.25, &mut out);

        for x in 2..19 {
            let si = clamped_abs_diff(left[x], right[x - 2], 3.0);
            let sd = clamped_abs_diff(dleft[x], dright[x - 2], 2.0);
            assert_eq!(out[x], blend(si, sd, 0.25), "column {}", x);
        }
    }

    #[test]
    fn derivative_is_central_difference() {
        let row = [1.0, 4.0, 9.0, 16.0, 25.0];
        let mut out = [0.0; 5];
        derivative_row(&row, &mut out);
        assert_eq!(out, [0.0, 4.0, 6.0, 8.0, 0.0]);
    }
}
