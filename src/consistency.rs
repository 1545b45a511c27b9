//! # Back-match consistency checking
//!
//! Local, stateless validation of selected disparities. The horizontal check compares the
//! reference-based and target-based arg-mins of one row scan; the vertical check is a
//! whole-frame post-pass against a disparity field computed along the columns from a third
//! ("top") view. Rejected pixels are written as the `0.0` sentinel.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use crate::disparity::DisparityMap;
use crate::select::Selection;

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

pub struct ConsistencyChecker {
    tolerance: usize,
    horizontal: bool,
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl ConsistencyChecker {
    pub fn new(tolerance: usize, horizontal: bool) -> Self {
        Self {
            tolerance,
            horizontal,
        }
    }

    /// Accept a selection if the two matching directions agree within the tolerance.
    #[inline]
    pub fn accept(&self, sel: &Selection) -> bool {
        if !self.horizontal {
            return true;
        }

        let diff = if sel.index > sel.back_index {
            sel.index - sel.back_index
        } else {
            sel.back_index - sel.index
        };
        diff <= self.tolerance
    }
}

/// Invalidate disparities that disagree with a vertically-computed field.
///
/// `vertical` is the map produced by matching the transposed left view against the transposed
/// top view, so `vertical.get(v, u)` is the vertical disparity at pixel `(u, v)` of the
/// original orientation. For a rectified three-camera rig both fields measure the same
/// baseline-normalised shift, so an accepted horizontal disparity `d` at `(u, v)` must agree
/// with the vertical disparity recorded at the implied row `v - round(d)`. A sentinel in the
/// vertical field counts as disagreement.
pub fn vertical_back_match(map: &mut DisparityMap, vertical: &DisparityMap, tolerance: usize) {
    let width = map.width();
    let height = map.height();

    for v in 0..height {
        for u in 0..width {
            let d = map.get(u, v);
            if d == 0.0 {
                continue;
            }

            let implied = v as isize - d.round() as isize;
            let agreed = implied >= 0 && {
                let dv = vertical.get(implied as usize, u);
                dv != 0.0 && (d - dv).abs() <= tolerance as f32 + 0.5
            };

            if !agreed {
                map.put(u, v, 0.0);
            }
        }
    }
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------
