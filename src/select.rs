//! # Disparity selection
//!
//! Scans the aggregated cost row and picks, per window position, the disparity with the
//! minimal cost. The scan simultaneously maintains the target-based minima needed for the
//! horizontal back-match: a cost at position `i` and disparity index `d` is also a candidate
//! for the right-image window start `i + d - disparity_max`, and the running minimum over
//! those candidates is the cost the right image would pick. Positions without a valid right
//! counterpart carry infinite cost and lose every comparison.
//!
//! Tie-breaks are deterministic and deliberately opposite between the two directions: the
//! reference scan keeps the first (smallest index = largest disparity) minimum, while the
//! target-based scan keeps the earliest arrival, which is the smallest disparity. Ambiguous
//! flat regions therefore disagree and fail the back-match instead of matching by accident.

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// One position's selection result.
#[derive(Clone, Copy, Debug, Default)]
pub struct Selection {
    /// Reference-based arg-min over the disparity index range.
    pub index: usize,
    /// Target-based arg-min at the right window start this selection points at.
    pub back_index: usize,
    /// Disparity value including the sub-pixel offset.
    pub value: f32,
}

pub struct DisparitySelector {
    search: usize,
    disparity_max: usize,
}

/// Reused per-row scratch for the target-based minima.
pub struct SelectorScratch {
    right_min: Vec<f32>,
    right_arg: Vec<usize>,
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl DisparitySelector {
    pub fn new(search: usize, disparity_max: usize) -> Self {
        Self {
            search,
            disparity_max,
        }
    }

    pub fn scratch(&self, positions: usize) -> SelectorScratch {
        SelectorScratch {
            right_min: vec![f32::INFINITY; positions],
            right_arg: vec![0; positions],
        }
    }

    /// Select disparities for one aggregated cost row.
    ///
    /// `agg` holds `search` planes of `positions` costs indexed by window-start column; `out`
    /// receives one [`Selection`] per position.
    pub fn select_row(
        &self,
        agg: &[f32],
        positions: usize,
        scratch: &mut SelectorScratch,
        out: &mut [Selection],
    ) {
        debug_assert_eq!(agg.len(), self.search * positions);
        debug_assert_eq!(out.len(), positions);

        for slot in scratch.right_min.iter_mut() {
            *slot = f32::INFINITY;
        }

        for (i, sel) in out.iter_mut().enumerate() {
            let mut best = 0;
            let mut best_val = f32::INFINITY;

            for d in 0..self.search {
                let val = agg[d * positions + i];

                // First minimum wins in both directions; arrival order makes the
                // target-based scan favour the opposite end of the range.
                if val < best_val {
                    best_val = val;
                    best = d;
                }
                if i + d >= self.disparity_max {
                    let r = i + d - self.disparity_max;
                    if val < scratch.right_min[r] {
                        scratch.right_min[r] = val;
                        scratch.right_arg[r] = d;
                    }
                }
            }

            let delta = if best == 0 || best == self.search - 1 {
                0.0
            } else {
                let prev = agg[(best - 1) * positions + i];
                let next = agg[(best + 1) * positions + i];
                if prev.is_finite() && next.is_finite() {
                    subpixel_offset(prev, agg[best * positions + i], next)
                } else {
                    0.0
                }
            };

            sel.index = best;
            sel.value = (self.disparity_max - best) as f32 - delta;
        }

        // The target-based minima are only complete once every position has contributed.
        for (i, sel) in out.iter_mut().enumerate() {
            if i + sel.index >= self.disparity_max {
                sel.back_index = scratch.right_arg[i + sel.index - self.disparity_max];
            } else {
                sel.back_index = sel.index;
            }
        }
    }
}

/// Parabolic sub-pixel offset from the three-point neighbourhood of a cost minimum.
///
/// Guaranteed to lie in `(-0.5, 0.5]` whenever `mid` is the minimum of the three.
#[inline]
pub fn subpixel_offset(prev: f32, mid: f32, next: f32) -> f32 {
    0.5 * (prev - next) / ((prev - mid).max(next - mid) + 1.0)
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------
