//! # Cost volume construction
//!
//! Builds, one input row at a time, the per-column per-disparity dissimilarity sums that the
//! aggregation strategies filter into a cost row. The vertical dimension is handled
//! incrementally: the first `window` rows of a frame seed the per-column sums (Init), every
//! later row adds itself and subtracts the row `window` rows above (Update), and once a full
//! window is covered the sums are ready for the horizontal pass (Ready). Emitted cost rows
//! therefore lag the input by `window - 1` rows.
//!
//! Disparity index `d` encodes the shift `disparity_max - d`, so index 0 is the largest
//! disparity in the search range.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use crate::boxfilter::SlidingColumnSum;
use crate::score;

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// Immutable description of how score rows are produced and stacked.
pub struct CostVolumeBuilder {
    window: usize,
    search: usize,
    disparity_max: usize,
    cap_i: f32,
    cap_d: f32,
    blend: f32,
}

/// Mutable per-run scratch for one cost volume.
pub struct CostVolumeState {
    width: usize,
    /// Scores of the most recently pushed row, `search` planes of `width` values.
    scores: Vec<f32>,
    dleft: Vec<f32>,
    dright: Vec<f32>,
    vertical: SlidingColumnSum,
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl CostVolumeBuilder {
    pub fn new(
        window: usize,
        search: usize,
        disparity_max: usize,
        cap_i: f32,
        cap_d: f32,
        blend: f32,
    ) -> Self {
        Self {
            window,
            search,
            disparity_max,
            cap_i,
            cap_d,
            blend,
        }
    }

    /// Allocate scratch for rows of the given width.
    pub fn state(&self, width: usize) -> CostVolumeState {
        CostVolumeState {
            width,
            scores: vec![0.0; width * self.search],
            dleft: vec![0.0; width],
            dright: vec![0.0; width],
            vertical: SlidingColumnSum::new(self.window, width * self.search),
        }
    }

    /// Score one input row pair and fold it into the vertical sums.
    ///
    /// Returns true once the sums cover a full vertical window; from then on every call emits
    /// one ready cost row.
    pub fn push_row(&self, left_row: &[f32], right_row: &[f32], state: &mut CostVolumeState) -> bool {
        let width = state.width;
        debug_assert_eq!(left_row.len(), width);

        if self.blend > 0.0 {
            score::derivative_row(left_row, &mut state.dleft);
            score::derivative_row(right_row, &mut state.dright);
        }

        for d in 0..self.search {
            let shift = self.disparity_max - d;
            let plane = &mut state.scores[d * width..(d + 1) * width];

            if self.blend > 0.0 {
                score::score_row_blended(
                    left_row,
                    right_row,
                    &state.dleft,
                    &state.dright,
                    shift,
                    self.cap_i,
                    self.cap_d,
                    self.blend,
                    plane,
                );
            } else {
                score::score_row(left_row, right_row, shift, self.cap_i, plane);
            }
        }

        state.vertical.push(&state.scores)
    }
}

impl CostVolumeState {
    pub fn reset(&mut self) {
        self.vertical.clear();
    }

    /// Scores of the most recently pushed row (one plane of `width` values per disparity).
    pub fn row_scores(&self) -> &[f32] {
        &self.scores
    }

    /// Vertical window sums, laid out like [`row_scores`](Self::row_scores).
    pub fn column_sums(&self) -> &[f32] {
        self.vertical.sums()
    }

    pub fn width(&self) -> usize {
        self.width
    }
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::clamped_abs_diff;

    fn builder() -> CostVolumeBuilder {
        CostVolumeBuilder::new(3, 4, 5, 20.0, 10.0, 0.0)
    }

    fn left_row(y: usize, width: usize) -> Vec<f32> {
        (0..width).map(|x| ((x * 5 + y * 11 + 2) % 19) as f32).collect()
    }

    fn right_row(y: usize, width: usize) -> Vec<f32> {
        (0..width).map(|x| ((x * 3 + y * 7 + 1) % 17) as f32).collect()
    }

    #[test]
    fn no_output_during_init_rows() {
        let b = builder();
        let mut state = b.state(16);

        assert!(!b.push_row(&left_row(0, 16), &right_row(0, 16), &mut state));
        assert!(!b.push_row(&left_row(1, 16), &right_row(1, 16), &mut state));
        assert!(b.push_row(&left_row(2, 16), &right_row(2, 16), &mut state));
    }

    #[test]
    fn vertical_sums_cover_the_last_window_rows() {
        let b = builder();
        let width = 16;
        let mut state = b.state(width);

        // Push 5 rows: the sums must then cover rows 2..=4 only.
        for y in 0..5 {
            b.push_row(&left_row(y, width), &right_row(y, width), &mut state);
        }

        for d in 0..4 {
            let shift = 5 - d;
            for x in shift..width {
                let naive: f32 = (2..5)
                    .map(|y| {
                        clamped_abs_diff(left_row(y, width)[x], right_row(y, width)[x - shift], 20.0)
                    })
                    .sum();
                assert_eq!(state.column_sums()[d * width + x], naive, "d {} x {}", d, x);
            }
        }
    }

    #[test]
    fn reset_restarts_the_init_phase() {
        let b = builder();
        let mut state = b.state(16);
        for y in 0..4 {
            b.push_row(&left_row(y, 16), &right_row(y, 16), &mut state);
        }

        state.reset();
        assert!(!b.push_row(&left_row(0, 16), &right_row(0, 16), &mut state));
    }
}
