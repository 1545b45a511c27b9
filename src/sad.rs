//! # Sum-of-absolute-differences aggregation
//!
//! The plain windowed matching cost: clamped absolute differences summed over a
//! `window x window` box, both box passes computed incrementally. With `blend > 0` the
//! per-pixel score mixes in a clamped horizontal-derivative difference, which makes the cost
//! robust against a brightness offset between the two cameras.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use crate::boxfilter::box_filter_row;
use crate::cost::{CostVolumeBuilder, CostVolumeState};
use crate::disparity::AggregationStrategy;
use crate::error::Result;
use crate::frame::GrayFloatImage;
use crate::matcher::Params;

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

pub struct SadAggregation {
    window: usize,
    search: usize,
    disparity_max: usize,
    builder: CostVolumeBuilder,
}

pub struct SadBuffers {
    cost: CostVolumeState,
    agg: Vec<f32>,
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl SadAggregation {
    pub fn new(params: &Params) -> Self {
        Self {
            window: params.window_size,
            search: params.disparity_search_width,
            disparity_max: params.disparity_max,
            builder: CostVolumeBuilder::new(
                params.window_size,
                params.disparity_search_width,
                params.disparity_max,
                params.intensity_diff_max,
                params.derivative_diff_max,
                params.blend,
            ),
        }
    }
}

impl AggregationStrategy for SadAggregation {
    type Buffers = SadBuffers;

    fn make_buffers(&self, width: usize) -> SadBuffers {
        SadBuffers {
            cost: self.builder.state(width),
            agg: vec![0.0; self.search * self.out_width(width)],
        }
    }

    fn reset(&self, buf: &mut SadBuffers) {
        buf.cost.reset();
    }

    fn lag(&self) -> usize {
        self.window - 1
    }

    fn margin(&self) -> usize {
        (self.window - 1) / 2
    }

    fn out_width(&self, width: usize) -> usize {
        width + 1 - self.window
    }

    fn push_row(
        &self,
        left: &GrayFloatImage,
        right: &GrayFloatImage,
        y: usize,
        buf: &mut SadBuffers,
    ) -> Result<bool> {
        if !self.builder.push_row(left.row(y), right.row(y), &mut buf.cost) {
            return Ok(false);
        }

        // Vertical window complete: finish the separable box sum horizontally.
        let width = buf.cost.width();
        let out_width = self.out_width(width);
        let sums = buf.cost.column_sums();

        for d in 0..self.search {
            let plane = &sums[d * width..(d + 1) * width];
            let agg = &mut buf.agg[d * out_width..(d + 1) * out_width];
            box_filter_row(plane, self.window, agg)?;

            // Window positions left of the shift have no right-image counterpart; an
            // infinite cost keeps them out of both arg-min scans.
            let shift = self.disparity_max - d;
            for slot in agg[..shift.min(out_width)].iter_mut() {
                *slot = f32::INFINITY;
            }
        }

        Ok(true)
    }

    fn aggregated<'a>(&self, buf: &'a SadBuffers) -> &'a [f32] {
        &buf.agg
    }
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------
