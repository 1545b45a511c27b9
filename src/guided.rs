//! # Guided-filter aggregation
//!
//! Edge-aware analogue of the uniform box sum. Over every `window x window` box the averaged
//! cost is expressed as an affine function `a * guide + b` of the reference ("guide") image;
//! the `(a, b)` pairs are then box-averaged over a second window and evaluated at the centre
//! guide pixel. Costs are smoothed across flat regions but not across guide edges, because a
//! strong local guide variance drives `a` towards the cost/guide correlation instead of zero.
//!
//! Both passes run on the same incremental box machinery as the SAD variant, so the whole
//! filter stays O(1) per pixel per disparity with respect to the window size. The cascade of
//! two valid-only windows makes emitted rows lag the input by `2 * window - 2` rows.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use crate::boxfilter::{box_filter_row, SlidingColumnSum};
use crate::cost::{CostVolumeBuilder, CostVolumeState};
use crate::disparity::AggregationStrategy;
use crate::error::Result;
use crate::frame::GrayFloatImage;
use crate::matcher::Params;

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

pub struct GuidedAggregation {
    window: usize,
    search: usize,
    disparity_max: usize,
    epsilon: f32,
    builder: CostVolumeBuilder,
}

pub struct GuidedBuffers {
    cost: CostVolumeState,
    /// Per-disparity cost * guide products of the current row.
    cg_row: Vec<f32>,
    g2_row: Vec<f32>,
    vert_cg: SlidingColumnSum,
    vert_g: SlidingColumnSum,
    vert_g2: SlidingColumnSum,
    /// Pass-1 horizontal sums, one value per window position.
    sg: Vec<f32>,
    sg2: Vec<f32>,
    sc: Vec<f32>,
    scg: Vec<f32>,
    /// Regression coefficients per window position and disparity.
    a_row: Vec<f32>,
    b_row: Vec<f32>,
    vert_a: SlidingColumnSum,
    vert_b: SlidingColumnSum,
    sa: Vec<f32>,
    sb: Vec<f32>,
    agg: Vec<f32>,
}

// -----------------------------------------------------------------------------------------------
// FUNCTIONS
// -----------------------------------------------------------------------------------------------

/// Linear regression coefficients of cost against guide over one window.
///
/// `n` is the element count of the window; `epsilon` regularises the guide variance so flat
/// guide regions fall back to the plain windowed mean (`a = 0`, `b` = average cost) instead of
/// amplifying noise.
pub fn guided_coefficients(
    n: f32,
    sum_c: f32,
    sum_g: f32,
    sum_g2: f32,
    sum_cg: f32,
    epsilon: f32,
) -> (f32, f32) {
    let denom = n * sum_g2 - sum_g * sum_g + n * n * epsilon * epsilon;
    let a = if denom != 0.0 {
        (n * sum_cg - sum_c * sum_g) / denom
    } else {
        0.0
    };
    let b = (sum_c - a * sum_g) / n;
    (a, b)
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl GuidedAggregation {
    pub fn new(params: &Params) -> Self {
        Self {
            window: params.window_size,
            search: params.disparity_search_width,
            disparity_max: params.disparity_max,
            epsilon: params.epsilon,
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

    /// Window positions per disparity after the first pass.
    fn pass1_width(&self, width: usize) -> usize {
        width + 1 - self.window
    }
}

impl AggregationStrategy for GuidedAggregation {
    type Buffers = GuidedBuffers;

    fn make_buffers(&self, width: usize) -> GuidedBuffers {
        let w1 = self.pass1_width(width);
        let w2 = self.out_width(width);
        GuidedBuffers {
            cost: self.builder.state(width),
            cg_row: vec![0.0; width * self.search],
            g2_row: vec![0.0; width],
            vert_cg: SlidingColumnSum::new(self.window, width * self.search),
            vert_g: SlidingColumnSum::new(self.window, width),
            vert_g2: SlidingColumnSum::new(self.window, width),
            sg: vec![0.0; w1],
            sg2: vec![0.0; w1],
            sc: vec![0.0; w1],
            scg: vec![0.0; w1],
            a_row: vec![0.0; w1 * self.search],
            b_row: vec![0.0; w1 * self.search],
            vert_a: SlidingColumnSum::new(self.window, w1 * self.search),
            vert_b: SlidingColumnSum::new(self.window, w1 * self.search),
            sa: vec![0.0; w2],
            sb: vec![0.0; w2],
            agg: vec![0.0; w2 * self.search],
        }
    }

    fn reset(&self, buf: &mut GuidedBuffers) {
        buf.cost.reset();
        buf.vert_cg.clear();
        buf.vert_g.clear();
        buf.vert_g2.clear();
        buf.vert_a.clear();
        buf.vert_b.clear();
    }

    fn lag(&self) -> usize {
        2 * self.window - 2
    }

    fn margin(&self) -> usize {
        self.window - 1
    }

    fn out_width(&self, width: usize) -> usize {
        self.pass1_width(width) + 1 - self.window
    }

    fn push_row(
        &self,
        left: &GrayFloatImage,
        right: &GrayFloatImage,
        y: usize,
        buf: &mut GuidedBuffers,
    ) -> Result<bool> {
        let width = left.width();
        let guide = left.row(y);

        let costs_ready = self.builder.push_row(guide, right.row(y), &mut buf.cost);

        // Stack the guide statistics and cost * guide products alongside the plain costs.
        for d in 0..self.search {
            let scores = &buf.cost.row_scores()[d * width..(d + 1) * width];
            let products = &mut buf.cg_row[d * width..(d + 1) * width];
            for ((product, &score), &g) in products.iter_mut().zip(scores).zip(guide) {
                *product = score * g;
            }
        }
        buf.vert_cg.push(&buf.cg_row);

        for (slot, &g) in buf.g2_row.iter_mut().zip(guide) {
            *slot = g * g;
        }
        buf.vert_g.push(guide);
        buf.vert_g2.push(&buf.g2_row);

        if !costs_ready {
            return Ok(false);
        }

        // Pass 1: full window sums -> per-position regression coefficients.
        let w1 = self.pass1_width(width);
        let n = (self.window * self.window) as f32;

        box_filter_row(buf.vert_g.sums(), self.window, &mut buf.sg)?;
        box_filter_row(buf.vert_g2.sums(), self.window, &mut buf.sg2)?;

        for d in 0..self.search {
            let cost_plane = &buf.cost.column_sums()[d * width..(d + 1) * width];
            let cg_plane = &buf.vert_cg.sums()[d * width..(d + 1) * width];
            box_filter_row(cost_plane, self.window, &mut buf.sc)?;
            box_filter_row(cg_plane, self.window, &mut buf.scg)?;

            for j in 0..w1 {
                let (a, b) = guided_coefficients(
                    n,
                    buf.sc[j],
                    buf.sg[j],
                    buf.sg2[j],
                    buf.scg[j],
                    self.epsilon,
                );
                buf.a_row[d * w1 + j] = a;
                buf.b_row[d * w1 + j] = b;
            }
        }

        let coeffs_ready = buf.vert_a.push(&buf.a_row);
        buf.vert_b.push(&buf.b_row);
        if !coeffs_ready {
            return Ok(false);
        }

        // Pass 2: box-average the coefficients and evaluate at the centre guide pixel.
        let w2 = self.out_width(width);
        let centre_row = left.row(y - (self.window - 1));

        for d in 0..self.search {
            box_filter_row(&buf.vert_a.sums()[d * w1..(d + 1) * w1], self.window, &mut buf.sa)?;
            box_filter_row(&buf.vert_b.sums()[d * w1..(d + 1) * w1], self.window, &mut buf.sb)?;

            let agg = &mut buf.agg[d * w2..(d + 1) * w2];
            for (j, slot) in agg.iter_mut().enumerate() {
                let u = self.window - 1 + j;
                let mean_a = buf.sa[j] / n;
                let mean_b = buf.sb[j] / n;
                *slot = mean_a * centre_row[u] + mean_b;
            }

            // Positions left of the shift never see a full right-image window; infinite
            // cost keeps them out of both arg-min scans.
            let shift = self.disparity_max - d;
            for slot in agg[..shift.min(w2)].iter_mut() {
                *slot = f32::INFINITY;
            }
        }

        Ok(true)
    }

    fn aggregated<'a>(&self, buf: &'a GuidedBuffers) -> &'a [f32] {
        &buf.agg
    }
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::clamped_abs_diff;

    #[test]
    fn constant_guide_zeroes_the_scale_term() {
        // n = 9, guide constant 4: variance term vanishes, a = 0 and b is the plain mean.
        let (a, b) = guided_coefficients(9.0, 18.0, 36.0, 144.0, 72.0, 0.5);
        assert_eq!(a, 0.0);
        assert_eq!(b, 2.0);
    }

    #[test]
    fn zero_epsilon_on_a_flat_guide_stays_finite() {
        let (a, b) = guided_coefficients(9.0, 18.0, 36.0, 144.0, 72.0, 0.0);
        assert!(a.is_finite());
        assert!(b.is_finite());
        assert_eq!(b, 2.0);
    }

    #[test]
    fn flat_guide_degenerates_to_the_box_average() {
        // A constant left image makes every guide window flat, so the aggregated cost must be
        // the plain windowed average of the scores.
        let params = Params {
            window_size: 3,
            disparity_search_width: 2,
            disparity_max: 2,
            intensity_diff_max: 100.0,
            blend: 0.0,
            epsilon: 0.5,
            ..Params::default()
        };
        let gf = GuidedAggregation::new(&params);

        let width = 12;
        let left = GrayFloatImage::from_fn(width, 8, |_, _| 40.0);
        let right = GrayFloatImage::from_fn(width, 8, |x, y| ((x * 3 + y * 5) % 20) as f32 + 30.0);

        let mut buf = gf.make_buffers(width);
        gf.reset(&mut buf);

        let mut emitted = None;
        for y in 0..8 {
            if gf.push_row(&left, &right, y, &mut buf).unwrap() {
                emitted = Some(y);
                break;
            }
        }
        let y_last = emitted.expect("cost row emitted");
        assert_eq!(y_last, gf.lag());

        let w2 = gf.out_width(width);
        let n2 = 9.0 * 9.0;
        for d in 0..2 {
            let shift = params.disparity_max - d;
            for j in 0..w2 {
                let got = gf.aggregated(&buf)[d * w2 + j];
                if j < shift {
                    assert_eq!(got, f32::INFINITY, "d {} j {}", d, j);
                    continue;
                }
                // Average over the cascaded 5x5 support of window positions.
                let mut naive = 0.0;
                for wy in 0..3 {
                    for wx in 0..3 {
                        let i = j + wx;
                        for sy in wy..wy + 3 {
                            for sx in i..i + 3 {
                                naive += clamped_abs_diff(
                                    left.get(sx, sy),
                                    right.get(sx - shift, sy),
                                    100.0,
                                );
                            }
                        }
                    }
                }
                let expect = naive / n2;
                assert!(
                    (got - expect).abs() < 1e-3,
                    "d {} j {}: {} vs {}",
                    d,
                    j,
                    got,
                    expect
                );
            }
        }
    }
}
