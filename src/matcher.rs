//! # Matching engine
//!
//! Drives an aggregation strategy over a rectified frame: streams rows through cost
//! construction, aggregation, disparity selection and the consistency checks, and writes one
//! output row per fully-covered window position. Output rows are partitioned into `grain_size`
//! chunks processed in parallel; every chunk re-runs the sliding-window warm-up over its own
//! leading rows, so no aggregation state crosses a chunk boundary and results are identical to
//! a single-threaded run.
//!
//! Scratch buffers are drawn from a pool guarded by a mutex held only around acquire/release,
//! never during computation.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use std::sync::Mutex;
use std::time::{Duration, Instant};

use log::{debug, trace, warn};
use rayon::prelude::*;
use serde::Deserialize;

use crate::consistency::{vertical_back_match, ConsistencyChecker};
use crate::disparity::{AggregationStrategy, DisparityAlgorithm, DisparityMap};
use crate::error::{Error, Result};
use crate::frame::{GrayFloatImage, StereoFrame};
use crate::guided::GuidedAggregation;
use crate::sad::SadAggregation;
use crate::select::{DisparitySelector, Selection, SelectorScratch};

#[cfg(feature = "statistics")]
use plotters::prelude::*;

// -----------------------------------------------------------------------------------------------
// CONSTANTS
// -----------------------------------------------------------------------------------------------

/// Largest integer an `f32` score accumulator can hold exactly.
const SCORE_EXACT_LIMIT: f64 = 16_777_216.0;

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// Matching parameters, immutable for the duration of a `compute` call.
#[derive(Deserialize, Debug, Clone)]
pub struct Params {
    /// Side length of the (odd, square) correlation window.
    pub window_size: usize,
    /// Number of candidate disparities scanned per pixel.
    pub disparity_search_width: usize,
    /// Largest disparity in the search range; index `d` encodes `disparity_max - d`.
    pub disparity_max: usize,
    /// Maximum allowed disagreement between the two matching directions, in disparity steps.
    pub disparity_inconsistency: usize,
    /// Output rows per parallel chunk; 0 processes the whole frame as one chunk.
    pub grain_size: usize,
    /// Clamp threshold for intensity differences.
    pub intensity_diff_max: f32,
    /// Clamp threshold for horizontal-derivative differences.
    pub derivative_diff_max: f32,
    /// Intensity/derivative mix: 0 is intensity only, 1 derivative only.
    pub blend: f32,
    /// Guided-filter regularisation; larger values smooth more aggressively.
    pub epsilon: f32,
    pub do_horizontal_back_match: bool,
    pub do_vertical_back_match: bool,
}

/// The complete stereo matcher: parameters, one aggregation strategy, and the scratch pool.
pub struct StereoMatcher<S: AggregationStrategy> {
    params: Params,
    strategy: S,
    selector: DisparitySelector,
    checker: ConsistencyChecker,
    pool: BufferPool<ChunkBuffers<S::Buffers>>,
}

/// Free-list of scratch bundles, reused across calls and shared between worker threads.
struct BufferPool<B> {
    free: Mutex<Vec<B>>,
}

/// Everything one chunk needs to process rows without touching shared state.
struct ChunkBuffers<B> {
    width: usize,
    strategy: B,
    scratch: SelectorScratch,
    selections: Vec<Selection>,
}

#[derive(Clone, Copy, Default)]
struct PhaseTimings {
    init: Duration,
    aggregate: Duration,
    select: Duration,
    output: Duration,
}

struct ChunkOutput {
    /// Produced rows as (map row index, full-width row) pairs.
    rows: Vec<(usize, Vec<f32>)>,
    timings: PhaseTimings,
    #[cfg(feature = "statistics")]
    row_micros: Vec<(usize, usize)>,
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl Default for Params {
    fn default() -> Self {
        Self {
            window_size: 9,
            disparity_search_width: 64,
            disparity_max: 63,
            disparity_inconsistency: 1,
            grain_size: 32,
            intensity_diff_max: 31.0,
            derivative_diff_max: 15.0,
            blend: 0.0,
            epsilon: 4.0,
            do_horizontal_back_match: true,
            do_vertical_back_match: false,
        }
    }
}

impl Params {
    /// Smallest disparity in the search range.
    pub fn disparity_min(&self) -> usize {
        self.disparity_max + 1 - self.disparity_search_width
    }

    /// Configuration-time validation, including the score overflow check.
    pub fn validate(&self) -> Result<()> {
        if self.window_size < 3 || self.window_size % 2 == 0 {
            return Err(Error::InvalidParams(format!(
                "window_size must be odd and at least 3, got {}",
                self.window_size
            )));
        }
        if self.disparity_search_width == 0 {
            return Err(Error::InvalidParams(
                "disparity_search_width must be at least 1".into(),
            ));
        }
        if self.disparity_max + 1 < self.disparity_search_width {
            return Err(Error::InvalidParams(format!(
                "disparity_max {} cannot cover a search width of {}",
                self.disparity_max, self.disparity_search_width
            )));
        }
        if !(0.0..=1.0).contains(&self.blend) {
            return Err(Error::InvalidParams(format!(
                "blend must lie in [0, 1], got {}",
                self.blend
            )));
        }
        if self.epsilon < 0.0 || self.intensity_diff_max < 0.0 || self.derivative_diff_max < 0.0 {
            return Err(Error::InvalidParams(
                "epsilon and clamp thresholds must be non-negative".into(),
            ));
        }

        let max_diff = f64::from(self.intensity_diff_max.max(self.derivative_diff_max));
        let worst_case = (self.window_size * self.window_size) as f64 * max_diff;
        if worst_case > SCORE_EXACT_LIMIT {
            return Err(Error::OverflowRisk {
                worst_case,
                limit: SCORE_EXACT_LIMIT,
            });
        }

        Ok(())
    }
}

impl<B> BufferPool<B> {
    fn new() -> Self {
        Self {
            free: Mutex::new(Vec::new()),
        }
    }

    fn acquire(&self) -> Option<B> {
        self.free.lock().unwrap_or_else(|e| e.into_inner()).pop()
    }

    fn release(&self, buffers: B) {
        self.free
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(buffers);
    }
}

impl StereoMatcher<SadAggregation> {
    /// Matcher using plain windowed sum-of-absolute-differences aggregation.
    pub fn sad(params: Params) -> Result<Self> {
        let strategy = SadAggregation::new(&params);
        Self::new(params, strategy)
    }
}

impl StereoMatcher<GuidedAggregation> {
    /// Matcher using edge-aware guided-filter aggregation.
    pub fn guided(params: Params) -> Result<Self> {
        let strategy = GuidedAggregation::new(&params);
        Self::new(params, strategy)
    }
}

impl<S: AggregationStrategy> StereoMatcher<S> {
    pub fn new(params: Params, strategy: S) -> Result<Self> {
        params.validate()?;
        let selector = DisparitySelector::new(params.disparity_search_width, params.disparity_max);
        let checker = ConsistencyChecker::new(
            params.disparity_inconsistency,
            params.do_horizontal_back_match,
        );
        Ok(Self {
            params,
            strategy,
            selector,
            checker,
            pool: BufferPool::new(),
        })
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// One full row-wise matching pass over a rectified pair.
    fn compute_pass(&self, left: &GrayFloatImage, right: &GrayFloatImage) -> Result<DisparityMap> {
        let width = left.width();
        let height = left.height();
        let mut map = DisparityMap::new(width, height);

        let window = self.params.window_size;
        let margin = self.strategy.margin();
        let lag = self.strategy.lag();
        let min_width = (2 * margin + 1 + self.params.disparity_max).max(2 * window);
        let min_height = (lag + 1).max(2 * window - 1);

        if width < min_width || height < min_height {
            warn!(
                "frame of {}x{} px is below the {}x{} px minimum for these parameters, \
                 producing an empty map",
                width, height, min_width, min_height
            );
            return Ok(map);
        }

        let rows_out = height - lag;
        let grain = if self.params.grain_size == 0 {
            rows_out
        } else {
            self.params.grain_size
        };

        let chunks: Vec<(usize, usize)> = (0..rows_out)
            .step_by(grain)
            .map(|start| (start, (start + grain).min(rows_out)))
            .collect();
        trace!(
            "matching {} output rows in {} chunks of up to {} rows",
            rows_out,
            chunks.len(),
            grain
        );

        let outputs: Vec<ChunkOutput> = chunks
            .into_par_iter()
            .map(|(start, end)| self.process_chunk(left, right, start, end))
            .collect::<Result<_>>()?;

        let output_start = Instant::now();
        let mut timings = PhaseTimings::default();
        #[cfg(feature = "statistics")]
        let mut row_micros: Vec<(usize, usize)> = Vec::with_capacity(rows_out);

        for output in outputs {
            for (row, values) in &output.rows {
                map.put_row(*row, values);
            }
            timings.init += output.timings.init;
            timings.aggregate += output.timings.aggregate;
            timings.select += output.timings.select;
            #[cfg(feature = "statistics")]
            row_micros.extend(output.row_micros);
        }
        timings.output = output_start.elapsed();

        debug!(
            "pass over {}x{} px: init {:?}, aggregate {:?}, select {:?}, output {:?}",
            width, height, timings.init, timings.aggregate, timings.select, timings.output
        );

        #[cfg(feature = "statistics")]
        plot_row_times(&row_micros, height);

        Ok(map)
    }

    /// Process output rows `[start, end)`, warming the sliding windows up from scratch.
    fn process_chunk(
        &self,
        left: &GrayFloatImage,
        right: &GrayFloatImage,
        start: usize,
        end: usize,
    ) -> Result<ChunkOutput> {
        let init_start = Instant::now();
        let mut buffers = self.acquire_buffers(left.width());
        self.strategy.reset(&mut buffers.strategy);
        let init = init_start.elapsed();

        let outcome = self.run_chunk(left, right, start, end, &mut buffers, init);
        self.pool.release(buffers);
        outcome
    }

    fn run_chunk(
        &self,
        left: &GrayFloatImage,
        right: &GrayFloatImage,
        start: usize,
        end: usize,
        buffers: &mut ChunkBuffers<S::Buffers>,
        init: Duration,
    ) -> Result<ChunkOutput> {
        let width = left.width();
        let out_width = self.strategy.out_width(width);
        let margin = self.strategy.margin();
        let lag = self.strategy.lag();

        let mut output = ChunkOutput {
            rows: Vec::with_capacity(end - start),
            timings: PhaseTimings {
                init,
                ..PhaseTimings::default()
            },
            #[cfg(feature = "statistics")]
            row_micros: Vec::with_capacity(end - start),
        };

        for y in start..end + lag {
            let aggregate_start = Instant::now();
            let ready = self
                .strategy
                .push_row(left, right, y, &mut buffers.strategy)?;
            output.timings.aggregate += aggregate_start.elapsed();
            if !ready {
                continue;
            }

            let select_start = Instant::now();
            let agg = self.strategy.aggregated(&buffers.strategy);
            self.selector.select_row(
                agg,
                out_width,
                &mut buffers.scratch,
                &mut buffers.selections[..out_width],
            );

            // Only positions with the full search range to their left are emitted; the
            // earlier ones exist purely to feed the target-based minima.
            let mut row = vec![0.0f32; width];
            for (i, sel) in buffers.selections[..out_width]
                .iter()
                .enumerate()
                .skip(self.params.disparity_max)
            {
                if self.checker.accept(sel) {
                    row[margin + i] = sel.value;
                }
            }
            output.timings.select += select_start.elapsed();

            let map_row = y - lag + margin;
            #[cfg(feature = "statistics")]
            output.row_micros.push((
                map_row,
                (aggregate_start.elapsed().as_micros()) as usize,
            ));
            output.rows.push((map_row, row));
        }

        Ok(output)
    }

    /// Reuse a pooled bundle when its width still matches, otherwise build a fresh one.
    fn acquire_buffers(&self, width: usize) -> ChunkBuffers<S::Buffers> {
        match self.pool.acquire() {
            Some(buffers) if buffers.width == width => buffers,
            _ => ChunkBuffers {
                width,
                strategy: self.strategy.make_buffers(width),
                scratch: self.selector.scratch(self.strategy.out_width(width)),
                selections: vec![Selection::default(); self.strategy.out_width(width)],
            },
        }
    }
}

impl<S: AggregationStrategy> DisparityAlgorithm for StereoMatcher<S> {
    /// Compute the disparity map for the given frame.
    fn compute(&mut self, frame: &StereoFrame) -> Result<DisparityMap> {
        frame.check_sizes()?;

        let mut map = self.compute_pass(&frame.left, &frame.right)?;

        if self.params.do_vertical_back_match {
            if let Some(top) = &frame.top {
                // The vertical pass streams the transposed views through the same row-wise
                // machinery; its output is indexed (row, column) of the original orientation.
                let vertical =
                    self.compute_pass(&frame.left.transposed(), &top.transposed())?;
                vertical_back_match(&mut map, &vertical, self.params.disparity_inconsistency);
            } else {
                warn!("vertical back-match requested but the frame has no top image");
            }
        }

        map.update_stats();
        Ok(map)
    }
}

// -----------------------------------------------------------------------------------------------
// PLOTTING
// -----------------------------------------------------------------------------------------------

#[cfg(feature = "statistics")]
fn plot_row_times(row_micros: &[(usize, usize)], height: usize) {
    if row_micros.is_empty() {
        return;
    }

    std::fs::create_dir_all("plots").unwrap();
    let max_micros = row_micros.iter().map(|&(_, t)| t).max().unwrap() + 1;

    let area = BitMapBackend::new("plots/row_times.png", (800, 600)).into_drawing_area();
    area.fill(&WHITE).unwrap();

    let mut chart = ChartBuilder::on(&area)
        .caption("Per-row matching time", ("sans-serif", 20).into_font())
        .margin(5)
        .x_label_area_size(30)
        .y_label_area_size(30)
        .build_ranged(0..height, 0..max_micros)
        .unwrap();

    chart.configure_mesh().draw().unwrap();

    let mut sorted = row_micros.to_vec();
    sorted.sort_unstable();
    chart
        .draw_series(LineSeries::new(sorted, &RED))
        .unwrap()
        .label("microseconds")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &RED));

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()
        .unwrap();
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------
