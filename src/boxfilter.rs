//! # Incremental box filtering
//!
//! Sliding-window summation updated in O(1) per step: add the value entering the window,
//! subtract the value leaving it. The 1-D form slides along a row; the 2-D form is separable,
//! a per-column vertical running sum (`SlidingColumnSum`) followed by the 1-D pass over the
//! column sums. Windows are only produced where a full `width`-element neighbourhood exists,
//! so the output of the 1-D pass is `input.len() - width + 1` values.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use crate::error::{Error, Result};
use crate::simd::{load, store, LANES};

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// 1-D incremental window sum.
pub struct BoxAccumulator {
    sum: f32,
}

/// Fixed-capacity circular buffer of rows with an explicit head index.
///
/// Holds the last `rows` pushed rows without reallocating; the slot about to be overwritten is
/// the oldest row, which is exactly the row leaving a vertical sliding window.
pub struct RowRing {
    data: Vec<f32>,
    cols: usize,
    rows: usize,
    head: usize,
    filled: usize,
}

/// Per-column running sums over the last `window` pushed rows.
pub struct SlidingColumnSum {
    window: usize,
    sums: Vec<f32>,
    ring: RowRing,
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl BoxAccumulator {
    /// Seed the accumulator with the sum of the first window.
    pub fn new(head: &[f32]) -> Self {
        Self {
            sum: head.iter().sum(),
        }
    }

    /// Slide the window one step: `new` enters, `old` leaves.
    #[inline]
    pub fn advance(&mut self, new: f32, old: f32) -> f32 {
        self.sum += new - old;
        self.sum
    }

    #[inline]
    pub fn sum(&self) -> f32 {
        self.sum
    }
}

/// Windowed sums of `input`, one per valid window position.
///
/// `out` must hold `input.len() - width + 1` values. Fails if the input is shorter than the
/// window.
pub fn box_filter_row(input: &[f32], width: usize, out: &mut [f32]) -> Result<()> {
    if input.len() < width {
        return Err(Error::WindowTooWide {
            len: input.len(),
            width,
        });
    }

    let mut acc = BoxAccumulator::new(&input[..width]);
    out[0] = acc.sum();
    for i in 1..input.len() - width + 1 {
        out[i] = acc.advance(input[i + width - 1], input[i - 1]);
    }

    Ok(())
}

impl RowRing {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            data: vec![0.0; rows * cols],
            cols,
            rows,
            head: 0,
            filled: 0,
        }
    }

    pub fn clear(&mut self) {
        self.head = 0;
        self.filled = 0;
    }

    /// True once `rows` rows have been pushed.
    pub fn full(&self) -> bool {
        self.filled == self.rows
    }

    /// The row the next push will overwrite.
    pub fn oldest(&self) -> &[f32] {
        &self.data[self.head * self.cols..(self.head + 1) * self.cols]
    }

    /// Overwrite the oldest slot with `row` and advance the head.
    pub fn push(&mut self, row: &[f32]) {
        self.data[self.head * self.cols..(self.head + 1) * self.cols].copy_from_slice(row);
        self.head = (self.head + 1) % self.rows;
        if self.filled < self.rows {
            self.filled += 1;
        }
    }
}

impl SlidingColumnSum {
    pub fn new(window: usize, cols: usize) -> Self {
        Self {
            window,
            sums: vec![0.0; cols],
            ring: RowRing::new(window, cols),
        }
    }

    pub fn clear(&mut self) {
        for sum in self.sums.iter_mut() {
            *sum = 0.0;
        }
        self.ring.clear();
    }

    /// Feed one row. Returns true once the sums cover a full vertical window.
    ///
    /// During the initial fill the row is only added; afterwards the row `window` pushes ago is
    /// subtracted in the same pass, keeping the update O(1) per column per row.
    pub fn push(&mut self, row: &[f32]) -> bool {
        debug_assert_eq!(row.len(), self.sums.len());

        if self.ring.full() {
            let old = self.ring.oldest();
            let cols = self.sums.len();
            let simd_end = cols / LANES * LANES;

            let mut i = 0;
            while i < simd_end {
                let updated = load(&self.sums[i..]) + load(&row[i..]) - load(&old[i..]);
                store(updated, &mut self.sums[i..]);
                i += LANES;
            }
            while i < cols {
                self.sums[i] += row[i] - old[i];
                i += 1;
            }
        } else {
            for (sum, &val) in self.sums.iter_mut().zip(row) {
                *sum += val;
            }
        }

        self.ring.push(row);
        self.ring.full()
    }

    /// Current per-column sums; only meaningful once `push` has returned true.
    pub fn sums(&self) -> &[f32] {
        &self.sums
    }
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------
