//! # General disparity objects
//!
//! This module provides generic disparity traits and structures shared by the matching
//! strategies.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use image::GrayImage;

use crate::error::Result;
use crate::frame::{GrayFloatImage, StereoFrame};

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// A generic floating point disparity map.
///
/// A value of `0.0` is the "no valid match" sentinel. Note that this collides with a legitimate
/// zero disparity when the configured search range includes disparity zero; configure
/// `disparity_max >= disparity_search_width` if the distinction matters for the scene.
pub struct DisparityMap {
    data: GrayFloatImage,
    pub max_disp: Option<f32>,
    pub min_disp: Option<f32>,
}

// -----------------------------------------------------------------------------------------------
// TRAITS
// -----------------------------------------------------------------------------------------------

pub trait DisparityAlgorithm {
    /// Compute the disparity map of the given stereo frame.
    fn compute(&mut self, frame: &StereoFrame) -> Result<DisparityMap>;
}

/// One way of turning streamed row pairs into aggregated per-disparity cost rows.
///
/// A strategy is immutable during a run; all mutable state lives in its `Buffers`, which the
/// matching engine draws from a pool so concurrent row chunks never share scratch. Rows are
/// pushed top to bottom; once `lag` rows have been consumed every further push yields one
/// aggregated cost row, laid out as `search` planes of `out_width` values indexed by the
/// window-start column. Positions whose shifted window would fall off the left image edge
/// carry an infinite cost so they lose every comparison.
pub trait AggregationStrategy: Sync {
    type Buffers: Send;

    /// Allocate scratch for rows of the given width.
    fn make_buffers(&self, width: usize) -> Self::Buffers;

    /// Prepare scratch for a fresh run (or a fresh row chunk).
    fn reset(&self, buf: &mut Self::Buffers);

    /// Number of input rows consumed before the first cost row is emitted.
    fn lag(&self) -> usize;

    /// Row/column offset of an emitted value from the window-start position.
    fn margin(&self) -> usize;

    /// Length of one aggregated plane for rows of the given width.
    fn out_width(&self, width: usize) -> usize;

    /// Feed input row `y` of both views. Returns true when a cost row is ready.
    fn push_row(
        &self,
        left: &GrayFloatImage,
        right: &GrayFloatImage,
        y: usize,
        buf: &mut Self::Buffers,
    ) -> Result<bool>;

    /// The most recently completed cost row.
    fn aggregated<'a>(&self, buf: &'a Self::Buffers) -> &'a [f32];
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl DisparityMap {
    pub fn new(width: usize, height: usize) -> Self {
        DisparityMap {
            data: GrayFloatImage::new(width, height),
            min_disp: None,
            max_disp: None,
        }
    }

    pub fn width(&self) -> usize {
        self.data.width()
    }

    pub fn height(&self) -> usize {
        self.data.height()
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.data.get(x, y)
    }

    #[inline]
    pub fn put(&mut self, x: usize, y: usize, val: f32) {
        self.data.put(x, y, val)
    }

    /// Overwrite one full row of the map.
    pub fn put_row(&mut self, y: usize, row: &[f32]) {
        self.data.row_mut(y).copy_from_slice(row);
    }

    /// Borrow one full row of the map.
    pub fn row(&self, y: usize) -> &[f32] {
        self.data.row(y)
    }

    /// Record observed min/max over the non-sentinel values of the map.
    pub fn update_stats(&mut self) {
        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;

        for y in 0..self.height() {
            for &val in self.data.row(y) {
                if val != 0.0 {
                    min = min.min(val);
                    max = max.max(val);
                }
            }
        }

        if min <= max {
            self.min_disp = Some(min);
            self.max_disp = Some(max);
        } else {
            self.min_disp = None;
            self.max_disp = None;
        }
    }

    /// Converts the map into a Luma8 image, clamping values into `[0, 255]`.
    pub fn to_luma(&self) -> GrayImage {
        let mut new = GrayImage::new(self.width() as u32, self.height() as u32);

        for y in 0..new.height() {
            for x in 0..new.width() {
                let val = self.data.get(x as usize, y as usize).max(0.0).min(255.0);
                *new.get_pixel_mut(x, y) = image::Luma([val as u8]);
            }
        }

        new
    }

    /// Converts the map to a normalised GrayImage.
    ///
    /// Normalises by the maximum observed disparity in the map. If the maximum disparity is not
    /// set then the function is equivalent to `.to_luma()`.
    pub fn to_luma_normalised(&self) -> GrayImage {
        let mut new = GrayImage::new(self.width() as u32, self.height() as u32);

        let mult = match self.max_disp {
            Some(d) if d > 0.0 => 255.0 / d,
            _ => 1.0,
        };

        for y in 0..new.height() {
            for x in 0..new.width() {
                let val = (self.data.get(x as usize, y as usize) * mult)
                    .max(0.0)
                    .min(255.0);
                *new.get_pixel_mut(x, y) = image::Luma([val as u8]);
            }
        }

        new
    }
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_skip_the_sentinel() {
        let mut map = DisparityMap::new(4, 2);
        map.put(1, 0, 3.5);
        map.put(2, 1, 7.0);
        map.update_stats();

        assert_eq!(map.min_disp, Some(3.5));
        assert_eq!(map.max_disp, Some(7.0));
    }

    #[test]
    fn all_sentinel_map_has_no_stats() {
        let mut map = DisparityMap::new(4, 2);
        map.update_stats();
        assert_eq!(map.min_disp, None);
        assert_eq!(map.max_disp, None);
    }

    #[test]
    fn normalised_export_scales_to_full_range() {
        let mut map = DisparityMap::new(2, 1);
        map.put(0, 0, 5.0);
        map.put(1, 0, 10.0);
        map.update_stats();

        let luma = map.to_luma_normalised();
        assert_eq!(luma.get_pixel(1, 0)[0], 255);
        assert_eq!(luma.get_pixel(0, 0)[0], 127);
    }
}
