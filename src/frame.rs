//! # Rectified frame containers
//!
//! This module provides the greyscale floating point image container and the stereo frame
//! bundle consumed by the matching engine. Images are expected to be epipolar-rectified by the
//! capture pipeline before they reach this crate: corresponding points lie on the same row of
//! the left and right views (and on the same column of the left and top views for three-camera
//! rigs).

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use image::DynamicImage;

use crate::error::{Error, Result};

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// A row-major greyscale image of `f32` samples.
#[derive(Clone, Debug)]
pub struct GrayFloatImage {
    data: Vec<f32>,
    width: usize,
    height: usize,
}

/// A bundle of rectified views captured at one instant.
///
/// `top` is only required for the vertical back-match and may be left `None` otherwise.
pub struct StereoFrame {
    pub left: GrayFloatImage,
    pub right: GrayFloatImage,
    pub top: Option<GrayFloatImage>,
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl GrayFloatImage {
    /// Create a zero-filled image.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            data: vec![0.0; width * height],
            width,
            height,
        }
    }

    /// Build an image by evaluating `f(x, y)` at every pixel.
    pub fn from_fn<F: FnMut(usize, usize) -> f32>(width: usize, height: usize, mut f: F) -> Self {
        let mut data = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self {
            data,
            width,
            height,
        }
    }

    /// Convert a dynamic image to greyscale floats in `[0, 255]`.
    pub fn from_dynamic(img: &DynamicImage) -> Self {
        let luma = img.to_luma();
        let (width, height) = (luma.width() as usize, luma.height() as usize);
        let data = luma.into_raw().into_iter().map(f32::from).collect();
        Self {
            data,
            width,
            height,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.data[y * self.width + x]
    }

    #[inline]
    pub fn put(&mut self, x: usize, y: usize, val: f32) {
        self.data[y * self.width + x] = val;
    }

    /// Borrow one full row of samples.
    #[inline]
    pub fn row(&self, y: usize) -> &[f32] {
        &self.data[y * self.width..(y + 1) * self.width]
    }

    /// Borrow one full row mutably.
    #[inline]
    pub fn row_mut(&mut self, y: usize) -> &mut [f32] {
        &mut self.data[y * self.width..(y + 1) * self.width]
    }

    /// Return the transpose of this image.
    ///
    /// Column access over many rows is the access pattern of the vertical matching pass; the
    /// pass transposes its inputs once and then streams rows like the horizontal pass does.
    pub fn transposed(&self) -> Self {
        let mut out = Self::new(self.height, self.width);
        for y in 0..self.height {
            let row = self.row(y);
            for (x, &val) in row.iter().enumerate() {
                out.data[x * self.height + y] = val;
            }
        }
        out
    }
}

impl StereoFrame {
    /// Bundle a left/right pair.
    pub fn new(left: GrayFloatImage, right: GrayFloatImage) -> Self {
        Self {
            left,
            right,
            top: None,
        }
    }

    /// Bundle a left/right/top triple for vertical back-matching.
    pub fn with_top(left: GrayFloatImage, right: GrayFloatImage, top: GrayFloatImage) -> Self {
        Self {
            left,
            right,
            top: Some(top),
        }
    }

    pub fn width(&self) -> usize {
        self.left.width
    }

    pub fn height(&self) -> usize {
        self.left.height
    }

    /// Check that all views share the left view's dimensions.
    pub fn check_sizes(&self) -> Result<()> {
        let mut views = vec![("right", &self.right)];
        if let Some(top) = &self.top {
            views.push(("top", top));
        }

        for (name, view) in views {
            if view.width != self.left.width || view.height != self.left.height {
                return Err(Error::SizeMismatch {
                    name,
                    width: view.width,
                    height: view.height,
                    left_width: self.left.width,
                    left_height: self.left.height,
                });
            }
        }

        Ok(())
    }
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------
