// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Global and locally adaptive thresholding.

use image::{GrayImage, ImageBuffer, Luma};
use imageproc::contrast::{self, ThresholdType};
use tracing::{debug, instrument};

use crate::error::{BildwerkError, Result};
use crate::image::Image;
use crate::types::BlurMethod;

impl Image {
    /// Global binarisation. Pixels above the threshold become 255, the rest 0.
    ///
    /// When `threshold` is `None` the level is chosen by Otsu's method.
    #[instrument(skip(self))]
    pub fn binarize(&mut self, threshold: Option<u8>) -> Result<&mut Self> {
        let gray = self.gray()?;
        let level = match threshold {
            Some(t) => t,
            None => contrast::otsu_level(&gray),
        };
        debug!(level, "Binarizing");
        self.set_gray(contrast::threshold(&gray, level, ThresholdType::Binary));
        Ok(self)
    }

    /// Mean-based adaptive binarisation with inverted polarity: a pixel
    /// darker than its local mean minus `c` becomes 255, the rest 0.
    ///
    /// `blur_size` is an optional Gaussian pre-smoothing kernel, either 0 to
    /// skip or odd and at least 3. `block_size` is the side of the local
    /// window and must be odd and at least 3.
    #[instrument(skip(self))]
    pub fn adaptive_threshold(
        &mut self,
        blur_size: u32,
        block_size: u32,
        c: f64,
    ) -> Result<&mut Self> {
        if blur_size != 0 && (blur_size < 3 || blur_size % 2 == 0) {
            return Err(BildwerkError::InvalidArgument(format!(
                "pre-blur size {} must be 0, or odd and at least 3",
                blur_size
            )));
        }
        if block_size < 3 || block_size % 2 == 0 {
            return Err(BildwerkError::InvalidArgument(format!(
                "block size {} must be odd and at least 3",
                block_size
            )));
        }
        // Reject colour input before any mutation.
        self.gray()?;
        if blur_size != 0 {
            self.blur(blur_size, BlurMethod::Gaussian)?;
        }

        let gray = self.gray()?;
        let (width, height) = gray.dimensions();
        let integral = summed_area_table(&gray);
        let radius = block_size / 2;

        let out: GrayImage = ImageBuffer::from_fn(width, height, |x, y| {
            let mean = local_mean(&integral, width, height, x, y, radius);
            if gray.get_pixel(x, y).0[0] as f64 > mean - c {
                Luma([0u8])
            } else {
                Luma([255u8])
            }
        });
        self.set_gray(out);
        Ok(self)
    }
}

// -- Helpers ------------------------------------------------------------------

/// Summed-area table with a zero border row and column, so window sums need
/// no edge special-casing. Entry `(y + 1) * (w + 1) + (x + 1)` holds the sum
/// over all pixels at or above-left of `(x, y)`.
pub(crate) fn summed_area_table(gray: &GrayImage) -> Vec<u64> {
    let (width, height) = gray.dimensions();
    let stride = width as usize + 1;
    let mut table = vec![0u64; stride * (height as usize + 1)];
    for y in 0..height as usize {
        for x in 0..width as usize {
            let value = gray.get_pixel(x as u32, y as u32).0[0] as u64;
            table[(y + 1) * stride + (x + 1)] =
                value + table[y * stride + (x + 1)] + table[(y + 1) * stride + x]
                    - table[y * stride + x];
        }
    }
    table
}

/// Mean intensity over the window of the given radius centred on `(x, y)`,
/// clamped to the image bounds.
pub(crate) fn local_mean(
    table: &[u64],
    width: u32,
    height: u32,
    x: u32,
    y: u32,
    radius: u32,
) -> f64 {
    let stride = width as usize + 1;
    let x0 = x.saturating_sub(radius) as usize;
    let y0 = y.saturating_sub(radius) as usize;
    let x1 = (x + radius).min(width - 1) as usize;
    let y1 = (y + radius).min(height - 1) as usize;

    let sum = table[(y1 + 1) * stride + (x1 + 1)] + table[y0 * stride + x0]
        - table[y0 * stride + (x1 + 1)]
        - table[(y1 + 1) * stride + x0];
    let area = ((x1 - x0 + 1) * (y1 - y0 + 1)) as f64;
    sum as f64 / area
}

// -- Tests --------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgb, RgbImage};

    fn from_gray(buf: GrayImage) -> Image {
        Image::from_dynamic(DynamicImage::ImageLuma8(buf))
    }

    /// Verify the explicit threshold splits strictly above versus at-or-below.
    #[test]
    fn binarize_with_explicit_threshold() {
        let mut buf = GrayImage::new(2, 1);
        buf.put_pixel(0, 0, Luma([100u8]));
        buf.put_pixel(1, 0, Luma([101u8]));
        let mut img = from_gray(buf);
        img.binarize(Some(100)).unwrap();
        let gray = img.gray().unwrap();
        assert_eq!(gray.get_pixel(0, 0).0[0], 0);
        assert_eq!(gray.get_pixel(1, 0).0[0], 255);
    }

    /// Verify Otsu separates a bimodal image into exactly two levels.
    #[test]
    fn binarize_otsu_separates_bimodal() {
        let mut buf = GrayImage::from_pixel(10, 10, Luma([50u8]));
        for y in 0..10 {
            for x in 5..10 {
                buf.put_pixel(x, y, Luma([200u8]));
            }
        }
        let mut img = from_gray(buf);
        img.binarize(None).unwrap();
        let gray = img.gray().unwrap();
        assert_eq!(gray.get_pixel(2, 5).0[0], 0);
        assert_eq!(gray.get_pixel(7, 5).0[0], 255);
        assert!(gray.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
    }

    /// Verify colour input is rejected before any work happens.
    #[test]
    fn binarize_rejects_colour() {
        let mut img = Image::from_dynamic(DynamicImage::ImageRgb8(RgbImage::from_pixel(
            4,
            4,
            Rgb([1, 2, 3]),
        )));
        assert!(matches!(
            img.binarize(None),
            Err(BildwerkError::RequiresGray { found: 3 })
        ));
    }

    /// Verify a uniform image thresholds to all-black under a positive offset
    /// and all-white under a negative one.
    #[test]
    fn adaptive_threshold_uniform_image() {
        let mut img = from_gray(GrayImage::from_pixel(12, 12, Luma([100u8])));
        img.adaptive_threshold(0, 5, 10.0).unwrap();
        assert!(img.gray().unwrap().pixels().all(|p| p.0[0] == 0));

        let mut img = from_gray(GrayImage::from_pixel(12, 12, Luma([100u8])));
        img.adaptive_threshold(0, 5, -10.0).unwrap();
        assert!(img.gray().unwrap().pixels().all(|p| p.0[0] == 255));
    }

    /// Verify dark strokes on a bright background come out white.
    #[test]
    fn adaptive_threshold_extracts_dark_stroke() {
        let mut buf = GrayImage::from_pixel(20, 20, Luma([200u8]));
        for x in 0..20 {
            buf.put_pixel(x, 10, Luma([50u8]));
        }
        let mut img = from_gray(buf);
        img.adaptive_threshold(0, 5, 10.0).unwrap();
        let gray = img.gray().unwrap();
        assert_eq!(gray.get_pixel(10, 10).0[0], 255);
        assert_eq!(gray.get_pixel(10, 2).0[0], 0);
    }

    /// Verify size validation for both the pre-blur and the window.
    #[test]
    fn adaptive_threshold_rejects_bad_sizes() {
        let mut img = from_gray(GrayImage::from_pixel(8, 8, Luma([100u8])));
        assert!(img.adaptive_threshold(2, 5, 0.0).is_err());
        assert!(img.adaptive_threshold(0, 4, 0.0).is_err());
        assert!(img.adaptive_threshold(0, 1, 0.0).is_err());
    }

    /// Verify the summed-area helper agrees with a direct sum.
    #[test]
    fn summed_area_table_matches_naive_sum() {
        let mut buf = GrayImage::new(4, 3);
        for y in 0..3 {
            for x in 0..4 {
                buf.put_pixel(x, y, Luma([(y * 4 + x + 1) as u8]));
            }
        }
        let table = summed_area_table(&buf);
        let mean = local_mean(&table, 4, 3, 1, 1, 1);
        // Window covers values 1, 2, 3, 5, 6, 7, 9, 10, 11.
        assert!((mean - 54.0 / 9.0).abs() < 1e-9);
    }
}
