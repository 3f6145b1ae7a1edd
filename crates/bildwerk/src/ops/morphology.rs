// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Morphological operators and kernel filters — structuring-element
// morphology, linear algebraic variants, a Gabor bank, Canny and Sobel.

use image::{GrayImage, ImageBuffer, Luma};
use imageproc::drawing::draw_line_segment_mut;
use imageproc::edges::canny;
use imageproc::gradients::sobel_gradients;
use imageproc::map::{map_colors, map_colors2};
use imageproc::morphology::{
    Mask, grayscale_close, grayscale_dilate, grayscale_erode, grayscale_open,
};
use tracing::instrument;

use crate::error::{BildwerkError, Result};
use crate::image::Image;
use crate::types::MorphShape;

// Gabor bank parameters, shared by every orientation in the bank.
const GABOR_KSIZE: u32 = 21;
const GABOR_SIGMA: f32 = 40.0;
const GABOR_WAVELENGTH: f32 = 25.0;
const GABOR_GAMMA: f32 = 1.0;
const GABOR_PSI: f32 = std::f32::consts::FRAC_PI_2;

impl Image {
    // -- Kernel filters -------------------------------------------------------

    /// Sharpen with the classic 3x3 kernel (centre 9, neighbours -1).
    pub fn sharpen(&mut self) -> Result<&mut Self> {
        let gray = self.gray()?;
        let kernel = [-1.0, -1.0, -1.0, -1.0, 9.0, -1.0, -1.0, -1.0, -1.0];
        self.set_gray(convolve_clamped(&gray, &kernel, 3));
        Ok(self)
    }

    /// Maximum response over a bank of Gabor kernels at the given
    /// orientations, in degrees.
    #[instrument(skip(self))]
    pub fn gabor(&mut self, orientations_deg: &[f32]) -> Result<&mut Self> {
        if orientations_deg.is_empty() {
            return Err(BildwerkError::InvalidArgument(
                "gabor needs at least one orientation".to_string(),
            ));
        }
        let gray = self.gray()?;
        let mut result = GrayImage::new(gray.width(), gray.height());
        for &theta_deg in orientations_deg {
            let kernel = gabor_kernel(theta_deg.to_radians());
            let filtered = convolve_clamped(&gray, &kernel, GABOR_KSIZE);
            result = map_colors2(&result, &filtered, |a, b| Luma([a.0[0].max(b.0[0])]));
        }
        self.set_gray(result);
        Ok(self)
    }

    // -- Structuring-element morphology ---------------------------------------

    /// Morphological opening: erosion then dilation.
    #[instrument(skip(self))]
    pub fn opening(&mut self, radius: u8, shape: MorphShape) -> Result<&mut Self> {
        let gray = self.gray()?;
        let mask = structuring_mask(radius, shape)?;
        self.set_gray(grayscale_open(&gray, &mask));
        Ok(self)
    }

    /// Morphological closing: dilation then erosion.
    #[instrument(skip(self))]
    pub fn closing(&mut self, radius: u8, shape: MorphShape) -> Result<&mut Self> {
        let gray = self.gray()?;
        let mask = structuring_mask(radius, shape)?;
        self.set_gray(grayscale_close(&gray, &mask));
        Ok(self)
    }

    /// Morphological dilation.
    #[instrument(skip(self))]
    pub fn dilation(&mut self, radius: u8, shape: MorphShape) -> Result<&mut Self> {
        let gray = self.gray()?;
        let mask = structuring_mask(radius, shape)?;
        self.set_gray(grayscale_dilate(&gray, &mask));
        Ok(self)
    }

    /// Morphological erosion.
    #[instrument(skip(self))]
    pub fn erosion(&mut self, radius: u8, shape: MorphShape) -> Result<&mut Self> {
        let gray = self.gray()?;
        let mask = structuring_mask(radius, shape)?;
        self.set_gray(grayscale_erode(&gray, &mask));
        Ok(self)
    }

    /// Top-hat: the image minus its opening, keeping small bright detail.
    #[instrument(skip(self))]
    pub fn tophat(&mut self, radius: u8, shape: MorphShape) -> Result<&mut Self> {
        let gray = self.gray()?;
        let mask = structuring_mask(radius, shape)?;
        let opened = grayscale_open(&gray, &mask);
        let out = map_colors2(&gray, &opened, |p, o| Luma([p.0[0].saturating_sub(o.0[0])]));
        self.set_gray(out);
        Ok(self)
    }

    /// Black-hat: the closing minus the image, keeping small dark detail.
    #[instrument(skip(self))]
    pub fn blackhat(&mut self, radius: u8, shape: MorphShape) -> Result<&mut Self> {
        let gray = self.gray()?;
        let mask = structuring_mask(radius, shape)?;
        let closed = grayscale_close(&gray, &mask);
        let out = map_colors2(&closed, &gray, |c, p| Luma([c.0[0].saturating_sub(p.0[0])]));
        self.set_gray(out);
        Ok(self)
    }

    // -- Algebraic morphology -------------------------------------------------

    /// Supremum of openings by a linear structuring element of the given odd
    /// `length`, rotated through 0..180 degrees in `angle_step` increments.
    ///
    /// Preserves thin elongated structures that a round element of comparable
    /// size would erase.
    #[instrument(skip(self))]
    pub fn algebraic_opening(&mut self, length: u8, angle_step: u32) -> Result<&mut Self> {
        let gray = self.gray()?;
        let masks = line_masks(length, angle_step)?;
        let mut result = GrayImage::new(gray.width(), gray.height());
        for mask in &masks {
            let opened = grayscale_open(&gray, mask);
            result = map_colors2(&result, &opened, |a, b| Luma([a.0[0].max(b.0[0])]));
        }
        self.set_gray(result);
        Ok(self)
    }

    /// Supremum of dilations by a rotated linear structuring element; see
    /// [`Image::algebraic_opening`] for the parameters.
    #[instrument(skip(self))]
    pub fn algebraic_dilation(&mut self, length: u8, angle_step: u32) -> Result<&mut Self> {
        let gray = self.gray()?;
        let masks = line_masks(length, angle_step)?;
        let mut result = GrayImage::new(gray.width(), gray.height());
        for mask in &masks {
            let dilated = grayscale_dilate(&gray, mask);
            result = map_colors2(&result, &dilated, |a, b| Luma([a.0[0].max(b.0[0])]));
        }
        self.set_gray(result);
        Ok(self)
    }

    // -- Edges ----------------------------------------------------------------

    /// Canny edge detection; thresholds must satisfy `0 < low < high`.
    #[instrument(skip(self))]
    pub fn edges(&mut self, low: f32, high: f32) -> Result<&mut Self> {
        if !low.is_finite() || !high.is_finite() || low <= 0.0 || high <= low {
            return Err(BildwerkError::InvalidArgument(format!(
                "canny thresholds ({}, {}) must satisfy 0 < low < high",
                low, high
            )));
        }
        let gray = self.gray()?;
        self.set_gray(canny(&gray, low, high));
        Ok(self)
    }

    /// Sobel gradient magnitude, scaled into the 8-bit range.
    #[instrument(skip(self))]
    pub fn sobel(&mut self) -> Result<&mut Self> {
        let gray = self.gray()?;
        let gradients = sobel_gradients(&gray);
        let max = gradients.pixels().map(|p| p.0[0]).max().unwrap_or(0);
        let out: GrayImage = if max > 0 {
            map_colors(&gradients, |p| {
                Luma([(p.0[0] as f32 / max as f32 * 255.0).round() as u8])
            })
        } else {
            GrayImage::new(gray.width(), gray.height())
        };
        self.set_gray(out);
        Ok(self)
    }
}

// -- Helpers ------------------------------------------------------------------

fn structuring_mask(radius: u8, shape: MorphShape) -> Result<Mask> {
    if radius == 0 {
        return Err(BildwerkError::InvalidArgument(
            "structuring element radius must be at least 1".to_string(),
        ));
    }
    Ok(match shape {
        MorphShape::Ellipse => Mask::disk(radius),
        MorphShape::Rect => Mask::square(radius),
        MorphShape::Diamond => Mask::diamond(radius),
    })
}

/// Linear structuring elements of the given length, one per rotation angle
/// in `0..180` stepping by `angle_step` degrees.
fn line_masks(length: u8, angle_step: u32) -> Result<Vec<Mask>> {
    if length < 3 || length % 2 == 0 {
        return Err(BildwerkError::InvalidArgument(format!(
            "line element length {} must be odd and at least 3",
            length
        )));
    }
    if !(1..=180).contains(&angle_step) {
        return Err(BildwerkError::InvalidArgument(format!(
            "angle step {} must lie in 1..=180",
            angle_step
        )));
    }

    let center = length / 2;
    let c = center as f32;
    let mut masks = Vec::new();
    for angle in (0..180).step_by(angle_step as usize) {
        let (sin, cos) = (angle as f32).to_radians().sin_cos();
        let mut canvas = GrayImage::new(length as u32, length as u32);
        draw_line_segment_mut(
            &mut canvas,
            (c - c * cos, c - c * sin),
            (c + c * cos, c + c * sin),
            Luma([255u8]),
        );
        masks.push(Mask::from_image(&canvas, center, center));
    }
    Ok(masks)
}

/// Real-part Gabor kernel at the bank's fixed scale, for one orientation in
/// radians.
fn gabor_kernel(theta: f32) -> Vec<f32> {
    let half = (GABOR_KSIZE / 2) as i32;
    let (sin_t, cos_t) = theta.sin_cos();
    let mut kernel = Vec::with_capacity((GABOR_KSIZE * GABOR_KSIZE) as usize);
    for y in -half..=half {
        for x in -half..=half {
            let xr = x as f32 * cos_t + y as f32 * sin_t;
            let yr = -(x as f32) * sin_t + y as f32 * cos_t;
            let envelope = (-(xr * xr + GABOR_GAMMA * GABOR_GAMMA * yr * yr)
                / (2.0 * GABOR_SIGMA * GABOR_SIGMA))
                .exp();
            let carrier =
                (2.0 * std::f32::consts::PI * xr / GABOR_WAVELENGTH + GABOR_PSI).cos();
            kernel.push(envelope * carrier);
        }
    }
    kernel
}

/// NxN correlation with clamped borders, saturating into u8.
fn convolve_clamped(image: &GrayImage, kernel: &[f32], ksize: u32) -> GrayImage {
    let (width, height) = image.dimensions();
    let half = (ksize / 2) as i64;
    ImageBuffer::from_fn(width, height, |x, y| {
        let mut acc = 0.0f32;
        for ky in 0..ksize as i64 {
            for kx in 0..ksize as i64 {
                let sx = (x as i64 + kx - half).clamp(0, width as i64 - 1) as u32;
                let sy = (y as i64 + ky - half).clamp(0, height as i64 - 1) as u32;
                let weight = kernel[(ky * ksize as i64 + kx) as usize];
                acc += weight * image.get_pixel(sx, sy).0[0] as f32;
            }
        }
        Luma([acc.round().clamp(0.0, 255.0) as u8])
    })
}

// -- Tests --------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgb, RgbImage};

    fn from_gray(buf: GrayImage) -> Image {
        Image::from_dynamic(DynamicImage::ImageLuma8(buf))
    }

    /// Verify that sharpening preserves flat regions and boosts a spot.
    #[test]
    fn sharpen_boosts_local_contrast() {
        let mut buf = GrayImage::from_pixel(9, 9, Luma([100u8]));
        buf.put_pixel(4, 4, Luma([200u8]));
        let mut img = from_gray(buf);
        img.sharpen().unwrap();
        let gray = img.gray().unwrap();
        assert_eq!(gray.get_pixel(0, 0).0[0], 100);
        assert_eq!(gray.get_pixel(4, 4).0[0], 255);
        assert_eq!(gray.get_pixel(3, 4).0[0], 0);
    }

    /// Verify sharpening refuses colour input.
    #[test]
    fn sharpen_rejects_colour() {
        let mut img = Image::from_dynamic(DynamicImage::ImageRgb8(RgbImage::from_pixel(
            4,
            4,
            Rgb([1, 2, 3]),
        )));
        assert!(matches!(
            img.sharpen(),
            Err(BildwerkError::RequiresGray { found: 3 })
        ));
    }

    /// Verify that opening erases a lone speck but keeps a large block.
    #[test]
    fn opening_removes_specks() {
        let mut buf = GrayImage::new(20, 20);
        buf.put_pixel(3, 3, Luma([255u8]));
        for y in 10..16 {
            for x in 10..16 {
                buf.put_pixel(x, y, Luma([255u8]));
            }
        }
        let mut img = from_gray(buf);
        img.opening(2, MorphShape::Ellipse).unwrap();
        let gray = img.gray().unwrap();
        assert_eq!(gray.get_pixel(3, 3).0[0], 0);
        assert_eq!(gray.get_pixel(12, 12).0[0], 255);
    }

    /// Verify that closing fills a small hole in a bright field.
    #[test]
    fn closing_fills_holes() {
        let mut buf = GrayImage::from_pixel(20, 20, Luma([255u8]));
        buf.put_pixel(10, 10, Luma([0u8]));
        let mut img = from_gray(buf);
        img.closing(2, MorphShape::Ellipse).unwrap();
        assert_eq!(img.gray().unwrap().get_pixel(10, 10).0[0], 255);
    }

    /// Verify dilation grows a dot and erosion shrinks it back.
    #[test]
    fn dilation_grows_and_erosion_shrinks() {
        let mut buf = GrayImage::new(11, 11);
        buf.put_pixel(5, 5, Luma([255u8]));
        let mut img = from_gray(buf);
        img.dilation(1, MorphShape::Rect).unwrap();
        assert_eq!(img.gray().unwrap().get_pixel(4, 4).0[0], 255);
        img.erosion(1, MorphShape::Rect).unwrap();
        let gray = img.gray().unwrap();
        assert_eq!(gray.get_pixel(5, 5).0[0], 255);
        assert_eq!(gray.get_pixel(4, 4).0[0], 0);
    }

    /// Verify a zero structuring-element radius is rejected.
    #[test]
    fn morphology_rejects_zero_radius() {
        let mut img = from_gray(GrayImage::new(8, 8));
        assert!(img.opening(0, MorphShape::Ellipse).is_err());
        assert!(img.erosion(0, MorphShape::Diamond).is_err());
    }

    /// Verify top-hat isolates small bright detail on a mid-gray field.
    #[test]
    fn tophat_extracts_small_bright_detail() {
        let mut buf = GrayImage::from_pixel(15, 15, Luma([100u8]));
        buf.put_pixel(7, 7, Luma([255u8]));
        let mut img = from_gray(buf);
        img.tophat(2, MorphShape::Ellipse).unwrap();
        let gray = img.gray().unwrap();
        assert_eq!(gray.get_pixel(7, 7).0[0], 155);
        assert_eq!(gray.get_pixel(3, 3).0[0], 0);
    }

    /// Verify black-hat isolates small dark detail on a bright field.
    #[test]
    fn blackhat_extracts_small_dark_detail() {
        let mut buf = GrayImage::from_pixel(15, 15, Luma([200u8]));
        buf.put_pixel(7, 7, Luma([0u8]));
        let mut img = from_gray(buf);
        img.blackhat(2, MorphShape::Ellipse).unwrap();
        let gray = img.gray().unwrap();
        assert_eq!(gray.get_pixel(7, 7).0[0], 200);
        assert_eq!(gray.get_pixel(3, 3).0[0], 0);
    }

    /// Verify the linear opening keeps a thin stroke a round opening erases.
    #[test]
    fn algebraic_opening_preserves_thin_stroke() {
        let mut buf = GrayImage::new(40, 20);
        for x in 5..35 {
            buf.put_pixel(x, 10, Luma([255u8]));
        }

        let mut round = from_gray(buf.clone());
        round.opening(2, MorphShape::Ellipse).unwrap();
        assert_eq!(round.gray().unwrap().get_pixel(20, 10).0[0], 0);

        let mut linear = from_gray(buf);
        linear.algebraic_opening(9, 30).unwrap();
        assert_eq!(linear.gray().unwrap().get_pixel(20, 10).0[0], 255);
    }

    /// Verify parameter validation for the linear structuring element.
    #[test]
    fn algebraic_rejects_bad_params() {
        let mut img = from_gray(GrayImage::new(8, 8));
        assert!(img.algebraic_opening(4, 30).is_err());
        assert!(img.algebraic_opening(9, 0).is_err());
        assert!(img.algebraic_dilation(9, 181).is_err());
    }

    /// Verify the Gabor bank rejects an empty orientation list and gives a
    /// zero response on flat input.
    #[test]
    fn gabor_flat_input_and_validation() {
        let mut img = from_gray(GrayImage::from_pixel(32, 32, Luma([128u8])));
        assert!(img.gabor(&[]).is_err());
        img.gabor(&[0.0, 45.0]).unwrap();
        assert!(img.gray().unwrap().pixels().all(|p| p.0[0] == 0));
    }

    /// Verify the Gabor bank responds to an oriented stroke.
    #[test]
    fn gabor_responds_to_oriented_stroke() {
        let mut buf = GrayImage::new(64, 64);
        for y in 0..64 {
            buf.put_pixel(32, y, Luma([255u8]));
        }
        let mut img = from_gray(buf);
        img.gabor(&[0.0]).unwrap();
        assert!(img.gray().unwrap().pixels().any(|p| p.0[0] > 0));
    }

    /// Verify Canny marks a step edge and validates its thresholds.
    #[test]
    fn edges_detects_step_and_validates() {
        let buf = GrayImage::from_fn(32, 32, |x, _| {
            if x < 16 { Luma([0u8]) } else { Luma([255u8]) }
        });
        let mut img = from_gray(buf);
        img.edges(50.0, 150.0).unwrap();
        let gray = img.gray().unwrap();
        assert!(gray.pixels().any(|p| p.0[0] == 255));

        let mut img = from_gray(GrayImage::new(8, 8));
        assert!(img.edges(0.0, 100.0).is_err());
        assert!(img.edges(150.0, 50.0).is_err());
    }

    /// Verify the Sobel magnitude peaks on a step edge and is flat elsewhere.
    #[test]
    fn sobel_highlights_edges() {
        let buf = GrayImage::from_fn(32, 32, |x, _| {
            if x < 16 { Luma([0u8]) } else { Luma([255u8]) }
        });
        let mut img = from_gray(buf);
        img.sobel().unwrap();
        let gray = img.gray().unwrap();
        assert_eq!(gray.get_pixel(2, 16).0[0], 0);
        assert!(gray.get_pixel(16, 16).0[0] > 200);

        let mut flat = from_gray(GrayImage::from_pixel(8, 8, Luma([77u8])));
        flat.sobel().unwrap();
        assert!(flat.gray().unwrap().pixels().all(|p| p.0[0] == 0));
    }
}
