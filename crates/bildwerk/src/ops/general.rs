// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// General transforms — negation, the blur family, resizing, rotation,
// histogram equalisation, and the distance transform.

use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, ImageBuffer, Luma, Rgb, RgbImage};
use imageproc::distance_transform::euclidean_squared_distance_transform;
use imageproc::filter::{bilateral_filter, box_filter, gaussian_blur_f32, median_filter};
use imageproc::geometric_transformations::{self, Interpolation};
use imageproc::map::map_colors;
use tracing::{debug, info, instrument};

use crate::error::{BildwerkError, Result};
use crate::image::Image;
use crate::types::{BlurMethod, ResizeTarget};

/// Colour and spatial sigma for the bilateral filter.
const BILATERAL_SIGMA: f32 = 100.0;

impl Image {
    // -- Intensity ------------------------------------------------------------

    /// Invert intensities. Only defined for single-channel images.
    pub fn negate(&mut self) -> Result<&mut Self> {
        if let DynamicImage::ImageLuma16(buf) = self.as_dynamic() {
            let inverted = map_colors(buf, |p| Luma([u16::MAX - p.0[0]]));
            self.set_gray16(inverted);
            return Ok(self);
        }
        let gray = self.gray()?;
        let inverted = map_colors(&gray, |p| Luma([255 - p.0[0]]));
        self.set_gray(inverted);
        Ok(self)
    }

    // -- Smoothing ------------------------------------------------------------

    /// Smooth the image with the chosen filter.
    ///
    /// `size` is the kernel side length and must be odd and at least 3. For
    /// `BlurMethod::Gaussian` the sigma is derived from the kernel size. The
    /// box and bilateral filters run per channel on colour input.
    #[instrument(skip(self))]
    pub fn blur(&mut self, size: u32, method: BlurMethod) -> Result<&mut Self> {
        if size < 3 || size % 2 == 0 {
            return Err(BildwerkError::InvalidArgument(format!(
                "blur size {} must be odd and at least 3",
                size
            )));
        }
        let radius = size / 2;
        debug!(size, ?method, "Applying blur");

        match method {
            BlurMethod::Gaussian => {
                self.gaussian_blur(sigma_for_kernel(size))?;
            }
            BlurMethod::Average => {
                if self.dim() == 2 {
                    let gray = self.gray()?;
                    self.set_gray(box_filter(&gray, radius, radius));
                } else {
                    let rgb = self.rgb();
                    self.set_rgb(per_channel(&rgb, |plane| box_filter(plane, radius, radius)));
                }
            }
            BlurMethod::Median => {
                if self.dim() == 2 {
                    let gray = self.gray()?;
                    self.set_gray(median_filter(&gray, radius, radius));
                } else {
                    let rgb = self.rgb();
                    self.set_rgb(median_filter(&rgb, radius, radius));
                }
            }
            BlurMethod::Bilateral => {
                if self.dim() == 2 {
                    let gray = self.gray()?;
                    self.set_gray(bilateral_filter(
                        &gray,
                        size,
                        BILATERAL_SIGMA,
                        BILATERAL_SIGMA,
                    ));
                } else {
                    let rgb = self.rgb();
                    self.set_rgb(per_channel(&rgb, |plane| {
                        bilateral_filter(plane, size, BILATERAL_SIGMA, BILATERAL_SIGMA)
                    }));
                }
            }
        }
        Ok(self)
    }

    /// Gaussian smoothing with an explicit sigma.
    #[instrument(skip(self))]
    pub fn gaussian_blur(&mut self, sigma: f32) -> Result<&mut Self> {
        if !sigma.is_finite() || sigma <= 0.0 {
            return Err(BildwerkError::InvalidArgument(format!(
                "gaussian sigma {} must be positive and finite",
                sigma
            )));
        }
        if self.dim() == 2 {
            let gray = self.gray()?;
            self.set_gray(gaussian_blur_f32(&gray, sigma));
        } else {
            let rgb = self.rgb();
            self.set_rgb(gaussian_blur_f32(&rgb, sigma));
        }
        Ok(self)
    }

    // -- Resizing -------------------------------------------------------------

    /// Resize preserving the aspect ratio, with Lanczos3 filtering.
    #[instrument(skip(self))]
    pub fn resize(&mut self, target: ResizeTarget) -> Result<&mut Self> {
        self.resize_with(target, FilterType::Lanczos3)
    }

    /// Resize preserving the aspect ratio, with an explicit filter.
    pub fn resize_with(&mut self, target: ResizeTarget, filter: FilterType) -> Result<&mut Self> {
        let (w, h) = (self.width(), self.height());
        let (new_w, new_h) = match target {
            ResizeTarget::Width(px) => {
                if px == 0 {
                    return Err(BildwerkError::InvalidArgument(
                        "resize width must be positive".to_string(),
                    ));
                }
                let scaled = (h as f64 * px as f64 / w as f64).round().max(1.0) as u32;
                (px, scaled)
            }
            ResizeTarget::Height(px) => {
                if px == 0 {
                    return Err(BildwerkError::InvalidArgument(
                        "resize height must be positive".to_string(),
                    ));
                }
                let scaled = (w as f64 * px as f64 / h as f64).round().max(1.0) as u32;
                (scaled, px)
            }
            ResizeTarget::Scale(factor) => {
                if !factor.is_finite() || factor <= 0.0 {
                    return Err(BildwerkError::InvalidArgument(format!(
                        "resize scale {} must be positive and finite",
                        factor
                    )));
                }
                (
                    (w as f64 * factor).round().max(1.0) as u32,
                    (h as f64 * factor).round().max(1.0) as u32,
                )
            }
        };
        info!(from_w = w, from_h = h, new_w, new_h, "Resizing image");
        let resized = self.as_dynamic().resize_exact(new_w, new_h, filter);
        self.set_dynamic(resized);
        Ok(self)
    }

    /// Resize to exactly `width` x `height`, ignoring the aspect ratio.
    #[instrument(skip(self))]
    pub fn resize_exact(&mut self, width: u32, height: u32) -> Result<&mut Self> {
        if width == 0 || height == 0 {
            return Err(BildwerkError::InvalidArgument(format!(
                "resize dimensions {}x{} must be positive",
                width, height
            )));
        }
        let resized = self
            .as_dynamic()
            .resize_exact(width, height, FilterType::Lanczos3);
        self.set_dynamic(resized);
        Ok(self)
    }

    // -- Rotation -------------------------------------------------------------

    /// Rotate a quarter turn clockwise.
    pub fn rotate90(&mut self) -> &mut Self {
        let rotated = self.as_dynamic().rotate90();
        self.set_dynamic(rotated);
        self
    }

    /// Rotate by an arbitrary angle in degrees about `center`, or about the
    /// image centre when `center` is `None`.
    ///
    /// Positive angles turn counter-clockwise. The canvas keeps its size,
    /// sampling is nearest-neighbour and uncovered pixels become black.
    #[instrument(skip(self))]
    pub fn rotate(&mut self, angle_deg: f32, center: Option<(f32, f32)>) -> Result<&mut Self> {
        if !angle_deg.is_finite() {
            return Err(BildwerkError::InvalidArgument(format!(
                "rotation angle {} must be finite",
                angle_deg
            )));
        }
        // The library measures positive angles clockwise.
        let theta = -angle_deg.to_radians();

        if self.dim() == 2 {
            let gray = self.gray()?;
            let rotated = match center {
                Some(c) => geometric_transformations::rotate(
                    &gray,
                    c,
                    theta,
                    Interpolation::Nearest,
                    Luma([0u8]),
                ),
                None => geometric_transformations::rotate_about_center(
                    &gray,
                    theta,
                    Interpolation::Nearest,
                    Luma([0u8]),
                ),
            };
            self.set_gray(rotated);
        } else {
            let rgb = self.rgb();
            let rotated = match center {
                Some(c) => geometric_transformations::rotate(
                    &rgb,
                    c,
                    theta,
                    Interpolation::Nearest,
                    Rgb([0u8, 0, 0]),
                ),
                None => geometric_transformations::rotate_about_center(
                    &rgb,
                    theta,
                    Interpolation::Nearest,
                    Rgb([0u8, 0, 0]),
                ),
            };
            self.set_rgb(rotated);
        }
        Ok(self)
    }

    // -- Histogram ------------------------------------------------------------

    /// Histogram equalisation, then clipping of the `clip_rate` fraction of
    /// mass at each tail of the equalised histogram.
    ///
    /// A rate of zero equalises without clipping; `clip_rate` must lie in
    /// `[0, 0.5)`.
    #[instrument(skip(self))]
    pub fn equalize_hist(&mut self, clip_rate: f64) -> Result<&mut Self> {
        if !(0.0..0.5).contains(&clip_rate) {
            return Err(BildwerkError::InvalidArgument(format!(
                "clip rate {} must lie in [0, 0.5)",
                clip_rate
            )));
        }
        let gray = self.gray()?;
        let equalized = imageproc::contrast::equalize_histogram(&gray);

        let mut histogram = [0u64; 256];
        for pixel in equalized.pixels() {
            histogram[pixel.0[0] as usize] += 1;
        }
        let total = equalized.width() as u64 * equalized.height() as u64;
        let lo_mass = clip_rate * total as f64;
        let hi_mass = (1.0 - clip_rate) * total as f64;

        let mut cumulative = 0u64;
        let mut lo: Option<u8> = None;
        let mut hi: Option<u8> = None;
        for (value, &count) in histogram.iter().enumerate() {
            cumulative += count;
            if lo.is_none() && cumulative as f64 >= lo_mass {
                lo = Some(value as u8);
            }
            if cumulative as f64 <= hi_mass {
                hi = Some(value as u8);
            }
        }
        let lo = lo.unwrap_or(0);
        let hi = hi.unwrap_or(0);
        debug!(lo, hi, "Clipping equalised histogram");

        // For extreme rates `hi` can land below `lo`; max-then-min keeps
        // that case defined.
        let clipped = map_colors(&equalized, |p| Luma([p.0[0].max(lo).min(hi)]));
        self.set_gray(clipped);
        Ok(self)
    }

    // -- Distance -------------------------------------------------------------

    /// Per-pixel L2 distance to the nearest zero pixel, min-max normalised to
    /// the full 8-bit range.
    ///
    /// At least one zero pixel must exist for the distances to be defined.
    #[instrument(skip(self))]
    pub fn distance_transform(&mut self) -> Result<&mut Self> {
        let gray = self.gray()?;
        if !gray.pixels().any(|p| p.0[0] == 0) {
            return Err(BildwerkError::InvalidArgument(
                "distance transform requires at least one zero pixel".to_string(),
            ));
        }

        // Mark the zero pixels as foreground so the library measures the
        // distance from every other pixel to them.
        let zero_mask = map_colors(&gray, |p| {
            if p.0[0] == 0 { Luma([255u8]) } else { Luma([0u8]) }
        });
        let squared = euclidean_squared_distance_transform(&zero_mask);

        let mut max_dist = 0f64;
        for p in squared.pixels() {
            let d = p.0[0].sqrt();
            if d > max_dist {
                max_dist = d;
            }
        }
        let out: GrayImage = if max_dist > 0.0 {
            map_colors(&squared, |p| {
                Luma([(p.0[0].sqrt() / max_dist * 255.0).round() as u8])
            })
        } else {
            GrayImage::new(gray.width(), gray.height())
        };
        debug!(max_dist, "Distance transform complete");
        self.set_gray(out);
        Ok(self)
    }
}

// -- Helpers ------------------------------------------------------------------

/// Sigma for a size-parameterised Gaussian kernel, the conventional
/// derivation from the kernel side length.
fn sigma_for_kernel(size: u32) -> f32 {
    0.3 * ((size as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

/// Apply a grayscale filter to each RGB channel independently and recombine.
fn per_channel<F>(rgb: &RgbImage, f: F) -> RgbImage
where
    F: Fn(&GrayImage) -> GrayImage,
{
    let (w, h) = rgb.dimensions();
    let mut planes = Vec::with_capacity(3);
    for c in 0..3 {
        let plane: GrayImage =
            ImageBuffer::from_fn(w, h, |x, y| Luma([rgb.get_pixel(x, y).0[c]]));
        planes.push(f(&plane));
    }
    ImageBuffer::from_fn(w, h, |x, y| {
        Rgb([
            planes[0].get_pixel(x, y).0[0],
            planes[1].get_pixel(x, y).0[0],
            planes[2].get_pixel(x, y).0[0],
        ])
    })
}

// -- Tests --------------------------------------------------------------------
