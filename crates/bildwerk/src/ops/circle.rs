// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Circle analysis — gradient Hough detection, inscribed-rectangle cropping,
// and polar unwrapping of annular regions.

use image::{GrayImage, ImageBuffer, Luma, Rgb, RgbImage};
use imageproc::edges::canny;
use imageproc::gradients::{horizontal_sobel, vertical_sobel};
use tracing::{debug, info, instrument};

use crate::error::{BildwerkError, Result};
use crate::image::Image;
use crate::types::ResizeTarget;

// Gradient Hough parameters: Canny thresholds for the edge map, the minimum
// centre votes to accept a circle, and the radius searched when no lower
// bound is given.
const CANNY_LOW: f32 = 10.0;
const CANNY_HIGH: f32 = 20.0;
const ACCUMULATOR_THRESHOLD: u32 = 20;
const DEFAULT_MIN_RADIUS: u32 = 10;

impl Image {
    /// Find the strongest circle via a gradient Hough transform.
    ///
    /// Edge pixels vote for centres along their gradient direction for every
    /// candidate radius; the best centre then picks its radius by histogram.
    /// Zero radius bounds fall back to defaults (a small minimum, half the
    /// smaller image dimension as maximum). `downscale` shrinks a working
    /// copy for speed; the returned `((cx, cy), radius)` is scaled back to
    /// full resolution. Does not mutate the image.
    #[instrument(skip(self))]
    pub fn detect_circle(
        &self,
        min_radius: u32,
        max_radius: u32,
        downscale: u32,
    ) -> Result<((f64, f64), f64)> {
        if downscale == 0 {
            return Err(BildwerkError::InvalidArgument(
                "downscale factor must be at least 1".to_string(),
            ));
        }
        if min_radius > 0 && max_radius > 0 && min_radius > max_radius {
            return Err(BildwerkError::InvalidArgument(format!(
                "radius bounds {}..{} are inverted",
                min_radius, max_radius
            )));
        }
        self.gray()?;

        let mut work = self.clone();
        if downscale > 1 {
            work.resize(ResizeTarget::Scale(1.0 / downscale as f64))?;
        }
        let gray = work.gray()?;
        let (width, height) = gray.dimensions();

        let r_lo = if min_radius == 0 {
            DEFAULT_MIN_RADIUS
        } else {
            (min_radius / downscale).max(1)
        };
        let r_hi = if max_radius == 0 {
            (width.min(height) / 2).max(r_lo)
        } else {
            (max_radius / downscale).max(r_lo)
        };
        debug!(r_lo, r_hi, width, height, "Hough search range");

        let edges = canny(&gray, CANNY_LOW, CANNY_HIGH);
        let gx = horizontal_sobel(&gray);
        let gy = vertical_sobel(&gray);

        // Stage one: centre votes along the gradient line, both polarities,
        // collapsed over the radius range.
        let mut accumulator = vec![0u32; (width * height) as usize];
        for (x, y, px) in edges.enumerate_pixels() {
            if px.0[0] == 0 {
                continue;
            }
            let dx = gx.get_pixel(x, y).0[0] as f64;
            let dy = gy.get_pixel(x, y).0[0] as f64;
            let mag = (dx * dx + dy * dy).sqrt();
            if mag < 1e-3 {
                continue;
            }
            let (ux, uy) = (dx / mag, dy / mag);
            for r in r_lo..=r_hi {
                for sign in [1.0, -1.0] {
                    let cx = (x as f64 + sign * ux * r as f64).round();
                    let cy = (y as f64 + sign * uy * r as f64).round();
                    if cx >= 0.0 && cx < width as f64 && cy >= 0.0 && cy < height as f64 {
                        accumulator[(cy as u32 * width + cx as u32) as usize] += 1;
                    }
                }
            }
        }

        let (best_index, best_votes) = accumulator
            .iter()
            .enumerate()
            .max_by_key(|(_, votes)| **votes)
            .map(|(index, votes)| (index, *votes))
            .unwrap_or((0, 0));
        if best_votes < ACCUMULATOR_THRESHOLD {
            return Err(BildwerkError::NoCircle(format!(
                "no circle with radius in {}..{} found",
                r_lo * downscale,
                r_hi * downscale
            )));
        }
        let best_cx = (best_index as u32 % width) as f64;
        let best_cy = (best_index as u32 / width) as f64;

        // Stage two: the winning centre picks its radius from the distances
        // of the supporting edge pixels.
        let mut radius_votes = vec![0u32; (r_hi + 1) as usize];
        for (x, y, px) in edges.enumerate_pixels() {
            if px.0[0] == 0 {
                continue;
            }
            let d = ((x as f64 - best_cx).powi(2) + (y as f64 - best_cy).powi(2)).sqrt();
            let r = d.round() as u32;
            if (r_lo..=r_hi).contains(&r) {
                radius_votes[r as usize] += 1;
            }
        }
        let best_radius = (r_lo..=r_hi)
            .max_by_key(|r| radius_votes[*r as usize])
            .unwrap_or(r_lo);

        let scale = downscale as f64;
        let center = (best_cx * scale, best_cy * scale);
        let radius = best_radius as f64 * scale;
        info!(
            cx = center.0,
            cy = center.1,
            radius,
            votes = best_votes,
            "Circle detected"
        );
        Ok((center, radius))
    }

    /// Crop to the axis-aligned rectangle of aspect `ratio` (width over
    /// height) inscribed in the given circle.
    ///
    /// The rectangle must lie entirely within the image.
    #[instrument(skip(self))]
    pub fn crop_inscribed(
        &mut self,
        center: (f64, f64),
        radius: f64,
        ratio: f64,
    ) -> Result<&mut Self> {
        if !radius.is_finite() || radius <= 0.0 {
            return Err(BildwerkError::InvalidArgument(format!(
                "circle radius {} must be positive",
                radius
            )));
        }
        if !ratio.is_finite() || ratio <= 0.0 {
            return Err(BildwerkError::InvalidArgument(format!(
                "aspect ratio {} must be positive",
                ratio
            )));
        }

        let half_h = radius / (ratio * ratio + 1.0).sqrt();
        let half_w = half_h * ratio;
        let tl = (center.0 - half_w, center.1 - half_h);
        let br = (center.0 + half_w, center.1 + half_h);
        if tl.0 < 0.0 || tl.1 < 0.0 || br.0 > self.width() as f64 || br.1 > self.height() as f64 {
            return Err(BildwerkError::InvalidArgument(format!(
                "inscribed rectangle {:?}..{:?} falls outside the image",
                tl, br
            )));
        }
        self.crop((tl.0 as u32, tl.1 as u32), (br.0 as u32, br.1 as u32))
    }

    /// Unwrap the annulus between the two radii into a rectangular strip.
    ///
    /// Rows run from the outer to the inner radius, columns sweep the full
    /// turn with roughly one-pixel angular steps at the mean radius. The
    /// radii are taken in either order; both must be positive, smaller than
    /// half the smaller image dimension, and the annulus must lie fully
    /// inside the image.
    #[instrument(skip(self))]
    pub fn unwrap_ring(&mut self, center: (u32, u32), radii: (u32, u32)) -> Result<&mut Self> {
        let inner = radii.0.min(radii.1);
        let outer = radii.0.max(radii.1);
        let (w, h) = (self.width(), self.height());

        if inner == 0 {
            return Err(BildwerkError::InvalidArgument(
                "ring radii must be positive".to_string(),
            ));
        }
        if inner == outer {
            return Err(BildwerkError::InvalidArgument(
                "ring radii must differ".to_string(),
            ));
        }
        if outer >= w.min(h) / 2 {
            return Err(BildwerkError::InvalidArgument(format!(
                "outer radius {} must be smaller than half the image's smaller dimension",
                outer
            )));
        }
        if center.0 < outer || center.0 + outer >= w || center.1 < outer || center.1 + outer >= h {
            return Err(BildwerkError::InvalidArgument(format!(
                "ring of radius {} around {:?} falls outside the image",
                outer, center
            )));
        }

        let mean_radius = (inner + outer) as f64 / 2.0;
        let step = (1.0 / mean_radius).asin();
        let columns = (2.0 * std::f64::consts::PI / step).ceil() as u32;
        let rows = outer - inner;
        debug!(rows, columns, "Unwrapping ring");

        let (cx, cy) = (center.0 as f64, center.1 as f64);
        let sample_at = |col: u32, row: u32| -> (u32, u32) {
            let r = (outer - row) as f64;
            let a = col as f64 * step;
            let x = (cx - r * a.sin()).round() as u32;
            let y = (cy - r * a.cos()).round() as u32;
            (x, y)
        };

        if self.dim() == 2 {
            let gray = self.gray()?;
            let strip: GrayImage = ImageBuffer::from_fn(columns, rows, |col, row| {
                let (x, y) = sample_at(col, row);
                Luma([gray.get_pixel(x, y).0[0]])
            });
            self.set_gray(strip);
        } else {
            let rgb = self.rgb();
            let strip: RgbImage = ImageBuffer::from_fn(columns, rows, |col, row| {
                let (x, y) = sample_at(col, row);
                Rgb(rgb.get_pixel(x, y).0)
            });
            self.set_rgb(strip);
        }
        Ok(self)
    }
}

// -- Tests --------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use image::DynamicImage;
    use imageproc::drawing::draw_filled_circle_mut;

    fn disk_fixture(size: u32, center: (i32, i32), radius: i32) -> Image {
        let mut buf = GrayImage::new(size, size);
        draw_filled_circle_mut(&mut buf, center, radius, Luma([255u8]));
        Image::from_dynamic(DynamicImage::ImageLuma8(buf))
    }

    /// Verify the detector recovers a drawn circle within tolerance.
    #[test]
    fn detect_circle_recovers_drawn_circle() {
        let img = disk_fixture(128, (64, 64), 30);
        let ((cx, cy), radius) = img.detect_circle(20, 40, 1).unwrap();
        assert!((cx - 64.0).abs() <= 5.0, "cx = {}", cx);
        assert!((cy - 64.0).abs() <= 5.0, "cy = {}", cy);
        assert!((radius - 30.0).abs() <= 5.0, "radius = {}", radius);
    }

    /// Verify detection still works on a downscaled working copy.
    #[test]
    fn detect_circle_with_downscale() {
        let img = disk_fixture(128, (64, 64), 30);
        let ((cx, _), radius) = img.detect_circle(20, 40, 2).unwrap();
        assert!((cx - 64.0).abs() <= 8.0, "cx = {}", cx);
        assert!((radius - 30.0).abs() <= 8.0, "radius = {}", radius);
    }

    /// Verify a blank image produces a typed no-circle error.
    #[test]
    fn detect_circle_errors_on_blank() {
        let img = Image::from_dynamic(DynamicImage::ImageLuma8(GrayImage::new(64, 64)));
        assert!(matches!(
            img.detect_circle(5, 20, 1),
            Err(BildwerkError::NoCircle(_))
        ));
    }

    /// Verify parameter validation for the detector.
    #[test]
    fn detect_circle_validates_params() {
        let img = disk_fixture(64, (32, 32), 10);
        assert!(img.detect_circle(5, 20, 0).is_err());
        assert!(img.detect_circle(30, 10, 1).is_err());

        let colour = Image::from_dynamic(DynamicImage::ImageRgb8(RgbImage::from_pixel(
            8,
            8,
            Rgb([1, 2, 3]),
        )));
        assert!(matches!(
            colour.detect_circle(5, 20, 1),
            Err(BildwerkError::RequiresGray { .. })
        ));
    }

    /// Verify the inscribed square crop of a centred circle.
    #[test]
    fn crop_inscribed_square_inside_circle() {
        let mut img = Image::from_dynamic(DynamicImage::ImageLuma8(GrayImage::from_pixel(
            100,
            100,
            Luma([9u8]),
        )));
        img.crop_inscribed((50.0, 50.0), 20.0, 1.0).unwrap();
        assert_eq!((img.width(), img.height()), (29, 29));
    }

    /// Verify rejection when the rectangle leaves the image or the arguments
    /// are out of range.
    #[test]
    fn crop_inscribed_validates() {
        let mut img = Image::from_dynamic(DynamicImage::ImageLuma8(GrayImage::from_pixel(
            100,
            100,
            Luma([9u8]),
        )));
        assert!(img.crop_inscribed((10.0, 10.0), 20.0, 1.0).is_err());
        assert!(img.crop_inscribed((50.0, 50.0), 0.0, 1.0).is_err());
        assert!(img.crop_inscribed((50.0, 50.0), 20.0, -1.0).is_err());
    }

    /// Verify the unwrap geometry: row count, column count, and that each
    /// row samples its own radius.
    #[test]
    fn unwrap_ring_samples_by_radius() {
        let buf = GrayImage::from_fn(64, 64, |x, y| {
            let dx = x as f64 - 32.0;
            let dy = y as f64 - 32.0;
            Luma([(dx * dx + dy * dy).sqrt().round() as u8])
        });
        let mut img = Image::from_dynamic(DynamicImage::ImageLuma8(buf));
        img.unwrap_ring((32, 32), (10, 20)).unwrap();

        assert_eq!(img.height(), 10);
        assert_eq!(img.width(), 95);
        let gray = img.gray().unwrap();
        assert_eq!(gray.get_pixel(0, 0).0[0], 20);
        assert_eq!(gray.get_pixel(0, 5).0[0], 15);
    }

    /// Verify the annulus bounds checks.
    #[test]
    fn unwrap_ring_validates_bounds() {
        let mut img = Image::from_dynamic(DynamicImage::ImageLuma8(GrayImage::new(64, 64)));
        assert!(img.unwrap_ring((32, 32), (0, 20)).is_err());
        assert!(img.unwrap_ring((32, 32), (10, 10)).is_err());
        assert!(img.unwrap_ring((32, 32), (10, 40)).is_err());
        assert!(img.unwrap_ring((3, 3), (1, 4)).is_err());
    }
}
