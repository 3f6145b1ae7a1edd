// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Connected-component filtering for binary-style strips. Both operations
// treat the image as horizontally wrap-around, so objects crossing the seam
// of an unwrapped ring are measured whole.

use std::collections::HashMap;

use image::{GrayImage, ImageBuffer, Luma};
use imageproc::region_labelling::{Connectivity, connected_components};
use tracing::{debug, instrument};

use crate::error::{BildwerkError, Result};
use crate::image::Image;

impl Image {
    /// Erase connected components whose pixel area falls below `min_area` or
    /// above `max_area` (`None` leaves the upper bound open).
    ///
    /// Components are 8-connected and labelled on a seam-free widened copy,
    /// so objects wrapping the left/right border count as one.
    #[instrument(skip(self))]
    pub fn retain_objects(&mut self, min_area: u32, max_area: Option<u32>) -> Result<&mut Self> {
        if let Some(max) = max_area {
            if max < min_area {
                return Err(BildwerkError::InvalidArgument(format!(
                    "area bounds {}..{} are inverted",
                    min_area, max
                )));
            }
        }
        let gray = self.gray()?;
        let (w, h) = gray.dimensions();
        if w == 0 || h == 0 {
            return Ok(self);
        }

        // Half the image on each side makes every wrapped object contiguous
        // somewhere in the widened copy.
        let half = w / 2;
        let wide: GrayImage = ImageBuffer::from_fn(2 * w, h, |x, y| {
            Luma([gray.get_pixel((x + half) % w, y).0[0]])
        });
        let labels = connected_components(&wide, Connectivity::Eight, Luma([0u8]));

        let mut areas: HashMap<u32, u32> = HashMap::new();
        for px in labels.pixels() {
            if px.0[0] != 0 {
                *areas.entry(px.0[0]).or_insert(0) += 1;
            }
        }
        debug!(components = areas.len(), "Components labelled");

        let offset = w - half;
        let filtered: GrayImage = ImageBuffer::from_fn(w, h, |x, y| {
            let label = labels.get_pixel(offset + x, y).0[0];
            if label == 0 {
                return Luma([0u8]);
            }
            let area = areas.get(&label).copied().unwrap_or(0);
            if area < min_area || max_area.is_some_and(|max| area > max) {
                Luma([0u8])
            } else {
                Luma([gray.get_pixel(x, y).0[0]])
            }
        });
        self.set_gray(filtered);
        Ok(self)
    }

    /// Erase connected components whose bounding-box height is below
    /// `min_height_ratio` of the image height; the ratio must lie in
    /// `(0, 1]`.
    ///
    /// Labelling runs on a tripled copy, so wrapped objects are measured
    /// whole, like [`Image::retain_objects`].
    #[instrument(skip(self))]
    pub fn retain_tall(&mut self, min_height_ratio: f64) -> Result<&mut Self> {
        if !(min_height_ratio > 0.0 && min_height_ratio <= 1.0) {
            return Err(BildwerkError::InvalidArgument(format!(
                "height ratio {} must lie in (0, 1]",
                min_height_ratio
            )));
        }
        let gray = self.gray()?;
        let (w, h) = gray.dimensions();
        if w == 0 || h == 0 {
            return Ok(self);
        }

        let wide: GrayImage =
            ImageBuffer::from_fn(3 * w, h, |x, y| Luma([gray.get_pixel(x % w, y).0[0]]));
        let labels = connected_components(&wide, Connectivity::Eight, Luma([0u8]));

        let mut spans: HashMap<u32, (u32, u32)> = HashMap::new();
        for (_, y, px) in labels.enumerate_pixels() {
            let label = px.0[0];
            if label == 0 {
                continue;
            }
            spans
                .entry(label)
                .and_modify(|(top, bottom)| {
                    *top = (*top).min(y);
                    *bottom = (*bottom).max(y);
                })
                .or_insert((y, y));
        }
        let required = min_height_ratio * h as f64;

        let filtered: GrayImage = ImageBuffer::from_fn(w, h, |x, y| {
            let label = labels.get_pixel(w + x, y).0[0];
            if label == 0 {
                return Luma([0u8]);
            }
            let height = spans
                .get(&label)
                .map(|(top, bottom)| bottom - top + 1)
                .unwrap_or(0);
            if (height as f64) < required {
                Luma([0u8])
            } else {
                Luma([gray.get_pixel(x, y).0[0]])
            }
        });
        self.set_gray(filtered);
        Ok(self)
    }
}

// -- Tests --------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgb, RgbImage};

    fn from_gray(buf: GrayImage) -> Image {
        Image::from_dynamic(DynamicImage::ImageLuma8(buf))
    }

    /// Verify small components are erased while large ones keep their
    /// original values.
    #[test]
    fn retain_objects_erases_small_keeps_large() {
        let mut buf = GrayImage::new(30, 12);
        for y in 3..7 {
            for x in 10..15 {
                buf.put_pixel(x, y, Luma([200u8]));
            }
        }
        buf.put_pixel(25, 9, Luma([255u8]));

        let mut img = from_gray(buf);
        img.retain_objects(5, None).unwrap();
        let gray = img.gray().unwrap();
        assert_eq!(gray.get_pixel(12, 5).0[0], 200);
        assert_eq!(gray.get_pixel(25, 9).0[0], 0);
    }

    /// Verify the upper area bound erases large components.
    #[test]
    fn retain_objects_upper_bound() {
        let mut buf = GrayImage::new(30, 12);
        for y in 3..7 {
            for x in 10..15 {
                buf.put_pixel(x, y, Luma([200u8]));
            }
        }
        buf.put_pixel(25, 9, Luma([255u8]));

        let mut img = from_gray(buf);
        img.retain_objects(0, Some(10)).unwrap();
        let gray = img.gray().unwrap();
        assert_eq!(gray.get_pixel(12, 5).0[0], 0);
        assert_eq!(gray.get_pixel(25, 9).0[0], 255);
    }

    /// Verify an object crossing the left/right seam is measured as one.
    #[test]
    fn retain_objects_wraps_across_seam() {
        let mut buf = GrayImage::new(30, 12);
        for y in 4..6 {
            for x in [0u32, 1, 28, 29] {
                buf.put_pixel(x, y, Luma([255u8]));
            }
        }
        buf.put_pixel(10, 10, Luma([255u8]));
        buf.put_pixel(11, 10, Luma([255u8]));

        let mut img = from_gray(buf);
        img.retain_objects(6, None).unwrap();
        let gray = img.gray().unwrap();
        assert_eq!(gray.get_pixel(0, 4).0[0], 255);
        assert_eq!(gray.get_pixel(29, 5).0[0], 255);
        assert_eq!(gray.get_pixel(10, 10).0[0], 0);
    }

    /// Verify inverted area bounds are rejected.
    #[test]
    fn retain_objects_validates_bounds() {
        let mut img = from_gray(GrayImage::new(8, 8));
        assert!(img.retain_objects(10, Some(5)).is_err());

        let mut colour = Image::from_dynamic(DynamicImage::ImageRgb8(RgbImage::new(8, 8)));
        assert!(matches!(
            colour.retain_objects(1, None),
            Err(BildwerkError::RequiresGray { .. })
        ));
    }

    /// Verify tall strokes survive while squat blobs are erased.
    #[test]
    fn retain_tall_keeps_spanning_stroke() {
        let mut buf = GrayImage::new(20, 10);
        for y in 1..9 {
            buf.put_pixel(5, y, Luma([255u8]));
        }
        for y in 4..6 {
            for x in 12..14 {
                buf.put_pixel(x, y, Luma([255u8]));
            }
        }

        let mut img = from_gray(buf);
        img.retain_tall(0.5).unwrap();
        let gray = img.gray().unwrap();
        assert_eq!(gray.get_pixel(5, 4).0[0], 255);
        assert_eq!(gray.get_pixel(12, 4).0[0], 0);
    }

    /// Verify the height ratio domain.
    #[test]
    fn retain_tall_validates_ratio() {
        let mut img = from_gray(GrayImage::new(8, 8));
        assert!(img.retain_tall(0.0).is_err());
        assert!(img.retain_tall(1.5).is_err());
        assert!(img.retain_tall(f64::NAN).is_err());
    }
}
