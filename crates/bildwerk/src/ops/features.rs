// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Feature preparation — normalised integral images and circular shifts.

use image::{GrayImage, ImageBuffer, Luma, RgbImage};

use crate::image::Image;
use crate::ops::threshold::summed_area_table;

impl Image {
    /// Replace the buffer with its summed-area table, min-max stretched into
    /// a 16-bit gray image. The table carries a zero border, so the output
    /// is one pixel wider and taller than the input.
    pub fn integral(&mut self) -> &mut Self {
        let gray = self.as_dynamic().to_luma8();
        let (w, h) = gray.dimensions();
        let table = summed_area_table(&gray);
        let stride = (w + 1) as usize;
        let total = table[table.len() - 1];

        let out: ImageBuffer<Luma<u16>, Vec<u16>> = if total == 0 {
            ImageBuffer::from_pixel(w + 1, h + 1, Luma([0u16]))
        } else {
            ImageBuffer::from_fn(w + 1, h + 1, |x, y| {
                let val = table[y as usize * stride + x as usize];
                Luma([(val as f64 / total as f64 * 65535.0).round() as u16])
            })
        };
        self.set_gray16(out);
        self
    }

    /// Circular shift along the x-axis: each output column `x` takes the
    /// input column `(x + offset) mod width`, so positive offsets move
    /// content towards the left edge.
    pub fn shift_x(&mut self, offset: i64) -> &mut Self {
        let (w, h) = (self.width(), self.height());
        if self.dim() == 2 {
            let gray = self.as_dynamic().to_luma8();
            let out: GrayImage = ImageBuffer::from_fn(w, h, |x, y| {
                let src = (x as i64 + offset).rem_euclid(w as i64) as u32;
                *gray.get_pixel(src, y)
            });
            self.set_gray(out);
        } else {
            let rgb = self.rgb();
            let out: RgbImage = ImageBuffer::from_fn(w, h, |x, y| {
                let src = (x as i64 + offset).rem_euclid(w as i64) as u32;
                *rgb.get_pixel(src, y)
            });
            self.set_rgb(out);
        }
        self
    }

    /// Circular shift along the y-axis; positive offsets move content
    /// towards the top edge.
    pub fn shift_y(&mut self, offset: i64) -> &mut Self {
        let (w, h) = (self.width(), self.height());
        if self.dim() == 2 {
            let gray = self.as_dynamic().to_luma8();
            let out: GrayImage = ImageBuffer::from_fn(w, h, |x, y| {
                let src = (y as i64 + offset).rem_euclid(h as i64) as u32;
                *gray.get_pixel(x, src)
            });
            self.set_gray(out);
        } else {
            let rgb = self.rgb();
            let out: RgbImage = ImageBuffer::from_fn(w, h, |x, y| {
                let src = (y as i64 + offset).rem_euclid(h as i64) as u32;
                *rgb.get_pixel(x, src)
            });
            self.set_rgb(out);
        }
        self
    }
}

// -- Tests --------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgb};

    fn gray_fixture(buf: GrayImage) -> Image {
        Image::from_dynamic(DynamicImage::ImageLuma8(buf))
    }

    /// Verify the integral output shape and its anchor values.
    #[test]
    fn integral_scales_running_sums() {
        let mut buf = GrayImage::new(2, 2);
        buf.put_pixel(0, 0, Luma([10u8]));
        buf.put_pixel(1, 0, Luma([20u8]));
        buf.put_pixel(0, 1, Luma([30u8]));
        buf.put_pixel(1, 1, Luma([40u8]));
        let mut img = gray_fixture(buf);
        img.integral();

        assert_eq!(img.shape(), (3, 3, 1));
        match img.as_dynamic() {
            DynamicImage::ImageLuma16(wide) => {
                assert_eq!(wide.get_pixel(0, 0).0[0], 0);
                assert_eq!(wide.get_pixel(2, 0).0[0], 0);
                assert_eq!(wide.get_pixel(0, 2).0[0], 0);
                // Column sum 10 + 30 = 40 out of 100 total.
                assert_eq!(wide.get_pixel(1, 2).0[0], 26214);
                assert_eq!(wide.get_pixel(2, 2).0[0], 65535);
            }
            other => panic!("unexpected buffer kind: {:?}", other.color()),
        }
    }

    /// Verify an all-zero image integrates to zeros instead of dividing by
    /// the empty total.
    #[test]
    fn integral_of_zeros_is_zeros() {
        let mut img = gray_fixture(GrayImage::new(4, 4));
        img.integral();
        assert_eq!(img.shape(), (5, 5, 1));
        match img.as_dynamic() {
            DynamicImage::ImageLuma16(wide) => {
                assert!(wide.pixels().all(|p| p.0[0] == 0));
            }
            other => panic!("unexpected buffer kind: {:?}", other.color()),
        }
    }

    /// Verify colour input is grayscaled before integration.
    #[test]
    fn integral_accepts_colour() {
        let buf = RgbImage::from_pixel(3, 3, Rgb([50, 100, 150]));
        let mut img = Image::from_dynamic(DynamicImage::ImageRgb8(buf));
        img.integral();
        assert_eq!(img.shape(), (4, 4, 1));
    }

    /// Verify a positive x shift moves content left with wrap-around.
    #[test]
    fn shift_x_moves_content_left() {
        let mut buf = GrayImage::new(8, 4);
        buf.put_pixel(5, 1, Luma([200u8]));
        let mut img = gray_fixture(buf);
        img.shift_x(2);
        let gray = img.gray().unwrap();
        assert_eq!(gray.get_pixel(3, 1).0[0], 200);
        assert_eq!(gray.get_pixel(5, 1).0[0], 0);
    }

    /// Verify negative offsets wrap the other way.
    #[test]
    fn shift_x_negative_wraps() {
        let mut buf = GrayImage::new(8, 4);
        buf.put_pixel(0, 2, Luma([77u8]));
        let mut img = gray_fixture(buf);
        img.shift_x(-3);
        let gray = img.gray().unwrap();
        assert_eq!(gray.get_pixel(3, 2).0[0], 77);
    }

    /// Verify shifting by a full period is the identity.
    #[test]
    fn shift_by_full_width_is_identity() {
        let buf = GrayImage::from_fn(6, 3, |x, y| Luma([(x * 10 + y) as u8]));
        let mut img = gray_fixture(buf.clone());
        img.shift_x(6);
        assert_eq!(img.gray().unwrap(), buf);
    }

    /// Verify y shifts move rows and keep colour channels intact.
    #[test]
    fn shift_y_moves_rows() {
        let mut buf = RgbImage::new(4, 8);
        buf.put_pixel(2, 6, Rgb([200, 10, 30]));
        let mut img = Image::from_dynamic(DynamicImage::ImageRgb8(buf));
        img.shift_y(4);
        assert_eq!(img.rgb().get_pixel(2, 2).0, [200, 10, 30]);
        assert_eq!(img.rgb().get_pixel(2, 6).0, [0, 0, 0]);
    }
}
