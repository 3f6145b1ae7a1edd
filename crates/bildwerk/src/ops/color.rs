// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Colour handling — channel-count coercions, HSV and CIELAB conversions in
// 8-bit encodings, min-max normalisation, and k-means quantisation.

use image::{GrayImage, ImageBuffer, Luma, Rgb, RgbImage};
use imageproc::map::map_colors;
use rand::Rng;
use tracing::{info, instrument};

use crate::error::{BildwerkError, Result};
use crate::image::Image;

/// Independent seeding attempts per quantisation; the lowest-inertia run
/// wins.
const KMEANS_ATTEMPTS: u32 = 10;

impl Image {
    // -- Coercions ------------------------------------------------------------

    /// Collapse to a single luminance channel. Single-channel input is left
    /// unchanged.
    pub fn to_gray(&mut self) -> &mut Self {
        if self.dim() != 2 {
            let gray = self.as_dynamic().to_luma8();
            self.set_gray(gray);
        }
        self
    }

    /// Ensure a three-channel buffer, replicating luminance if needed.
    pub fn to_rgb(&mut self) -> &mut Self {
        if self.channel_count() != 3 {
            let rgb = self.as_dynamic().to_rgb8();
            self.set_rgb(rgb);
        }
        self
    }

    // -- Colorspaces ----------------------------------------------------------

    /// Reinterpret RGB pixels as 8-bit HSV: hue in half-degrees (0..180),
    /// saturation and value over the full byte range.
    pub fn rgb_to_hsv(&mut self) -> Result<&mut Self> {
        let rgb = self.rgb_strict()?;
        self.set_rgb(map_colors(&rgb, rgb_px_to_hsv));
        Ok(self)
    }

    /// Inverse of [`Image::rgb_to_hsv`].
    pub fn hsv_to_rgb(&mut self) -> Result<&mut Self> {
        let hsv = self.rgb_strict()?;
        self.set_rgb(map_colors(&hsv, hsv_px_to_rgb));
        Ok(self)
    }

    /// Convert RGB pixels to 8-bit CIELAB: L scaled onto 0..255, a and b
    /// offset by 128. Uses the sRGB D65 white point.
    pub fn rgb_to_lab(&mut self) -> Result<&mut Self> {
        let rgb = self.rgb_strict()?;
        self.set_rgb(map_colors(&rgb, rgb_px_to_lab));
        Ok(self)
    }

    /// Inverse of [`Image::rgb_to_lab`].
    pub fn lab_to_rgb(&mut self) -> Result<&mut Self> {
        let lab = self.rgb_strict()?;
        self.set_rgb(map_colors(&lab, lab_px_to_rgb));
        Ok(self)
    }

    // -- Normalisation --------------------------------------------------------

    /// Min-max stretch of a single-channel buffer onto the full 8-bit range.
    ///
    /// A constant image maps to all zeros.
    pub fn normalize_u8(&mut self) -> Result<&mut Self> {
        if self.dim() != 2 {
            return Err(BildwerkError::RequiresGray {
                found: self.channel_count(),
            });
        }
        let wide = self.as_dynamic().to_luma16();
        let min = wide.pixels().map(|p| p.0[0]).min().unwrap_or(0);
        let max = wide.pixels().map(|p| p.0[0]).max().unwrap_or(0);
        let out: GrayImage = if max > min {
            let range = (max - min) as f64;
            map_colors(&wide, |p| {
                Luma([((p.0[0] - min) as f64 / range * 255.0).round() as u8])
            })
        } else {
            GrayImage::new(wide.width(), wide.height())
        };
        self.set_gray(out);
        Ok(self)
    }

    /// Min-max stretch of a single-channel buffer onto the full 16-bit range.
    ///
    /// A constant image maps to all zeros.
    pub fn normalize_u16(&mut self) -> Result<&mut Self> {
        if self.dim() != 2 {
            return Err(BildwerkError::RequiresGray {
                found: self.channel_count(),
            });
        }
        let wide = self.as_dynamic().to_luma16();
        let min = wide.pixels().map(|p| p.0[0]).min().unwrap_or(0);
        let max = wide.pixels().map(|p| p.0[0]).max().unwrap_or(0);
        let out: ImageBuffer<Luma<u16>, Vec<u16>> = if max > min {
            let range = (max - min) as f64;
            map_colors(&wide, |p| {
                Luma([((p.0[0] - min) as f64 / range * 65535.0).round() as u16])
            })
        } else {
            ImageBuffer::from_pixel(wide.width(), wide.height(), Luma([0u16]))
        };
        self.set_gray16(out);
        Ok(self)
    }

    // -- Quantisation ---------------------------------------------------------

    /// K-means colour quantisation with k-means++ seeding over the RGB
    /// pixels; single-channel input is promoted to RGB first.
    ///
    /// Each of several seeding attempts runs Lloyd iterations until no
    /// centroid moves further than `epsilon` or `max_iter` rounds pass; the
    /// lowest-inertia attempt wins. With `labels` unset every pixel is
    /// repainted with its centroid colour; set, the buffer is replaced by
    /// the per-pixel cluster index as a gray image.
    #[instrument(skip(self))]
    pub fn kmeans(
        &mut self,
        k: u32,
        max_iter: u32,
        epsilon: f64,
        labels: bool,
    ) -> Result<&mut Self> {
        if k == 0 {
            return Err(BildwerkError::InvalidArgument(
                "cluster count must be at least 1".to_string(),
            ));
        }
        if max_iter == 0 {
            return Err(BildwerkError::InvalidArgument(
                "iteration budget must be at least 1".to_string(),
            ));
        }
        if !epsilon.is_finite() || epsilon <= 0.0 {
            return Err(BildwerkError::InvalidArgument(format!(
                "epsilon {} must be positive and finite",
                epsilon
            )));
        }

        self.to_rgb();
        let rgb = self.rgb();
        let (w, h) = rgb.dimensions();
        let pixel_count = u64::from(w) * u64::from(h);
        if u64::from(k) > pixel_count {
            return Err(BildwerkError::InvalidArgument(format!(
                "{} clusters exceed the {} pixels available",
                k, pixel_count
            )));
        }

        let pixels: Vec<[f64; 3]> = rgb
            .pixels()
            .map(|p| [p.0[0] as f64, p.0[1] as f64, p.0[2] as f64])
            .collect();
        let mut rng = rand::rng();

        let mut best = lloyd_run(&pixels, k as usize, max_iter, epsilon, &mut rng);
        for _ in 1..KMEANS_ATTEMPTS {
            let run = lloyd_run(&pixels, k as usize, max_iter, epsilon, &mut rng);
            if run.inertia < best.inertia {
                best = run;
            }
        }
        info!(k, inertia = best.inertia, "K-means quantisation complete");

        if labels {
            let map: GrayImage = ImageBuffer::from_fn(w, h, |x, y| {
                Luma([best.assignment[(y * w + x) as usize] as u8])
            });
            self.set_gray(map);
        } else {
            let painted: RgbImage = ImageBuffer::from_fn(w, h, |x, y| {
                let c = best.centers[best.assignment[(y * w + x) as usize]];
                Rgb([
                    c[0].round() as u8,
                    c[1].round() as u8,
                    c[2].round() as u8,
                ])
            });
            self.set_rgb(painted);
        }
        Ok(self)
    }
}

// -- K-means internals ---------------------------------------------------------

struct KmeansRun {
    centers: Vec<[f64; 3]>,
    assignment: Vec<usize>,
    inertia: f64,
}

fn squared_distance(a: [f64; 3], b: [f64; 3]) -> f64 {
    let dr = a[0] - b[0];
    let dg = a[1] - b[1];
    let db = a[2] - b[2];
    dr * dr + dg * dg + db * db
}

fn nearest_center(px: [f64; 3], centers: &[[f64; 3]]) -> (usize, f64) {
    let mut best = (0usize, f64::MAX);
    for (i, c) in centers.iter().enumerate() {
        let d = squared_distance(px, *c);
        if d < best.1 {
            best = (i, d);
        }
    }
    best
}

/// K-means++ seeding: the first centre is uniform, later centres are drawn
/// proportionally to the squared distance from the nearest existing one.
fn seed_centers(pixels: &[[f64; 3]], k: usize, rng: &mut impl Rng) -> Vec<[f64; 3]> {
    let mut centers = Vec::with_capacity(k);
    centers.push(pixels[rng.random_range(0..pixels.len())]);
    let mut distances = vec![f64::MAX; pixels.len()];

    while centers.len() < k {
        let newest = centers[centers.len() - 1];
        let mut total = 0.0;
        for (d, px) in distances.iter_mut().zip(pixels) {
            let candidate = squared_distance(*px, newest);
            if candidate < *d {
                *d = candidate;
            }
            total += *d;
        }
        if total <= 0.0 {
            // Fewer distinct colours than clusters; fall back to uniform.
            centers.push(pixels[rng.random_range(0..pixels.len())]);
            continue;
        }
        let mut target = rng.random::<f64>() * total;
        let mut chosen = pixels.len() - 1;
        for (i, d) in distances.iter().enumerate() {
            target -= *d;
            if target <= 0.0 {
                chosen = i;
                break;
            }
        }
        centers.push(pixels[chosen]);
    }
    centers
}

fn lloyd_run(
    pixels: &[[f64; 3]],
    k: usize,
    max_iter: u32,
    epsilon: f64,
    rng: &mut impl Rng,
) -> KmeansRun {
    let mut centers = seed_centers(pixels, k, rng);
    let mut assignment = vec![0usize; pixels.len()];

    for _ in 0..max_iter {
        for (a, px) in assignment.iter_mut().zip(pixels) {
            *a = nearest_center(*px, &centers).0;
        }

        let mut sums = vec![[0.0f64; 3]; k];
        let mut counts = vec![0usize; k];
        for (a, px) in assignment.iter().zip(pixels) {
            for c in 0..3 {
                sums[*a][c] += px[c];
            }
            counts[*a] += 1;
        }

        let mut max_shift = 0.0f64;
        for i in 0..k {
            let updated = if counts[i] == 0 {
                pixels[rng.random_range(0..pixels.len())]
            } else {
                let n = counts[i] as f64;
                [sums[i][0] / n, sums[i][1] / n, sums[i][2] / n]
            };
            max_shift = max_shift.max(squared_distance(centers[i], updated).sqrt());
            centers[i] = updated;
        }
        if max_shift <= epsilon {
            break;
        }
    }

    let mut inertia = 0.0;
    for (a, px) in assignment.iter_mut().zip(pixels) {
        let (index, d) = nearest_center(*px, &centers);
        *a = index;
        inertia += d;
    }
    KmeansRun {
        centers,
        assignment,
        inertia,
    }
}

// -- Pixel conversions ---------------------------------------------------------

fn rgb_px_to_hsv(p: Rgb<u8>) -> Rgb<u8> {
    let r = p.0[0] as f64;
    let g = p.0[1] as f64;
    let b = p.0[2] as f64;
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let mut hue = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * (g - b) / delta
    } else if max == g {
        60.0 * (b - r) / delta + 120.0
    } else {
        60.0 * (r - g) / delta + 240.0
    };
    if hue < 0.0 {
        hue += 360.0;
    }
    let saturation = if max == 0.0 { 0.0 } else { delta / max * 255.0 };

    Rgb([
        ((hue / 2.0).round() as u32 % 180) as u8,
        saturation.round() as u8,
        max as u8,
    ])
}

fn hsv_px_to_rgb(p: Rgb<u8>) -> Rgb<u8> {
    let hue = p.0[0] as f64 * 2.0;
    let saturation = p.0[1] as f64 / 255.0;
    let value = p.0[2] as f64 / 255.0;

    let c = value * saturation;
    let hp = hue / 60.0;
    let x = c * (1.0 - (hp % 2.0 - 1.0).abs());
    let (r1, g1, b1) = match hp as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = value - c;
    Rgb([
        ((r1 + m) * 255.0).round() as u8,
        ((g1 + m) * 255.0).round() as u8,
        ((b1 + m) * 255.0).round() as u8,
    ])
}

fn srgb_to_linear(c: f64) -> f64 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

fn linear_to_srgb(c: f64) -> f64 {
    if c <= 0.003_130_8 {
        12.92 * c
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    }
}

fn lab_f(t: f64) -> f64 {
    if t > 0.008856 {
        t.cbrt()
    } else {
        7.787 * t + 16.0 / 116.0
    }
}

fn lab_f_inv(t: f64) -> f64 {
    let t3 = t * t * t;
    if t3 > 0.008856 {
        t3
    } else {
        (t - 16.0 / 116.0) / 7.787
    }
}

// D65 white point of the sRGB working space.
const LAB_XN: f64 = 0.950456;
const LAB_ZN: f64 = 1.088754;

fn rgb_px_to_lab(p: Rgb<u8>) -> Rgb<u8> {
    let r = srgb_to_linear(p.0[0] as f64 / 255.0);
    let g = srgb_to_linear(p.0[1] as f64 / 255.0);
    let b = srgb_to_linear(p.0[2] as f64 / 255.0);

    let x = 0.412453 * r + 0.357580 * g + 0.180423 * b;
    let y = 0.212671 * r + 0.715160 * g + 0.072169 * b;
    let z = 0.019334 * r + 0.119193 * g + 0.950227 * b;

    let fx = lab_f(x / LAB_XN);
    let fy = lab_f(y);
    let fz = lab_f(z / LAB_ZN);

    let l = 116.0 * fy - 16.0;
    let a = 500.0 * (fx - fy);
    let bb = 200.0 * (fy - fz);

    Rgb([
        (l * 255.0 / 100.0).round().clamp(0.0, 255.0) as u8,
        (a + 128.0).round().clamp(0.0, 255.0) as u8,
        (bb + 128.0).round().clamp(0.0, 255.0) as u8,
    ])
}

fn lab_px_to_rgb(p: Rgb<u8>) -> Rgb<u8> {
    let l = p.0[0] as f64 * 100.0 / 255.0;
    let a = p.0[1] as f64 - 128.0;
    let bb = p.0[2] as f64 - 128.0;

    let fy = (l + 16.0) / 116.0;
    let fx = fy + a / 500.0;
    let fz = fy - bb / 200.0;

    let x = lab_f_inv(fx) * LAB_XN;
    let y = lab_f_inv(fy);
    let z = lab_f_inv(fz) * LAB_ZN;

    let r = 3.240479 * x - 1.537150 * y - 0.498535 * z;
    let g = -0.969256 * x + 1.875992 * y + 0.041556 * z;
    let b = 0.055648 * x - 0.204043 * y + 1.057311 * z;

    Rgb([
        (linear_to_srgb(r.clamp(0.0, 1.0)) * 255.0).round() as u8,
        (linear_to_srgb(g.clamp(0.0, 1.0)) * 255.0).round() as u8,
        (linear_to_srgb(b.clamp(0.0, 1.0)) * 255.0).round() as u8,
    ])
}

// -- Tests --------------------------------------------------------------------
