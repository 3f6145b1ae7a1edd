// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The image handle — construction, shape accessors, cropping, splitting,
// channel access, and blending. The transform families live in `crate::ops`
// as further `impl Image` blocks on this type.

use image::{DynamicImage, GrayImage, ImageBuffer, Luma, Rgb, RgbImage};
use tracing::{debug, info, instrument};

use crate::error::{BildwerkError, Result};
use crate::types::{Direction, SplitPosition};

/// A convenience handle owning a single image buffer.
///
/// Transform methods validate their arguments, mutate the buffer in place and
/// return `&mut Self`, so operations chain:
///
/// ```ignore
/// let mut img = Image::open("plate.png")?;
/// img.to_gray()?
///     .blur(5, BlurMethod::Gaussian)?
///     .binarize(None)?
///     .save("plate_bw.png")?;
/// ```
///
/// Cloning the handle deep-copies the pixel data, so a clone can be modified
/// independently of the original.
#[derive(Clone)]
pub struct Image {
    /// The current working buffer.
    buffer: DynamicImage,
}

impl std::fmt::Debug for Image {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Image({}x{}, {} channels)",
            self.width(),
            self.height(),
            self.channel_count()
        )
    }
}

impl Image {
    // -- Construction ---------------------------------------------------------

    /// Load an image from a file path.
    ///
    /// The file must exist; decoded frames are normalised to 8-bit RGB, the
    /// behaviour of a colour-mode decode.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(BildwerkError::FileNotFound(path.display().to_string()));
        }
        let decoded = image::open(path).map_err(|err| {
            BildwerkError::Decode(format!("failed to open {}: {}", path.display(), err))
        })?;
        let buffer = DynamicImage::ImageRgb8(decoded.to_rgb8());
        info!(
            width = buffer.width(),
            height = buffer.height(),
            "Image loaded"
        );
        Ok(Self { buffer })
    }

    /// Decode an image from raw encoded bytes (JPEG, PNG, etc.).
    #[instrument(skip(data), fields(data_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let decoded = image::load_from_memory(data)
            .map_err(|err| BildwerkError::Decode(format!("failed to decode image: {}", err)))?;
        let buffer = DynamicImage::ImageRgb8(decoded.to_rgb8());
        debug!(
            width = buffer.width(),
            height = buffer.height(),
            "Image decoded from bytes"
        );
        Ok(Self { buffer })
    }

    /// Wrap an already-decoded `DynamicImage` without conversion.
    pub fn from_dynamic(buffer: DynamicImage) -> Self {
        Self { buffer }
    }

    // -- Accessors ------------------------------------------------------------

    /// Current image width in pixels.
    pub fn width(&self) -> u32 {
        self.buffer.width()
    }

    /// Current image height in pixels.
    pub fn height(&self) -> u32 {
        self.buffer.height()
    }

    /// Number of channels in the current buffer.
    pub fn channel_count(&self) -> u32 {
        u32::from(self.buffer.color().channel_count())
    }

    /// Buffer dimensionality: 2 for single-channel images, 3 otherwise.
    pub fn dim(&self) -> u32 {
        if self.channel_count() == 1 { 2 } else { 3 }
    }

    /// Image shape as `(height, width, channels)`.
    pub fn shape(&self) -> (u32, u32, u32) {
        (self.height(), self.width(), self.channel_count())
    }

    /// Borrow the underlying `DynamicImage`.
    pub fn as_dynamic(&self) -> &DynamicImage {
        &self.buffer
    }

    /// Consume the handle and return the underlying `DynamicImage`.
    pub fn into_dynamic(self) -> DynamicImage {
        self.buffer
    }

    // -- Channel access -------------------------------------------------------

    /// Reduce the image to a single one of its channels.
    ///
    /// Single-channel images are returned unchanged; otherwise `index` must be
    /// smaller than the channel count.
    pub fn channel(&mut self, index: u32) -> Result<&mut Self> {
        if self.dim() == 2 {
            return Ok(self);
        }
        let count = self.channel_count();
        if index >= count {
            return Err(BildwerkError::InvalidArgument(format!(
                "channel index {} out of range for {} channels",
                index, count
            )));
        }

        let i = index as usize;
        let plane: GrayImage = if count == 2 {
            let la = self.buffer.to_luma_alpha8();
            ImageBuffer::from_fn(la.width(), la.height(), |x, y| {
                Luma([la.get_pixel(x, y).0[i]])
            })
        } else if count == 4 {
            let rgba = self.buffer.to_rgba8();
            ImageBuffer::from_fn(rgba.width(), rgba.height(), |x, y| {
                Luma([rgba.get_pixel(x, y).0[i]])
            })
        } else {
            let rgb = self.buffer.to_rgb8();
            ImageBuffer::from_fn(rgb.width(), rgb.height(), |x, y| {
                Luma([rgb.get_pixel(x, y).0[i]])
            })
        };
        self.buffer = DynamicImage::ImageLuma8(plane);
        Ok(self)
    }

    /// Split the image into its channels, one grayscale image per channel.
    /// The handle itself is left untouched.
    pub fn channels(&self) -> Vec<Image> {
        (0..self.channel_count())
            .map(|index| {
                let mut plane = self.clone();
                plane
                    .channel(index)
                    .expect("index is within the channel count");
                plane
            })
            .collect()
    }

    // -- Cropping -------------------------------------------------------------

    /// Crop to the rectangle between `tl` (inclusive) and `br` (exclusive),
    /// both given as `(x, y)`.
    ///
    /// Fails if `tl` does not lie strictly above and left of `br`, or if `br`
    /// exceeds the image bounds.
    #[instrument(skip(self))]
    pub fn crop(&mut self, tl: (u32, u32), br: (u32, u32)) -> Result<&mut Self> {
        let (w, h) = (self.width(), self.height());
        if tl.0 >= br.0 || tl.1 >= br.1 {
            return Err(BildwerkError::InvalidArgument(format!(
                "top-left {:?} must lie strictly above and left of bottom-right {:?}",
                tl, br
            )));
        }
        if br.0 > w || br.1 > h {
            return Err(BildwerkError::InvalidArgument(format!(
                "bottom-right {:?} exceeds image bounds {}x{}",
                br, w, h
            )));
        }
        debug!(
            x = tl.0,
            y = tl.1,
            width = br.0 - tl.0,
            height = br.1 - tl.1,
            "Cropping image"
        );
        self.buffer = self.buffer.crop_imm(tl.0, tl.1, br.0 - tl.0, br.1 - tl.1);
        Ok(self)
    }

    /// Non-mutating sibling of [`Image::crop`]: returns the cropped region as
    /// a new image.
    pub fn cropped(&self, tl: (u32, u32), br: (u32, u32)) -> Result<Image> {
        let mut copy = self.clone();
        copy.crop(tl, br)?;
        Ok(copy)
    }

    /// Crop a rectangle by origin and size, clamping to the image bounds.
    ///
    /// Unlike [`Image::crop`] this never fails: out-of-range values are pulled
    /// back inside the image.
    #[instrument(skip(self))]
    pub fn crop_sized(&mut self, tl: (u32, u32), width: u32, height: u32) -> &mut Self {
        let img_w = self.width();
        let img_h = self.height();

        let safe_x = tl.0.min(img_w.saturating_sub(1));
        let safe_y = tl.1.min(img_h.saturating_sub(1));
        let safe_w = width.min(img_w - safe_x);
        let safe_h = height.min(img_h - safe_y);

        debug!(safe_x, safe_y, safe_w, safe_h, "Cropping image to size");
        self.buffer = self.buffer.crop_imm(safe_x, safe_y, safe_w, safe_h);
        self
    }

    // -- Splitting ------------------------------------------------------------

    /// Cut the image in two along the given axis, leaving the handle itself
    /// untouched.
    ///
    /// `Direction::Horizontal` cuts along a horizontal line (top and bottom
    /// parts); `Direction::Vertical` along a vertical line (left and right).
    /// The cut position must lie strictly inside the image so that both parts
    /// are non-empty.
    pub fn split(&self, direction: Direction, position: SplitPosition) -> Result<(Image, Image)> {
        let (w, h) = (self.width(), self.height());
        let extent = match direction {
            Direction::Horizontal => h,
            Direction::Vertical => w,
        };
        let at = match position {
            SplitPosition::Middle => extent / 2,
            SplitPosition::At(p) => p,
        };
        if at == 0 || at >= extent {
            return Err(BildwerkError::InvalidArgument(format!(
                "split position {} must lie strictly inside 1..{}",
                at, extent
            )));
        }

        let (first, second) = match direction {
            Direction::Horizontal => (
                self.buffer.crop_imm(0, 0, w, at),
                self.buffer.crop_imm(0, at, w, h - at),
            ),
            Direction::Vertical => (
                self.buffer.crop_imm(0, 0, at, h),
                self.buffer.crop_imm(at, 0, w - at, h),
            ),
        };
        Ok((Image::from_dynamic(first), Image::from_dynamic(second)))
    }

    // -- Blending -------------------------------------------------------------

    /// Alpha-blend a second image onto this one.
    ///
    /// The result is `(1 - alpha) * self + alpha * other`, computed per
    /// channel after promoting both images to RGB. `alpha` must lie in
    /// `[0, 1]` and the two images must have identical dimensions.
    #[instrument(skip(self, other))]
    pub fn blend(&mut self, other: &Image, alpha: f64) -> Result<&mut Self> {
        if !(0.0..=1.0).contains(&alpha) {
            return Err(BildwerkError::InvalidArgument(format!(
                "blend alpha {} must lie in [0, 1]",
                alpha
            )));
        }
        if self.width() != other.width() || self.height() != other.height() {
            return Err(BildwerkError::ShapeMismatch {
                expected: format!("{}x{}", self.width(), self.height()),
                actual: format!("{}x{}", other.width(), other.height()),
            });
        }

        let a = self.rgb();
        let b = other.rgb();
        let blended: RgbImage = ImageBuffer::from_fn(a.width(), a.height(), |x, y| {
            let pa = a.get_pixel(x, y).0;
            let pb = b.get_pixel(x, y).0;
            let mix = |ca: u8, cb: u8| -> u8 {
                ((1.0 - alpha) * ca as f64 + alpha * cb as f64)
                    .round()
                    .clamp(0.0, 255.0) as u8
            };
            Rgb([mix(pa[0], pb[0]), mix(pa[1], pb[1]), mix(pa[2], pb[2])])
        });
        self.set_rgb(blended);
        Ok(self)
    }

    // -- Internal helpers -----------------------------------------------------

    /// View the buffer as 8-bit grayscale, failing on multi-channel input.
    pub(crate) fn gray(&self) -> Result<GrayImage> {
        if self.dim() != 2 {
            return Err(BildwerkError::RequiresGray {
                found: self.channel_count(),
            });
        }
        Ok(self.buffer.to_luma8())
    }

    /// View the buffer as 8-bit RGB, replicating grayscale into all channels.
    pub(crate) fn rgb(&self) -> RgbImage {
        self.buffer.to_rgb8()
    }

    /// View the buffer as 8-bit RGB, failing unless it holds exactly three
    /// channels.
    pub(crate) fn rgb_strict(&self) -> Result<RgbImage> {
        if self.channel_count() != 3 {
            return Err(BildwerkError::RequiresColor {
                found: self.channel_count(),
            });
        }
        Ok(self.buffer.to_rgb8())
    }

    pub(crate) fn set_dynamic(&mut self, buffer: DynamicImage) {
        self.buffer = buffer;
    }

    pub(crate) fn set_gray(&mut self, gray: GrayImage) {
        self.buffer = DynamicImage::ImageLuma8(gray);
    }

    pub(crate) fn set_gray16(&mut self, gray: ImageBuffer<Luma<u16>, Vec<u16>>) {
        self.buffer = DynamicImage::ImageLuma16(gray);
    }

    pub(crate) fn set_rgb(&mut self, rgb: RgbImage) {
        self.buffer = DynamicImage::ImageRgb8(rgb);
    }
}

// -- Tests --------------------------------------------------------------------
