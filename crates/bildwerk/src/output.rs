// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Persisting images — extension-checked file output and in-memory PNG
// encoding.

use std::fs;
use std::io::Cursor;
use std::path::Path;

use image::ImageFormat;
use tracing::info;

use crate::error::{BildwerkError, Result};
use crate::image::Image;

/// File extensions accepted by [`Image::save`], compared case-insensitively.
const SAVE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

impl Image {
    /// Write the buffer to `path`, creating missing parent directories.
    ///
    /// Only the extensions in [`SAVE_EXTENSIONS`] are accepted; the check
    /// runs before anything touches the filesystem.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        if !SAVE_EXTENSIONS.contains(&extension.as_str()) {
            return Err(BildwerkError::UnsupportedExtension(
                path.display().to_string(),
            ));
        }

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        self.as_dynamic().save(path).map_err(|err| {
            BildwerkError::Encode(format!(
                "failed to save image to {}: {}",
                path.display(),
                err
            ))
        })?;
        info!(path = %path.display(), "Image saved");
        Ok(())
    }

    /// Encode the buffer as PNG and return the raw bytes.
    pub fn to_png_bytes(&self) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        let mut cursor = Cursor::new(&mut buffer);
        self.as_dynamic()
            .write_to(&mut cursor, ImageFormat::Png)
            .map_err(|err| BildwerkError::Encode(format!("PNG encoding failed: {}", err)))?;
        Ok(buffer)
    }
}

// -- Tests --------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgb, RgbImage};

    fn fixture() -> Image {
        let mut buf = RgbImage::from_pixel(6, 4, Rgb([20, 40, 60]));
        buf.put_pixel(3, 2, Rgb([250, 10, 10]));
        Image::from_dynamic(DynamicImage::ImageRgb8(buf))
    }

    /// Verify saving creates missing parent directories.
    #[test]
    fn save_creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("deeper").join("out.png");
        fixture().save(&path).unwrap();
        assert!(path.is_file());
    }

    /// Verify the extension check is case-insensitive.
    #[test]
    fn save_accepts_uppercase_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("OUT.PNG");
        fixture().save(&path).unwrap();
        assert!(path.is_file());
    }

    /// Verify unknown or missing extensions fail before any file appears.
    #[test]
    fn save_rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["out.bmp", "out.tiff", "plain"] {
            let path = dir.path().join("sub").join(name);
            assert!(matches!(
                fixture().save(&path),
                Err(BildwerkError::UnsupportedExtension(_))
            ));
            assert!(!path.exists());
            assert!(!path.parent().is_some_and(|p| p.exists()));
        }
    }

    /// Verify PNG bytes decode back to the same pixels.
    #[test]
    fn png_bytes_roundtrip() {
        let img = fixture();
        let bytes = img.to_png_bytes().unwrap();
        let decoded = Image::from_bytes(&bytes).unwrap();
        assert_eq!(decoded.shape(), img.shape());
        assert_eq!(decoded.rgb().get_pixel(3, 2).0, [250, 10, 10]);
        assert_eq!(decoded.rgb().get_pixel(0, 0).0, [20, 40, 60]);
    }
}
