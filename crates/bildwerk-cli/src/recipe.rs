// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// JSON recipes: a serde-described list of operations applied in order to a
// single image, backing the `bildwerk run` subcommand.

use serde::Deserialize;

use bildwerk::{BlurMethod, Image, MorphShape, ResizeTarget};

/// One operation in a recipe file.
///
/// A recipe is a JSON array of objects, each tagged with an `"op"` field:
///
/// ```json
/// [
///   {"op": "to_gray"},
///   {"op": "blur", "size": 5, "method": "gaussian"},
///   {"op": "binarize"}
/// ]
/// ```
#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    // Structure
    Crop {
        left: u32,
        top: u32,
        right: u32,
        bottom: u32,
    },
    CropSized {
        left: u32,
        top: u32,
        width: u32,
        height: u32,
    },
    Channel {
        index: u32,
    },
    Resize {
        target: ResizeTarget,
    },
    ResizeExact {
        width: u32,
        height: u32,
    },
    Rotate90,
    Rotate {
        angle: f32,
        #[serde(default)]
        center: Option<(f32, f32)>,
    },

    // General
    Negate,
    Blur {
        size: u32,
        method: BlurMethod,
    },
    GaussianBlur {
        sigma: f32,
    },
    EqualizeHist {
        rate: f64,
    },
    DistanceTransform,

    // Thresholding
    Binarize {
        #[serde(default)]
        threshold: Option<u8>,
    },
    AdaptiveThreshold {
        blur_size: u32,
        block_size: u32,
        c: f64,
    },

    // Morphology and edges
    Sharpen,
    Gabor {
        orientations: Vec<f32>,
    },
    Opening {
        radius: u8,
        shape: MorphShape,
    },
    Closing {
        radius: u8,
        shape: MorphShape,
    },
    Dilation {
        radius: u8,
        shape: MorphShape,
    },
    Erosion {
        radius: u8,
        shape: MorphShape,
    },
    Tophat {
        radius: u8,
        shape: MorphShape,
    },
    Blackhat {
        radius: u8,
        shape: MorphShape,
    },
    AlgebraicOpening {
        length: u8,
        angle_step: u32,
    },
    AlgebraicDilation {
        length: u8,
        angle_step: u32,
    },
    Edges {
        low: f32,
        high: f32,
    },
    Sobel,

    // Objects
    RetainObjects {
        min_area: u32,
        #[serde(default)]
        max_area: Option<u32>,
    },
    RetainTall {
        min_height_ratio: f64,
    },

    // Circle geometry
    UnwrapRing {
        center: (u32, u32),
        radii: (u32, u32),
    },

    // Perspective
    Warp {
        src: [(f32, f32); 4],
        dst: [(f32, f32); 4],
    },

    // Colour
    ToGray,
    ToRgb,
    RgbToHsv,
    HsvToRgb,
    RgbToLab,
    LabToRgb,
    NormalizeU8,
    NormalizeU16,
    Kmeans {
        k: u32,
        max_iter: u32,
        epsilon: f64,
        #[serde(default)]
        labels: bool,
    },

    // Features
    Integral,
    ShiftX {
        offset: i64,
    },
    ShiftY {
        offset: i64,
    },
}

/// Apply a parsed step list to the image in order.
pub fn apply(img: &mut Image, steps: &[Step]) -> bildwerk::Result<()> {
    for step in steps {
        apply_step(img, step)?;
    }
    Ok(())
}

fn apply_step(img: &mut Image, step: &Step) -> bildwerk::Result<()> {
    match step {
        Step::Crop {
            left,
            top,
            right,
            bottom,
        } => {
            img.crop((*left, *top), (*right, *bottom))?;
        }
        Step::CropSized {
            left,
            top,
            width,
            height,
        } => {
            img.crop_sized((*left, *top), *width, *height);
        }
        Step::Channel { index } => {
            img.channel(*index)?;
        }
        Step::Resize { target } => {
            img.resize(*target)?;
        }
        Step::ResizeExact { width, height } => {
            img.resize_exact(*width, *height)?;
        }
        Step::Rotate90 => {
            img.rotate90();
        }
        Step::Rotate { angle, center } => {
            img.rotate(*angle, *center)?;
        }
        Step::Negate => {
            img.negate()?;
        }
        Step::Blur { size, method } => {
            img.blur(*size, *method)?;
        }
        Step::GaussianBlur { sigma } => {
            img.gaussian_blur(*sigma)?;
        }
        Step::EqualizeHist { rate } => {
            img.equalize_hist(*rate)?;
        }
        Step::DistanceTransform => {
            img.distance_transform()?;
        }
        Step::Binarize { threshold } => {
            img.binarize(*threshold)?;
        }
        Step::AdaptiveThreshold {
            blur_size,
            block_size,
            c,
        } => {
            img.adaptive_threshold(*blur_size, *block_size, *c)?;
        }
        Step::Sharpen => {
            img.sharpen()?;
        }
        Step::Gabor { orientations } => {
            img.gabor(orientations)?;
        }
        Step::Opening { radius, shape } => {
            img.opening(*radius, *shape)?;
        }
        Step::Closing { radius, shape } => {
            img.closing(*radius, *shape)?;
        }
        Step::Dilation { radius, shape } => {
            img.dilation(*radius, *shape)?;
        }
        Step::Erosion { radius, shape } => {
            img.erosion(*radius, *shape)?;
        }
        Step::Tophat { radius, shape } => {
            img.tophat(*radius, *shape)?;
        }
        Step::Blackhat { radius, shape } => {
            img.blackhat(*radius, *shape)?;
        }
        Step::AlgebraicOpening { length, angle_step } => {
            img.algebraic_opening(*length, *angle_step)?;
        }
        Step::AlgebraicDilation { length, angle_step } => {
            img.algebraic_dilation(*length, *angle_step)?;
        }
        Step::Edges { low, high } => {
            img.edges(*low, *high)?;
        }
        Step::Sobel => {
            img.sobel()?;
        }
        Step::RetainObjects { min_area, max_area } => {
            img.retain_objects(*min_area, *max_area)?;
        }
        Step::RetainTall { min_height_ratio } => {
            img.retain_tall(*min_height_ratio)?;
        }
        Step::UnwrapRing { center, radii } => {
            img.unwrap_ring(*center, *radii)?;
        }
        Step::Warp { src, dst } => {
            img.warp(*src, *dst)?;
        }
        Step::ToGray => {
            img.to_gray();
        }
        Step::ToRgb => {
            img.to_rgb();
        }
        Step::RgbToHsv => {
            img.rgb_to_hsv()?;
        }
        Step::HsvToRgb => {
            img.hsv_to_rgb()?;
        }
        Step::RgbToLab => {
            img.rgb_to_lab()?;
        }
        Step::LabToRgb => {
            img.lab_to_rgb()?;
        }
        Step::NormalizeU8 => {
            img.normalize_u8()?;
        }
        Step::NormalizeU16 => {
            img.normalize_u16()?;
        }
        Step::Kmeans {
            k,
            max_iter,
            epsilon,
            labels,
        } => {
            img.kmeans(*k, *max_iter, *epsilon, *labels)?;
        }
        Step::Integral => {
            img.integral();
        }
        Step::ShiftX { offset } => {
            img.shift_x(*offset);
        }
        Step::ShiftY { offset } => {
            img.shift_y(*offset);
        }
    }
    Ok(())
}

// -- Tests --------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgb, RgbImage};

    fn fixture() -> Image {
        let buf = RgbImage::from_fn(16, 16, |x, y| {
            let v = ((x + y) * 8).min(255) as u8;
            Rgb([v, v, v])
        });
        Image::from_dynamic(DynamicImage::ImageRgb8(buf))
    }

    /// Verify a chain parses from JSON and transforms the image in order.
    #[test]
    fn chain_parses_and_applies() {
        let json = r#"[
            {"op": "to_gray"},
            {"op": "resize", "target": {"width": 8}},
            {"op": "binarize", "threshold": 100}
        ]"#;
        let steps: Vec<Step> = serde_json::from_str(json).unwrap();
        assert_eq!(steps.len(), 3);

        let mut img = fixture();
        apply(&mut img, &steps).unwrap();
        assert_eq!(img.dim(), 2);
        assert_eq!(img.width(), 8);
        let gray = img.as_dynamic().to_luma8();
        assert!(gray.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
    }

    /// Verify optional fields may be omitted.
    #[test]
    fn optional_fields_default() {
        let steps: Vec<Step> =
            serde_json::from_str(r#"[{"op": "binarize"}, {"op": "rotate", "angle": 90.0}]"#)
                .unwrap();
        assert!(matches!(steps[0], Step::Binarize { threshold: None }));
        assert!(matches!(
            steps[1],
            Step::Rotate {
                center: None,
                ..
            }
        ));
    }

    /// Verify parameter enums reuse their library spellings.
    #[test]
    fn parameter_enums_deserialize() {
        let steps: Vec<Step> = serde_json::from_str(
            r#"[
                {"op": "blur", "size": 3, "method": "median"},
                {"op": "opening", "radius": 2, "shape": "ellipse"},
                {"op": "resize", "target": {"scale": 0.5}}
            ]"#,
        )
        .unwrap();
        assert!(matches!(
            steps[0],
            Step::Blur {
                method: BlurMethod::Median,
                ..
            }
        ));
        assert!(matches!(
            steps[1],
            Step::Opening {
                shape: MorphShape::Ellipse,
                ..
            }
        ));
        assert!(matches!(
            steps[2],
            Step::Resize {
                target: ResizeTarget::Scale(_)
            }
        ));
    }

    /// Verify unknown operations are rejected at parse time.
    #[test]
    fn unknown_op_is_rejected() {
        let result: Result<Vec<Step>, _> = serde_json::from_str(r#"[{"op": "sepia"}]"#);
        assert!(result.is_err());
    }

    /// Verify a failing step aborts the chain with the library error.
    #[test]
    fn failing_step_aborts() {
        let steps: Vec<Step> = serde_json::from_str(
            r#"[{"op": "blur", "size": 4, "method": "gaussian"}]"#,
        )
        .unwrap();
        let mut img = fixture();
        assert!(apply(&mut img, &steps).is_err());
    }
}
