// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// bildwerk — Convenience image-processing handle with chained operations.
//
// Provides an owned pixel buffer with shape metadata and mutating operations
// for structure (crop, split, resize, rotate), filtering (blur, sharpen,
// morphology, Gabor banks), thresholding, circle detection and unwrapping,
// connected-component filtering, perspective warps, colour handling, and
// extension-checked output.

pub mod error;
pub mod image;
pub mod ops;
pub mod output;
pub mod types;

#[cfg(feature = "display")]
pub mod view;

// Re-export the primary types so callers can use `bildwerk::Image` etc.
pub use error::{BildwerkError, Result};
pub use image::Image;
pub use types::{BlurMethod, Direction, MorphShape, ResizeTarget, SplitPosition};
