// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Shared parameter types for Bildwerk operations.

use serde::{Deserialize, Serialize};

/// Smoothing filter families accepted by [`crate::Image::blur`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlurMethod {
    /// Gaussian kernel with sigma derived from the kernel size.
    Gaussian,
    /// Normalised box (mean) filter.
    Average,
    /// Median of the neighbourhood.
    Median,
    /// Edge-preserving bilateral filter.
    Bilateral,
}

/// Target for aspect-preserving resizes.
///
/// Exactly one dimension (or a uniform scale factor) is specified; the other
/// dimension follows from the current aspect ratio.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResizeTarget {
    /// New width in pixels.
    Width(u32),
    /// New height in pixels.
    Height(u32),
    /// Uniform scale factor applied to both dimensions.
    Scale(f64),
}

/// Structuring element shapes for the morphology operations.
///
/// Maps onto the mask constructors of `imageproc::morphology`: a disk (L2
/// ball), a square (Linf ball), and a diamond (L1 ball).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MorphShape {
    Ellipse,
    Rect,
    Diamond,
}

/// Axis of a cut made by [`crate::Image::split`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Cut along a horizontal line, producing top and bottom parts.
    Horizontal,
    /// Cut along a vertical line, producing left and right parts.
    Vertical,
}

/// Where [`crate::Image::split`] places its cut.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitPosition {
    /// Cut at the midpoint of the chosen axis.
    Middle,
    /// Cut at the given coordinate along the chosen axis.
    At(u32),
}
