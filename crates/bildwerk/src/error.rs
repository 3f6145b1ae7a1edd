// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Bildwerk.

use thiserror::Error;

/// Top-level error type for all Bildwerk operations.
#[derive(Debug, Error)]
pub enum BildwerkError {
    // -- Construction / codec errors --
    #[error("image at {0} not found")]
    FileNotFound(String),

    #[error("image decoding failed: {0}")]
    Decode(String),

    #[error("image encoding failed: {0}")]
    Encode(String),

    #[error("unrecognised image file type: {0}")]
    UnsupportedExtension(String),

    // -- Validation errors --
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("operation requires a single-channel image, found {found} channels")]
    RequiresGray { found: u32 },

    #[error("operation requires a three-channel image, found {found} channels")]
    RequiresColor { found: u32 },

    #[error("shape mismatch: expected {expected}, actual {actual}")]
    ShapeMismatch { expected: String, actual: String },

    // -- Analysis errors --
    #[error("no circle detected: {0}")]
    NoCircle(String),

    // -- Display --
    #[error("display failed: {0}")]
    Display(String),

    // -- I/O --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, BildwerkError>;
