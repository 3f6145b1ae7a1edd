// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Four-point projective warping.

use image::{Luma, Rgb};
use imageproc::geometric_transformations::{Interpolation, Projection, warp};
use tracing::instrument;

use crate::error::{BildwerkError, Result};
use crate::image::Image;

impl Image {
    /// The four image corners as `(x, y)`, starting at the origin: top-left,
    /// bottom-left, bottom-right, top-right.
    pub fn corners(&self) -> [(f32, f32); 4] {
        let (w, h) = (self.width() as f32, self.height() as f32);
        [(0.0, 0.0), (0.0, h), (w, h), (w, 0.0)]
    }

    /// Projective warp mapping the four `src` points onto the four `dst`
    /// points, with bilinear sampling.
    ///
    /// The canvas keeps its size and uncovered pixels become black. Control
    /// points that do not determine a projection are rejected.
    #[instrument(skip(self))]
    pub fn warp(&mut self, src: [(f32, f32); 4], dst: [(f32, f32); 4]) -> Result<&mut Self> {
        let projection = Projection::from_control_points(src, dst).ok_or_else(|| {
            BildwerkError::InvalidArgument("degenerate warp control points".to_string())
        })?;

        if self.dim() == 2 {
            let gray = self.gray()?;
            self.set_gray(warp(
                &gray,
                &projection,
                Interpolation::Bilinear,
                Luma([0u8]),
            ));
        } else {
            let rgb = self.rgb();
            self.set_rgb(warp(
                &rgb,
                &projection,
                Interpolation::Bilinear,
                Rgb([0u8, 0, 0]),
            ));
        }
        Ok(self)
    }
}

// -- Tests --------------------------------------------------------------------
