// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Transform families for `Image`, one module per capability group.

pub mod circle;
pub mod color;
pub mod features;
pub mod general;
pub mod morphology;
pub mod objects;
pub mod threshold;
pub mod warp;
