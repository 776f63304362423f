// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Useful constants.

All constants *must* be double precision. `wimager` should do as many
calculations as possible in double precision.
 */

pub use std::f64::consts::{FRAC_PI_2, PI, SQRT_2, TAU};

/// The default field of view \[direction cosines\].
pub const DEFAULT_THETA: f64 = 0.1;

/// The default uv extent of the grid \[wavelengths\].
pub const DEFAULT_LAM: f64 = 20000.0;

/// The default number of sub-pixel kernel variants per grid cell per axis.
pub const DEFAULT_QPX: usize = 4;

/// The support of the anti-aliasing function on its own \[grid cells\]. The
/// prolate-spheroidal function used here is designed for a support of 6 cells;
/// the kernel is one cell wider so that it has a centre pixel.
pub const DEFAULT_AA_SUPPORT: usize = 7;

/// Multiplies the w-kernel half-width estimated from the chirp's maximum
/// frequency. Values above 1 trade speed for accuracy.
pub const DEFAULT_KERNEL_ACCURACY: f64 = 1.0;

/// `l² + m²` may exceed 1 by this much (floating-point overshoot at the
/// horizon) before it is considered an error.
pub const LMN_TOLERANCE: f64 = 1e-9;

/// Image pixels where the grid correction is below this fraction of its value
/// at the centre of the field are blanked. Near the edge of the field the
/// correction tends to zero, and dividing by it amplifies kernel truncation
/// errors until they rival real sources.
pub const GRID_CORRECTION_FLOOR: f64 = 1e-3;

/// 2x2 transforms with determinants smaller than this are singular.
pub const SINGULAR_DETERMINANT: f64 = 1e-12;

/// The default observing wavelength used by `simulate` \[metres\] (150 MHz).
pub const DEFAULT_WAVELENGTH_M: f64 = 1.998_616_9;

/// The latitude of the VLA \[degrees\]. Used by the default array layout.
pub const VLA_LAT_DEG: f64 = 34.078_749_167;
