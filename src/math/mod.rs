// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Some helper mathematics.

#[cfg(test)]
mod tests;

use marlu::c64;

/// Complex exponential. The argument is assumed to be purely imaginary.
///
/// This function doesn't actually use complex numbers; it just returns the real
/// and imag components from Euler's formula (i.e. e^{ix} = cos{x} + i sin{x}).
#[inline]
pub(crate) fn cexp(x: f64) -> c64 {
    let (im, re) = x.sin_cos();
    c64::new(re, im)
}

/// Integer division, rounding up.
#[inline]
pub(crate) fn div_ceil(numerator: usize, denominator: usize) -> usize {
    (numerator + denominator - 1) / denominator
}

/// `n - 1` for direction cosines `l` and `m`, where `n = sqrt(1 - l² - m²)`.
/// Written so that there's no cancellation error near the phase centre.
#[inline]
pub(crate) fn n_minus_one(r2: f64) -> f64 {
    -r2 / (1.0 + (1.0 - r2).sqrt())
}
