// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Centred two-dimensional FFTs.
//!
//! The zero-frequency element of a centred array of size `n` is at index
//! `n / 2`. Neither direction is normalised.

use std::sync::Arc;

use marlu::c64;
use ndarray::prelude::*;
use rayon::prelude::*;
use rustfft::{Fft, FftPlanner};

/// Forward and inverse FFT plans for square `n` x `n` arrays.
pub(crate) struct CentredFft2 {
    n: usize,
    forward: Arc<dyn Fft<f64>>,
    inverse: Arc<dyn Fft<f64>>,
}

impl std::fmt::Debug for CentredFft2 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CentredFft2").field("n", &self.n).finish()
    }
}

impl CentredFft2 {
    pub(crate) fn new(n: usize) -> CentredFft2 {
        let mut planner = FftPlanner::new();
        CentredFft2 {
            n,
            forward: planner.plan_fft_forward(n),
            inverse: planner.plan_fft_inverse(n),
        }
    }

    pub(crate) fn size(&self) -> usize {
        self.n
    }

    /// `fftshift(fft2(ifftshift(a)))`
    pub(crate) fn forward(&self, a: ArrayView2<c64>) -> Array2<c64> {
        self.centred(a, self.forward.as_ref())
    }

    /// `fftshift(ifft2(ifftshift(a)))`, without the `1/n²`.
    pub(crate) fn inverse(&self, a: ArrayView2<c64>) -> Array2<c64> {
        self.centred(a, self.inverse.as_ref())
    }

    fn centred(&self, a: ArrayView2<c64>, fft: &dyn Fft<f64>) -> Array2<c64> {
        debug_assert_eq!(a.dim(), (self.n, self.n));
        let n = self.n;
        let mut b = roll(a, n - n / 2);
        fft_rows(fft, &mut b);
        let mut t = b.t().as_standard_layout().into_owned();
        fft_rows(fft, &mut t);
        roll(t.t(), n / 2)
    }
}

/// Cyclically shift both axes so that `out[j + shift][i + shift] = a[j][i]`.
pub(crate) fn roll(a: ArrayView2<c64>, shift: usize) -> Array2<c64> {
    let (ny, nx) = a.dim();
    Array2::from_shape_fn((ny, nx), |(j, i)| {
        a[((j + ny - shift % ny) % ny, (i + nx - shift % nx) % nx)]
    })
}

fn fft_rows(fft: &dyn Fft<f64>, a: &mut Array2<c64>) {
    a.axis_iter_mut(Axis(0))
        .into_par_iter()
        .for_each(|mut row| match row.as_slice_mut() {
            Some(s) => fft.process(s),
            None => {
                let mut v = row.to_vec();
                fft.process(&mut v);
                row.assign(&ArrayView1::from(&v));
            }
        });
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::{constants::TAU, math::cexp};

    #[test]
    fn test_roll_even_and_odd() {
        let a = Array2::from_shape_fn((4, 4), |(j, i)| c64::new((j * 4 + i) as f64, 0.0));
        let r = roll(a.view(), 2);
        assert_eq!(r[(2, 2)], a[(0, 0)]);
        assert_eq!(r[(0, 1)], a[(2, 3)]);

        // ifftshift then fftshift is the identity, even for odd sizes.
        let a = Array2::from_shape_fn((5, 5), |(j, i)| c64::new(j as f64, i as f64));
        let back = roll(roll(a.view(), 5 - 5 / 2).view(), 5 / 2);
        assert_eq!(back, a);
    }

    #[test]
    fn test_centred_delta() {
        // A delta offset by (dy, dx) from the centre transforms to a phase
        // ramp.
        for n in [8, 9] {
            let fft = CentredFft2::new(n);
            let (dy, dx) = (1, -2);
            let mut a = Array2::zeros((n, n));
            let centre = (n / 2) as isize;
            a[((centre + dy) as usize, (centre + dx) as usize)] = c64::new(1.0, 0.0);
            let b = fft.inverse(a.view());
            for ((j, i), v) in b.indexed_iter() {
                let y = j as f64 - (n / 2) as f64;
                let x = i as f64 - (n / 2) as f64;
                let expected = cexp(TAU * (dy as f64 * y + dx as f64 * x) / n as f64);
                assert_abs_diff_eq!(v.re, expected.re, epsilon = 1e-12);
                assert_abs_diff_eq!(v.im, expected.im, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_forward_inverse() {
        let n = 16;
        let fft = CentredFft2::new(n);
        let a = Array2::from_shape_fn((n, n), |(j, i)| c64::new((j * i) as f64 % 7.0, j as f64));
        let b = fft.inverse(fft.forward(a.view()).view());
        for (x, y) in a.iter().zip(b.iter()) {
            assert_abs_diff_eq!(x.re, y.re / (n * n) as f64, epsilon = 1e-10);
            assert_abs_diff_eq!(x.im, y.im / (n * n) as f64, epsilon = 1e-10);
        }
    }
}
