// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Oversampled w-projection convolution kernels.
//!
//! A kernel is the uv-plane counterpart of an image-plane function made of a
//! prolate-spheroidal anti-aliasing taper and the w-term chirp
//! `exp(+2πi w (n - 1))`. It is sampled `qpx` times finer than the grid, so
//! that a sample at any sub-cell position can be convolved onto the grid with
//! a precomputed stamp.

mod cache;

pub use cache::{KernelCache, KernelKey};

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use marlu::c64;
use ndarray::prelude::*;
use thiserror::Error;

use crate::{
    constants::{SQRT_2, TAU},
    coord::{GeometryError, Transform2},
    imaging::fft::CentredFft2,
    math::{cexp, n_minus_one},
};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum KernelError {
    #[error("The field of view must be between 0 and √2 (direction cosines); got {0}")]
    InvalidTheta(f64),

    #[error("The kernel support must be odd and at least 1 pixel; got {0}")]
    InvalidSupport(usize),

    #[error("The oversampling factor must be at least 1")]
    ZeroOversampling,

    #[error("The w step must be a positive, finite number; got {0}")]
    InvalidWStep(f64),

    #[error("The kernel cache must be able to hold at least one kernel")]
    ZeroCapacity,

    #[error("Cannot get a kernel for non-finite w ({0})")]
    NonFiniteW(f64),

    #[error("Requested kernel parameters (hash {got:#x}) differ from those the kernel cache was made with (hash {expected:#x})")]
    ParamsMismatch { expected: u64, got: u64 },

    #[error(transparent)]
    Geometry(#[from] GeometryError),
}

/// The fixed parameters of a family of kernels. Everything except `w`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KernelParams {
    /// Field of view \[direction cosines\].
    pub theta: f64,

    /// Size of the image-plane function the kernel is derived from \[pixels\].
    pub npix_ff: usize,

    /// Width of each kernel stamp \[grid cells\]. Always odd.
    pub npix_kern: usize,

    /// Number of sub-cell positions per grid cell per axis.
    pub qpx: usize,

    /// The image-plane skew between the true and assumed (l,m) planes.
    pub transform: Transform2,
}

impl KernelParams {
    /// Validate the parameters and derive `npix_ff` from `npix_kern`.
    pub fn new(
        theta: f64,
        npix_kern: usize,
        qpx: usize,
        transform: Transform2,
    ) -> Result<KernelParams, KernelError> {
        if !(theta > 0.0 && theta < SQRT_2) {
            return Err(KernelError::InvalidTheta(theta));
        }
        if npix_kern == 0 || npix_kern % 2 == 0 {
            return Err(KernelError::InvalidSupport(npix_kern));
        }
        if qpx == 0 {
            return Err(KernelError::ZeroOversampling);
        }
        // Fail early rather than on the first kernel.
        transform.inverse()?;

        Ok(KernelParams {
            theta,
            npix_ff: (2 * (npix_kern + 1)).next_power_of_two(),
            npix_kern,
            qpx,
            transform,
        })
    }

    /// Hash the parameters. Kernels made with parameters with different
    /// hashes aren't interchangeable.
    pub fn hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        // f64s aren't `Hash`, but their bits are.
        self.theta.to_bits().hash(&mut hasher);
        self.npix_ff.hash(&mut hasher);
        self.npix_kern.hash(&mut hasher);
        self.qpx.hash(&mut hasher);
        for row in self.transform.0 {
            for x in row {
                x.to_bits().hash(&mut hasher);
            }
        }
        hasher.finish()
    }

    /// The size of the oversampled uv-plane kernel.
    pub(crate) fn oversampled_size(&self) -> usize {
        self.npix_ff * self.qpx
    }
}

/// A family of `qpx²` convolution stamps for a single w.
#[derive(Clone, Debug, PartialEq)]
pub struct Kernel {
    w: f64,
    /// Indexed by (sub-cell y, sub-cell x, pixel y, pixel x).
    stamps: Array4<c64>,
}

impl Kernel {
    /// The w that this kernel was made for \[wavelengths\].
    pub fn w(&self) -> f64 {
        self.w
    }

    pub fn npix(&self) -> usize {
        self.stamps.len_of(Axis(2))
    }

    pub fn qpx(&self) -> usize {
        self.stamps.len_of(Axis(0))
    }

    /// The stamp for a sample whose position is `yf / qpx` and `xf / qpx`
    /// cells past a grid cell.
    pub fn stamp(&self, yf: usize, xf: usize) -> ArrayView2<c64> {
        self.stamps.slice(s![yf, xf, .., ..])
    }
}

/// Schwab's rational approximation to the zeroth-order prolate-spheroidal wave
/// function with support 6 and α = 1, tapered by `1 - ν²`. `ν` is the distance
/// from the centre of the field in units of half the field.
pub fn anti_aliasing(nu: f64) -> f64 {
    const P: [[f64; 5]; 2] = [
        [8.203343e-2, -3.644705e-1, 6.278660e-1, -5.335581e-1, 2.312756e-1],
        [4.028559e-3, -3.697768e-2, 1.021332e-1, -1.201436e-1, 6.412774e-2],
    ];
    const Q: [[f64; 3]; 2] = [
        [1.0000000e0, 8.212018e-1, 2.078043e-1],
        [1.0000000e0, 9.599102e-1, 2.918724e-1],
    ];

    let nu = nu.abs();
    if !(nu < 1.0) {
        return 0.0;
    }
    let (part, nu_end) = if nu <= 0.75 { (0, 0.75) } else { (1, 1.0) };
    let del_nu_sq = nu * nu - nu_end * nu_end;
    let poly = |coeffs: &[f64]| {
        coeffs
            .iter()
            .rev()
            .fold(0.0, |acc, &c| acc * del_nu_sq + c)
    };
    let top = poly(&P[part]);
    let bot = poly(&Q[part]);
    let psi = if bot > 0.0 { top / bot } else { 0.0 };
    (1.0 - nu * nu) * psi
}

/// How wide must a kernel be to hold the w-term for `|w| <= w_max`? The
/// w-term's widest spatial frequency occurs at the corner of the field; half
/// of it (in grid cells) is added to each side of the anti-aliasing support.
/// `accuracy` scales the w contribution.
///
/// The result is odd and never decreases as `|w_max|` increases.
pub fn kernel_support(theta: f64, w_max: f64, aa_support: usize, accuracy: f64) -> usize {
    let r = theta / SQRT_2;
    let max_freq = w_max.abs() * r / (1.0 - r * r).max(f64::MIN_POSITIVE).sqrt();
    let half_width = (accuracy.max(0.0) * max_freq * theta).ceil();
    let half_width = if half_width.is_finite() {
        half_width as usize
    } else {
        0
    };
    let support = aa_support.max(1) + 2 * half_width;
    if support % 2 == 0 {
        support + 1
    } else {
        support
    }
}

/// The image-plane function whose Fourier transform is the kernel for `w`,
/// sampled on `npix_ff²` pixels across the field.
pub(crate) fn kernel_image(params: &KernelParams, w: f64) -> Result<Array2<c64>, KernelError> {
    let n = params.npix_ff;
    let theta = params.theta;
    let inverse = params.transform.inverse()?;
    let coord = |i: usize| (i as f64 - (n / 2) as f64) * theta / n as f64;
    let taper: Vec<f64> = (0..n).map(|i| anti_aliasing(2.0 * coord(i) / theta)).collect();

    Ok(Array2::from_shape_fn((n, n), |(j, i)| {
        let aa = taper[j] * taper[i];
        if aa == 0.0 {
            return c64::new(0.0, 0.0);
        }
        let (l, m) = inverse.apply(coord(i), coord(j));
        let r2 = l * l + m * m;
        if r2 >= 1.0 {
            return c64::new(0.0, 0.0);
        }
        cexp(TAU * w * n_minus_one(r2)) * aa
    }))
}

/// Generate the kernel for `w`, using an FFT of the oversampled size.
pub(crate) fn w_kernel(
    params: &KernelParams,
    w: f64,
    fft: &CentredFft2,
) -> Result<Kernel, KernelError> {
    if !w.is_finite() {
        return Err(KernelError::NonFiniteW(w));
    }
    let n = params.npix_ff;
    let qpx = params.qpx;
    let na = params.oversampled_size();
    debug_assert_eq!(fft.size(), na);

    // Pad the image-plane function so that its transform is oversampled.
    let image = kernel_image(params, w)?;
    let mut padded = Array2::zeros((na, na));
    let offset = na / 2 - n / 2;
    padded
        .slice_mut(s![offset..offset + n, offset..offset + n])
        .assign(&image);
    let mut oversampled = fft.forward(padded.view());
    oversampled.mapv_inplace(|v| v / (n * n) as f64);

    // Pick out every qpx-th sample for each sub-cell offset. Stamp pixel j
    // sits (j - h - yf/qpx) cells from the sample.
    let npix = params.npix_kern;
    let h = npix / 2;
    let mid = na / 2;
    let stamps = Array4::from_shape_fn((qpx, qpx, npix, npix), |(yf, xf, j, i)| {
        oversampled[(mid + qpx * j - qpx * h - yf, mid + qpx * i - qpx * h - xf)]
    });

    Ok(Kernel { w, stamps })
}

/// Generate a single kernel. Prefer [`KernelCache`] when many kernels are
/// needed.
pub fn generate_kernel(params: &KernelParams, w: f64) -> Result<Kernel, KernelError> {
    let fft = CentredFft2::new(params.oversampled_size());
    w_kernel(params, w, &fft)
}
