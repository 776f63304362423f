// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Gridding visibilities with w-projection kernels and transforming them into
//! images.
//!
//! The grid is `N = round(theta * lam)` cells on a side, with uv cells of
//! `1 / theta` wavelengths and the uv origin at index `N / 2`. Image pixel `i`
//! corresponds to the direction cosine `(i - N/2) * theta / N`. Arrays are
//! indexed `[m, l]` (equivalently `[v, u]`).

mod component;
mod error;
pub(crate) mod fft;

pub use component::Component;
pub use error::ImagingError;

use std::{ops::Range, str::FromStr, sync::Arc};

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use itertools::Itertools;
use log::{debug, warn};
use marlu::{c64, UVW};
use ndarray::prelude::*;
use ndarray::Zip;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};

use self::fft::CentredFft2;
use crate::{
    constants::*,
    coord::{uvw_transform, Transform2},
    kernel::{kernel_support, Kernel, KernelCache, KernelError, KernelParams},
    math::div_ceil,
    vis::VisError,
    PROGRESS_BARS,
};

pub const DEFAULT_BOUNDS_POLICY: BoundsPolicy = BoundsPolicy::Drop;

lazy_static::lazy_static! {
    // Useful for help texts.
    pub(crate) static ref BOUNDS_POLICIES: String = BoundsPolicy::iter().join(", ");
}

/// What to do with a visibility whose kernel footprint (or that of its
/// Hermitian mirror) doesn't fit entirely on the grid.
#[derive(
    Debug, Display, Clone, Copy, EnumIter, EnumString, PartialEq, Eq, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum BoundsPolicy {
    /// Don't grid the visibility or its mirror. They are counted.
    #[strum(serialize = "drop")]
    Drop,

    /// Grid only the parts of the footprints that land on the grid. These
    /// visibilities are counted.
    #[strum(serialize = "clip")]
    Clip,

    /// Stop imaging.
    #[strum(serialize = "error")]
    Error,
}

impl Default for BoundsPolicy {
    fn default() -> Self {
        DEFAULT_BOUNDS_POLICY
    }
}

impl BoundsPolicy {
    pub fn parse(value: &str) -> Result<BoundsPolicy, strum::ParseError> {
        Self::from_str(&value.to_lowercase())
    }
}

/// Everything that controls an imaging run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImagingConfig {
    /// Field of view \[direction cosines\].
    pub theta: f64,

    /// uv extent of the grid \[wavelengths\].
    pub lam: f64,

    /// Sub-cell kernel positions per grid cell per axis.
    pub qpx: usize,

    /// Kernel width \[grid cells\]. Derived from the largest |w| if not given.
    pub npix_kern: Option<usize>,

    /// Width of the anti-aliasing part of the kernel \[grid cells\].
    pub aa_support: usize,

    /// Scales the w part of the derived kernel width.
    pub kernel_accuracy: f64,

    /// Width of the w buckets that share a kernel \[wavelengths\].
    pub w_step: Option<f64>,

    /// Maximum number of cached kernels.
    pub cache_capacity: Option<usize>,

    pub bounds_policy: BoundsPolicy,

    /// Skew between the true and assumed (l,m) planes.
    pub transform: Transform2,

    /// Also make a point-spread function?
    pub make_psf: bool,
}

impl Default for ImagingConfig {
    fn default() -> Self {
        ImagingConfig {
            theta: DEFAULT_THETA,
            lam: DEFAULT_LAM,
            qpx: DEFAULT_QPX,
            npix_kern: None,
            aa_support: DEFAULT_AA_SUPPORT,
            kernel_accuracy: DEFAULT_KERNEL_ACCURACY,
            w_step: None,
            cache_capacity: None,
            bounds_policy: DEFAULT_BOUNDS_POLICY,
            transform: Transform2::identity(),
            make_psf: true,
        }
    }
}

impl ImagingConfig {
    /// The number of grid cells (and image pixels) on a side.
    pub fn grid_size(&self) -> Result<usize, ImagingError> {
        if !(self.lam.is_finite() && self.lam > 0.0) {
            return Err(ImagingError::InvalidLam(self.lam));
        }
        if !(self.theta.is_finite() && self.theta > 0.0) {
            return Err(KernelError::InvalidTheta(self.theta).into());
        }
        Ok((self.theta * self.lam).round() as usize)
    }

    /// The kernel width needed for baselines with `|w| <= w_max`.
    pub fn npix_kern(&self, w_max: f64) -> usize {
        self.npix_kern.unwrap_or_else(|| {
            kernel_support(self.theta, w_max, self.aa_support, self.kernel_accuracy)
        })
    }

    pub fn kernel_params(&self, w_max: f64) -> Result<KernelParams, KernelError> {
        KernelParams::new(self.theta, self.npix_kern(w_max), self.qpx, self.transform)
    }
}

/// Visibilities accumulated onto a grid, ready to be transformed.
#[derive(Debug, Clone)]
pub struct Gridded {
    pub grid: Array2<c64>,

    /// The same footprints as `grid`, with unit visibilities.
    pub psf_grid: Option<Array2<c64>>,

    /// The number of points (visibilities and mirrors) that were gridded.
    pub sum_weights: f64,

    pub num_gridded: usize,
    pub num_dropped: usize,
    pub num_clipped: usize,
}

impl Gridded {
    fn new(grid_size: usize, make_psf: bool) -> Gridded {
        Gridded {
            grid: Array2::zeros((grid_size, grid_size)),
            psf_grid: make_psf.then(|| Array2::zeros((grid_size, grid_size))),
            sum_weights: 0.0,
            num_gridded: 0,
            num_dropped: 0,
            num_clipped: 0,
        }
    }

    fn merge(mut self, other: Gridded) -> Gridded {
        self.grid += &other.grid;
        if let (Some(psf), Some(other_psf)) = (self.psf_grid.as_mut(), other.psf_grid.as_ref()) {
            *psf += other_psf;
        }
        self.sum_weights += other.sum_weights;
        self.num_gridded += other.num_gridded;
        self.num_dropped += other.num_dropped;
        self.num_clipped += other.num_clipped;
        self
    }
}

/// The products of an imaging run.
#[derive(Debug, Clone)]
pub struct ImagingResult {
    /// Indexed `[m, l]`.
    pub image: Array2<f64>,
    /// The field of view of `image` \[direction cosines\].
    pub theta: f64,
    pub psf: Option<Array2<f64>>,
    pub sum_weights: f64,
    pub num_gridded: usize,
    pub num_dropped: usize,
    pub num_clipped: usize,

    /// The number of kernels the cache has generated. This is cumulative if
    /// the cache is shared between runs.
    pub kernels_computed: usize,

    /// The largest imaginary part of the image before it was discarded.
    pub max_imaginary: f64,
}

/// Where a point's kernel stamp lands on the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Placement {
    /// Grid cell of the stamp's first row and column.
    y0: isize,
    x0: isize,
    /// Sub-cell offsets.
    yf: usize,
    xf: usize,
}

impl Placement {
    fn fits(&self, npix: usize, grid_size: usize) -> bool {
        let max = (grid_size - npix) as isize;
        (0..=max).contains(&self.y0) && (0..=max).contains(&self.x0)
    }
}

/// Grid and stamp index ranges for the part of a footprint starting at
/// `start` that is on a grid of size `n`.
fn overlap(start: isize, npix: usize, n: usize) -> Option<(Range<usize>, Range<usize>)> {
    let end = start + npix as isize;
    let lo = start.max(0);
    let hi = end.min(n as isize);
    if lo >= hi {
        return None;
    }
    Some((
        lo as usize..hi as usize,
        (lo - start) as usize..(hi - start) as usize,
    ))
}

/// Add `value` times the stamp onto the grid. Returns false if none of the
/// stamp landed on the grid.
fn add_stamp(grid: &mut Array2<c64>, stamp: ArrayView2<c64>, p: &Placement, value: c64) -> bool {
    let npix = stamp.nrows();
    let n = grid.nrows();
    match (overlap(p.y0, npix, n), overlap(p.x0, npix, n)) {
        (Some((grid_y, stamp_y)), Some((grid_x, stamp_x))) => {
            grid.slice_mut(s![grid_y, grid_x])
                .zip_mut_with(&stamp.slice(s![stamp_y, stamp_x]), |g, &k| {
                    *g += value * k
                });
            true
        }
        _ => false,
    }
}

/// The image-plane response of the w = 0 kernel, i.e. what gridding with
/// that kernel multiplies the image by. Values below [`GRID_CORRECTION_FLOOR`]
/// of the central value are set to 0; those pixels get blanked.
fn grid_correction(kernel: &Kernel, grid_size: usize, fft: &CentredFft2) -> Array2<f64> {
    let npix = kernel.npix();
    let start = grid_size / 2 - npix / 2;
    let mut grid = Array2::zeros((grid_size, grid_size));
    grid.slice_mut(s![start..start + npix, start..start + npix])
        .assign(&kernel.stamp(0, 0));
    let mut correction = fft.inverse(grid.view()).mapv(|v| v.re);
    let floor = GRID_CORRECTION_FLOOR * correction[(grid_size / 2, grid_size / 2)];
    correction.mapv_inplace(|c| if c < floor { 0.0 } else { c });
    correction
}

fn pixel_to_lm(index: usize, grid_size: usize, theta: f64) -> f64 {
    (index as f64 - (grid_size / 2) as f64) * theta / grid_size as f64
}

fn lm_to_pixel(lm: f64, grid_size: usize, theta: f64) -> f64 {
    lm * grid_size as f64 / theta + (grid_size / 2) as f64
}

fn make_gridding_progress_bar(num_vis: usize) -> ProgressBar {
    ProgressBar::with_draw_target(
        Some(num_vis as _),
        if PROGRESS_BARS.load() {
            ProgressDrawTarget::stdout()
        } else {
            ProgressDrawTarget::hidden()
        },
    )
    .with_style(
        ProgressStyle::default_bar()
            .template("{msg:17}: [{wide_bar:.blue}] {pos:3}/{len:3} ({elapsed_precise}<{eta_precise})")
            .unwrap()
            .progress_chars("=> "),
    )
    .with_message("Gridding")
}

/// A single imaging run: a grid size, a kernel family and the cache that
/// holds its kernels, and the FFT plans for the grid.
pub struct Imager {
    config: ImagingConfig,
    grid_size: usize,
    params: KernelParams,
    /// Applied to (u,v) before gridding; the dual of `config.transform`.
    uv_transform: Transform2,
    cache: Arc<KernelCache>,
    fft: CentredFft2,
    correction: Array2<f64>,
}

impl Imager {
    /// Set up an imaging run for baselines with `|w| <= w_max`. The kernel
    /// width, w step and cache capacity are derived unless `config`
    /// specifies them.
    pub fn new(config: ImagingConfig, w_max: f64) -> Result<Imager, ImagingError> {
        let params = config.kernel_params(w_max)?;
        let cache = KernelCache::for_w_max(params, w_max, config.w_step, config.cache_capacity)?;
        Self::with_cache(config, Arc::new(cache))
    }

    /// Set up an imaging run sized for the largest |w| in `uvws`.
    pub fn for_visibilities(config: ImagingConfig, uvws: &[UVW]) -> Result<Imager, ImagingError> {
        let w_max = uvws.iter().fold(0.0_f64, |acc, uvw| acc.max(uvw.w.abs()));
        Self::new(config, w_max)
    }

    /// Set up an imaging run that uses an existing kernel cache. The cache's
    /// kernel parameters must match `config`.
    pub fn with_cache(
        config: ImagingConfig,
        cache: Arc<KernelCache>,
    ) -> Result<Imager, ImagingError> {
        let grid_size = config.grid_size()?;
        let cache_params = *cache.params();
        let npix_kern = config.npix_kern.unwrap_or(cache_params.npix_kern);
        let params = KernelParams::new(config.theta, npix_kern, config.qpx, config.transform)?;
        if params.hash() != cache_params.hash() {
            return Err(KernelError::ParamsMismatch {
                expected: cache_params.hash(),
                got: params.hash(),
            }
            .into());
        }
        if npix_kern > grid_size {
            return Err(ImagingError::GridTooSmall {
                grid_size,
                npix_kern,
            });
        }

        let uv_transform = config.transform.inverse()?.transpose();
        let fft = CentredFft2::new(grid_size);
        let correction = grid_correction(&cache.generate(0.0)?, grid_size, &fft);
        debug!("Grid size: {grid_size}x{grid_size} (cell size {} wavelengths)", 1.0 / config.theta);
        debug!(
            "Kernel size: {npix_kern}x{npix_kern}, oversampled {}x from a {}x{} image",
            params.qpx, params.npix_ff, params.npix_ff
        );
        debug!(
            "Kernel cache: w step {} wavelengths, capacity {}",
            cache.w_step(),
            cache.capacity()
        );

        Ok(Imager {
            config,
            grid_size,
            params,
            uv_transform,
            cache,
            fft,
            correction,
        })
    }

    pub fn config(&self) -> &ImagingConfig {
        &self.config
    }

    pub fn grid_size(&self) -> usize {
        self.grid_size
    }

    pub fn kernel_params(&self) -> &KernelParams {
        &self.params
    }

    pub fn cache(&self) -> &Arc<KernelCache> {
        &self.cache
    }

    /// The direction cosine of an image pixel index (along either axis).
    pub fn pixel_to_lm(&self, index: usize) -> f64 {
        pixel_to_lm(index, self.grid_size, self.config.theta)
    }

    /// The (fractional) image pixel index of a direction cosine.
    pub fn lm_to_pixel(&self, lm: f64) -> f64 {
        lm_to_pixel(lm, self.grid_size, self.config.theta)
    }

    /// Find where the stamp for a point at (u,v) goes.
    fn place(&self, u: f64, v: f64) -> Placement {
        let qpx = self.params.qpx as i64;
        let h = (self.params.npix_kern / 2) as isize;
        let centre = (self.grid_size / 2) as f64;
        let split = |coord: f64| {
            let x = centre + coord * self.config.theta;
            let xq = (x * qpx as f64).round() as i64;
            (xq.div_euclid(qpx) as isize, xq.rem_euclid(qpx) as usize)
        };
        let (px, xf) = split(u);
        let (py, yf) = split(v);
        Placement {
            y0: py - h,
            x0: px - h,
            yf,
            xf,
        }
    }

    fn grid_chunk(
        &self,
        uvws: &[UVW],
        vis: &[c64],
        first_index: usize,
        progress: &ProgressBar,
    ) -> Result<Gridded, ImagingError> {
        let n = self.grid_size;
        let npix = self.params.npix_kern;
        let mut gridded = Gridded::new(n, self.config.make_psf);

        for (i, (uvw, &v)) in uvws.iter().zip(vis.iter()).enumerate() {
            let index = first_index + i;
            if !(uvw.u.is_finite()
                && uvw.v.is_finite()
                && uvw.w.is_finite()
                && v.re.is_finite()
                && v.im.is_finite())
            {
                return Err(ImagingError::NonFinite { index });
            }

            // Every visibility is gridded with its Hermitian mirror.
            let pos = self.place(uvw.u, uvw.v);
            let neg = self.place(-uvw.u, -uvw.v);
            let fits = pos.fits(npix, n) && neg.fits(npix, n);
            if !fits {
                match self.config.bounds_policy {
                    BoundsPolicy::Drop => {
                        gridded.num_dropped += 1;
                        continue;
                    }
                    BoundsPolicy::Error => {
                        return Err(ImagingError::GridBounds {
                            index,
                            u: uvw.u,
                            v: uvw.v,
                        })
                    }
                    BoundsPolicy::Clip => (),
                }
            }

            let kernel_pos = self.cache.get(&self.params, uvw.w)?;
            let kernel_neg = self.cache.get(&self.params, -uvw.w)?;
            let mut num_added = 0;
            for (p, kernel, value) in [(&pos, &kernel_pos, v), (&neg, &kernel_neg, v.conj())] {
                let stamp = kernel.stamp(p.yf, p.xf);
                if add_stamp(&mut gridded.grid, stamp, p, value) {
                    num_added += 1;
                    if let Some(psf) = gridded.psf_grid.as_mut() {
                        add_stamp(psf, stamp, p, c64::new(1.0, 0.0));
                    }
                }
            }

            if num_added == 0 {
                gridded.num_dropped += 1;
            } else {
                gridded.num_gridded += 1;
                gridded.sum_weights += num_added as f64;
                if !fits {
                    gridded.num_clipped += 1;
                }
            }
        }

        progress.inc(uvws.len() as u64);
        Ok(gridded)
    }

    /// Convolve visibilities onto a grid. The order of the visibilities
    /// doesn't matter; they're split between threads, each of which fills its
    /// own grid, and the grids are then summed.
    pub fn grid(&self, uvws: &[UVW], vis: &[c64]) -> Result<Gridded, ImagingError> {
        if uvws.len() != vis.len() {
            return Err(VisError::LengthMismatch {
                num_uvws: uvws.len(),
                num_vis: vis.len(),
            }
            .into());
        }
        let uvws = uvw_transform(uvws, self.uv_transform);
        let n = self.grid_size;
        let make_psf = self.config.make_psf;
        let chunk_size = div_ceil(uvws.len(), rayon::current_num_threads()).max(1);

        let progress = make_gridding_progress_bar(uvws.len());
        let gridded = uvws
            .par_chunks(chunk_size)
            .zip(vis.par_chunks(chunk_size))
            .enumerate()
            .map(|(i_chunk, (uvws, vis))| {
                self.grid_chunk(uvws, vis, i_chunk * chunk_size, &progress)
            })
            .try_reduce(|| Gridded::new(n, make_psf), |a, b| Ok(a.merge(b)))?;
        progress.abandon_with_message("Finished gridding");

        debug!(
            "Gridded {} visibilities ({} clipped); {} kernels generated, {} cache hits",
            gridded.num_gridded,
            gridded.num_clipped,
            self.cache.num_computed(),
            self.cache.num_hits()
        );
        if gridded.num_dropped > 0 {
            warn!(
                "{} visibilities didn't fit on the grid and were dropped",
                gridded.num_dropped
            );
        }
        Ok(gridded)
    }

    /// Transform a grid into an image: inverse FFT, divide by the grid
    /// correction and the total weight, and keep the real part. Pixels where
    /// the correction is too small to trust are 0.
    fn grid_to_image(&self, grid: ArrayView2<c64>, sum_weights: f64) -> (Array2<f64>, f64) {
        let dirty = self.fft.inverse(grid);
        let corrected = Zip::from(&dirty)
            .and(&self.correction)
            .map_collect(|&v, &c| {
                if c <= 0.0 {
                    c64::new(0.0, 0.0)
                } else {
                    v / (c * sum_weights)
                }
            });
        let max_imaginary = corrected.iter().fold(0.0_f64, |acc, v| acc.max(v.im.abs()));
        (corrected.mapv(|v| v.re), max_imaginary)
    }

    /// Turn gridded visibilities into an image (and PSF, if they were
    /// gridded).
    pub fn finalize(&self, gridded: Gridded) -> Result<ImagingResult, ImagingError> {
        if gridded.sum_weights <= 0.0 {
            return Err(ImagingError::NothingGridded);
        }
        let sum_weights = gridded.sum_weights;
        let (image, max_imaginary) = self.grid_to_image(gridded.grid.view(), sum_weights);
        let psf = gridded
            .psf_grid
            .map(|psf_grid| self.grid_to_image(psf_grid.view(), sum_weights).0);
        debug!("Largest imaginary part of the image: {max_imaginary:e}");

        Ok(ImagingResult {
            image,
            theta: self.config.theta,
            psf,
            sum_weights,
            num_gridded: gridded.num_gridded,
            num_dropped: gridded.num_dropped,
            num_clipped: gridded.num_clipped,
            kernels_computed: self.cache.num_computed(),
            max_imaginary,
        })
    }

    /// Grid visibilities and transform them into an image.
    pub fn invert(&self, uvws: &[UVW], vis: &[c64]) -> Result<ImagingResult, ImagingError> {
        let gridded = self.grid(uvws, vis)?;
        self.finalize(gridded)
    }
}

/// Image visibilities with an [`Imager`] sized for them.
pub fn invert(
    config: ImagingConfig,
    uvws: &[UVW],
    vis: &[c64],
) -> Result<ImagingResult, ImagingError> {
    Imager::for_visibilities(config, uvws)?.invert(uvws, vis)
}
