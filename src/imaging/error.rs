// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors that can occur while imaging.

use thiserror::Error;

use crate::{coord::GeometryError, kernel::KernelError, vis::VisError};

#[derive(Error, Debug)]
pub enum ImagingError {
    #[error("The uv extent of the grid must be a positive, finite number of wavelengths; got {0}")]
    InvalidLam(f64),

    #[error("A {grid_size}x{grid_size} grid is too small for {npix_kern}x{npix_kern} kernels; increase theta or lam")]
    GridTooSmall { grid_size: usize, npix_kern: usize },

    #[error("Visibility {index} (u = {u}, v = {v}) doesn't fit on the grid")]
    GridBounds { index: usize, u: f64, v: f64 },

    #[error("Visibility {index} or its coordinates are not finite")]
    NonFinite { index: usize },

    #[error("No visibilities were gridded, so there's nothing to image")]
    NothingGridded,

    #[error(transparent)]
    Kernel(#[from] KernelError),

    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error(transparent)]
    Vis(#[from] VisError),
}
