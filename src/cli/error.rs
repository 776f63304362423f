// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Error type for all wimager-related errors. This should be the *only* error
//! enum that is publicly visible from the binary's point of view.

use thiserror::Error;

use super::{
    common::CommonArgsError, image::ImageArgsError, simulate::SimulateArgsError,
};
#[cfg(feature = "plotting")]
use crate::io::DrawError;
use crate::{
    coord::GeometryError,
    imaging::ImagingError,
    io::{FitsWriteError, VisFileError},
    kernel::KernelError,
    simulate::SimulateError,
    vis::VisError,
};

/// The *only* publicly visible error from the wimager binary. Where it helps,
/// messages carry a hint on what to change.
#[derive(Error, Debug)]
pub enum WimagerError {
    /// An error related to simulate.
    #[error("{0}")]
    Simulate(String),

    /// An error related to imaging.
    #[error("{0}")]
    Image(String),

    /// An error related to the image grid.
    #[error("{0}\n\nThe grid size is theta * lam cells; the kernel support grows with theta and the largest |w|.")]
    Grid(String),

    /// An error related to w-kernels.
    #[error("{0}\n\nKernel options can be set with --npix-kern, --qpx and --w-step.")]
    Kernel(String),

    /// An error related to sky geometry.
    #[error("{0}\n\nCheck that the phase centres and sources are above each other's horizons.")]
    Geometry(String),

    /// An error related to visibility files.
    #[error("{0}\n\nVisibility files are JSON with the keys phase_centre_deg, uvw and vis.")]
    VisFile(String),

    /// An error related to argument files.
    #[error("{0}\n\nArgument files use the long names of the command-line arguments, in a table named after the subcommand.")]
    ArgFile(String),

    /// A cfitsio error. Because these are usually quite spartan, some
    /// suggestions are provided here.
    #[error("cfitsio error: {0}\n\nIf you don't know what this means, try turning up verbosity (-v or -vv) and maybe disabling progress bars.")]
    Cfitsio(String),

    /// An error related to plotting.
    #[error("{0}")]
    Plot(String),

    /// A generic error that can't be clarified further, e.g. IO errors.
    #[error("{0}")]
    Generic(String),
}

// When changing the error propagation below, ensure `Self::from(e)` uses the
// correct `e`!

// Binary sub-command errors.

impl From<CommonArgsError> for WimagerError {
    fn from(e: CommonArgsError) -> Self {
        Self::Generic(e.to_string())
    }
}

impl From<SimulateArgsError> for WimagerError {
    fn from(e: SimulateArgsError) -> Self {
        Self::Simulate(e.to_string())
    }
}

impl From<ImageArgsError> for WimagerError {
    fn from(e: ImageArgsError) -> Self {
        match e {
            ImageArgsError::InvalidTransform(_) => Self::Geometry(e.to_string()),
            _ => Self::Image(e.to_string()),
        }
    }
}

// Library errors.

impl From<SimulateError> for WimagerError {
    fn from(e: SimulateError) -> Self {
        let s = e.to_string();
        match e {
            SimulateError::Geometry(_) => Self::Geometry(s),
            SimulateError::IO(_) => Self::Generic(s),
            SimulateError::UnknownLayoutType(_)
            | SimulateError::TooFewAntennas(_)
            | SimulateError::Toml(_)
            | SimulateError::Json(_) => Self::Simulate(s),
        }
    }
}

impl From<ImagingError> for WimagerError {
    fn from(e: ImagingError) -> Self {
        let s = e.to_string();
        match e {
            ImagingError::InvalidLam(_)
            | ImagingError::GridTooSmall { .. }
            | ImagingError::GridBounds { .. } => Self::Grid(s),
            ImagingError::NonFinite { .. } | ImagingError::NothingGridded => Self::Image(s),
            ImagingError::Kernel(e) => Self::from(e),
            ImagingError::Geometry(e) => Self::from(e),
            ImagingError::Vis(e) => Self::from(e),
        }
    }
}

impl From<KernelError> for WimagerError {
    fn from(e: KernelError) -> Self {
        match e {
            KernelError::Geometry(e) => Self::from(e),
            _ => Self::Kernel(e.to_string()),
        }
    }
}

impl From<GeometryError> for WimagerError {
    fn from(e: GeometryError) -> Self {
        Self::Geometry(e.to_string())
    }
}

impl From<VisError> for WimagerError {
    fn from(e: VisError) -> Self {
        match e {
            VisError::Geometry(e) => Self::from(e),
            _ => Self::VisFile(e.to_string()),
        }
    }
}

impl From<VisFileError> for WimagerError {
    fn from(e: VisFileError) -> Self {
        let s = e.to_string();
        match e {
            VisFileError::IO(_) => Self::Generic(s),
            _ => Self::VisFile(s),
        }
    }
}

impl From<FitsWriteError> for WimagerError {
    fn from(e: FitsWriteError) -> Self {
        let s = e.to_string();
        match e {
            FitsWriteError::Fitsio(_) => Self::Cfitsio(s),
            FitsWriteError::NotSquare { .. } | FitsWriteError::IO(_) => Self::Generic(s),
        }
    }
}

#[cfg(feature = "plotting")]
impl From<DrawError> for WimagerError {
    fn from(e: DrawError) -> Self {
        Self::Plot(e.to_string())
    }
}

impl From<std::io::Error> for WimagerError {
    fn from(e: std::io::Error) -> Self {
        Self::Generic(e.to_string())
    }
}
