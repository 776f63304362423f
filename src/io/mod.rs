// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Reading and writing visibilities and images.
//!
//! Visibilities are kept in a small JSON file: a phase centre, and one
//! `[u, v, w]` (in wavelengths) and `[re, im]` pair per visibility. Images are
//! written as FITS files, and optionally as PNGs when the "plotting" feature
//! is enabled.

mod fits;
#[cfg(feature = "plotting")]
mod plotting;

pub use fits::{write_fits_images, FitsWriteError};
#[cfg(feature = "plotting")]
pub use plotting::{plot_image, DrawError};

use std::{
    fs::File,
    io::{BufReader, BufWriter},
    path::{Path, PathBuf},
};

use log::debug;
use marlu::{c64, RADec, UVW};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::vis::VisError;

#[derive(Error, Debug)]
pub enum VisFileError {
    #[error("Couldn't read visibility file {file}: {err}")]
    Read { file: PathBuf, err: serde_json::Error },

    #[error("Couldn't write visibility file {file}: {err}")]
    Write { file: PathBuf, err: serde_json::Error },

    #[error("The visibility file's phase centre ({ra}°, {dec}°) isn't valid")]
    BadPhaseCentre { ra: f64, dec: f64 },

    #[error(transparent)]
    Vis(#[from] VisError),

    #[error(transparent)]
    IO(#[from] std::io::Error),
}

/// Visibilities of a single frequency channel, phased to `phase_centre_deg`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisibilityFile {
    /// RA and Dec [degrees].
    pub phase_centre_deg: [f64; 2],

    /// [wavelengths]
    pub uvw: Vec<[f64; 3]>,

    pub vis: Vec<[f64; 2]>,
}

impl VisibilityFile {
    pub fn new(phase_centre: RADec, uvws: &[UVW], vis: &[c64]) -> Result<Self, VisFileError> {
        if uvws.len() != vis.len() {
            return Err(VisError::LengthMismatch {
                num_uvws: uvws.len(),
                num_vis: vis.len(),
            }
            .into());
        }

        Ok(VisibilityFile {
            phase_centre_deg: [phase_centre.ra.to_degrees(), phase_centre.dec.to_degrees()],
            uvw: uvws.iter().map(|uvw| [uvw.u, uvw.v, uvw.w]).collect(),
            vis: vis.iter().map(|v| [v.re, v.im]).collect(),
        })
    }

    pub fn read<P: AsRef<Path>>(file: P) -> Result<Self, VisFileError> {
        let file = file.as_ref();
        debug!("Reading visibilities from {}", file.display());
        let reader = BufReader::new(File::open(file)?);
        let vis_file: VisibilityFile =
            serde_json::from_reader(reader).map_err(|err| VisFileError::Read {
                file: file.to_path_buf(),
                err,
            })?;

        if vis_file.uvw.len() != vis_file.vis.len() {
            return Err(VisError::LengthMismatch {
                num_uvws: vis_file.uvw.len(),
                num_vis: vis_file.vis.len(),
            }
            .into());
        }
        let [ra, dec] = vis_file.phase_centre_deg;
        if !(ra.is_finite() && (-90.0..=90.0).contains(&dec)) {
            return Err(VisFileError::BadPhaseCentre { ra, dec });
        }
        Ok(vis_file)
    }

    pub fn write<P: AsRef<Path>>(&self, file: P) -> Result<(), VisFileError> {
        let file = file.as_ref();
        debug!("Writing {} visibilities to {}", self.vis.len(), file.display());
        let writer = BufWriter::new(File::create(file)?);
        serde_json::to_writer(writer, self).map_err(|err| VisFileError::Write {
            file: file.to_path_buf(),
            err,
        })
    }

    pub fn phase_centre(&self) -> RADec {
        RADec::from_degrees(self.phase_centre_deg[0], self.phase_centre_deg[1])
    }

    pub fn uvws(&self) -> Vec<UVW> {
        self.uvw
            .iter()
            .map(|&[u, v, w]| UVW { u, v, w })
            .collect()
    }

    pub fn vis(&self) -> Vec<c64> {
        self.vis.iter().map(|&[re, im]| c64::new(re, im)).collect()
    }

    pub fn len(&self) -> usize {
        self.vis.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vis.is_empty()
    }
}
