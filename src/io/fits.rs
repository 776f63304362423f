// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Write images to FITS files.

use std::path::Path;

use fitsio::{
    hdu::FitsHdu,
    images::{ImageDescription, ImageType},
    FitsFile,
};
use log::debug;
use marlu::RADec;
use ndarray::prelude::*;
use thiserror::Error;

use crate::imaging::ImagingResult;

#[derive(Error, Debug)]
pub enum FitsWriteError {
    #[error("Image {name} isn't square ({rows}x{cols})")]
    NotSquare {
        name: &'static str,
        rows: usize,
        cols: usize,
    },

    #[error(transparent)]
    Fitsio(#[from] fitsio::errors::Error),

    #[error(transparent)]
    IO(#[from] std::io::Error),
}

/// Write the image (and PSF, if there is one) of an imaging run to `file`.
/// Any existing file is overwritten.
///
/// The primary HDU holds no data, only information on the run. The image is in
/// an extension HDU called "IMAGE", and the PSF in "PSF". Both have linear
/// direction-cosine axes, with the phase centre at pixel `(N/2, N/2)`
/// (zero-indexed), i.e. `CRPIX = N/2 + 1`.
pub fn write_fits_images<P: AsRef<Path>>(
    file: P,
    result: &ImagingResult,
    phase_centre: Option<RADec>,
) -> Result<(), FitsWriteError> {
    let file = file.as_ref();
    let theta = result.theta;
    if file.exists() {
        std::fs::remove_file(file)?;
    }
    debug!("Writing FITS images to {}", file.display());
    let mut fptr = FitsFile::create(file).open()?;

    let hdu = fptr.primary_hdu()?;
    hdu.write_key(
        &mut fptr,
        "SOFTWARE",
        format!("{} v{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
    )?;
    if let Some(phase_centre) = phase_centre {
        hdu.write_key(&mut fptr, "OBSRA", phase_centre.ra.to_degrees())?;
        hdu.write_key(&mut fptr, "OBSDEC", phase_centre.dec.to_degrees())?;
    }
    hdu.write_key(&mut fptr, "FOV", theta)?;
    hdu.write_key(&mut fptr, "SUMWT", result.sum_weights)?;
    hdu.write_key(&mut fptr, "NGRID", result.num_gridded as i64)?;
    hdu.write_key(&mut fptr, "NDROP", result.num_dropped as i64)?;
    hdu.write_key(&mut fptr, "NCLIP", result.num_clipped as i64)?;
    hdu.write_key(&mut fptr, "NKERN", result.kernels_computed as i64)?;

    let hdu = write_image(&mut fptr, "IMAGE", result.image.view())?;
    write_axis_keys(&mut fptr, &hdu, result.image.nrows(), theta)?;
    hdu.write_key(&mut fptr, "BUNIT", "JY/BEAM")?;
    hdu.write_key(&mut fptr, "MAXIMAG", result.max_imaginary)?;

    if let Some(psf) = result.psf.as_ref() {
        let hdu = write_image(&mut fptr, "PSF", psf.view())?;
        write_axis_keys(&mut fptr, &hdu, psf.nrows(), theta)?;
    }

    Ok(())
}

fn write_image(
    fptr: &mut FitsFile,
    name: &'static str,
    image: ArrayView2<f64>,
) -> Result<FitsHdu, FitsWriteError> {
    let (rows, cols) = image.dim();
    if rows != cols {
        return Err(FitsWriteError::NotSquare { name, rows, cols });
    }

    // FITS images are written in the same (row-major) order as ndarray's
    // standard layout, so the l axis (columns) becomes NAXIS1.
    let dim = [rows, cols];
    let image_description = ImageDescription {
        data_type: ImageType::Double,
        dimensions: &dim,
    };
    let hdu = fptr.create_image(name, &image_description)?;
    let data: Vec<f64> = image.iter().copied().collect();
    hdu.write_image(fptr, &data)?;
    Ok(hdu)
}

fn write_axis_keys(
    fptr: &mut FitsFile,
    hdu: &FitsHdu,
    grid_size: usize,
    theta: f64,
) -> Result<(), FitsWriteError> {
    let crpix = (grid_size / 2) as f64 + 1.0;
    let cdelt = theta / grid_size as f64;
    for (axis, ctype) in [(1, "L"), (2, "M")] {
        hdu.write_key(fptr, &format!("CTYPE{axis}"), ctype)?;
        hdu.write_key(fptr, &format!("CRPIX{axis}"), crpix)?;
        hdu.write_key(fptr, &format!("CDELT{axis}"), cdelt)?;
        hdu.write_key(fptr, &format!("CRVAL{axis}"), 0.0)?;
    }
    Ok(())
}
