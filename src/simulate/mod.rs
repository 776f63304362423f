// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Simple simulations of interferometer data: baselines from an array layout
//! tracking a phase centre, and visibilities of point sources.

#[cfg(test)]
mod tests;

use std::{
    fs::File,
    io::Read,
    path::{Path, PathBuf},
};

use log::debug;
use marlu::{c64, pos::xyz::xyzs_to_cross_uvws, HADec, RADec, XyzGeodetic, UVW};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    constants::TAU,
    coord::{n_from_lm, skycoord_to_lmn, GeometryError},
    math::{cexp, n_minus_one},
};

#[derive(Error, Debug)]
pub enum SimulateError {
    #[error("Array layout '{0}' has an unrecognised extension; use .toml or .json")]
    UnknownLayoutType(PathBuf),

    #[error("An array layout needs at least 2 antennas; got {0}")]
    TooFewAntennas(usize),

    #[error("Couldn't decode TOML array layout: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Couldn't decode JSON array layout: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error(transparent)]
    IO(#[from] std::io::Error),
}

/// The positions of an array's antennas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayLayout {
    /// Geodetic latitude of the array \[degrees\].
    pub latitude_deg: f64,

    /// East, north and height of each antenna, relative to the array centre
    /// \[metres\].
    pub antennas: Vec<[f64; 3]>,
}

impl ArrayLayout {
    /// A "Y"-shaped array with `num_per_arm` antennas on each of three arms
    /// 120° apart (like the VLA). Antenna `k` on an arm is
    /// `spacing_m * (k + 1)^1.5` metres from the centre.
    pub fn y_shaped(num_per_arm: usize, spacing_m: f64, latitude_deg: f64) -> ArrayLayout {
        let mut antennas = Vec::with_capacity(3 * num_per_arm);
        for arm in 0..3 {
            // Arms point 5° east of north, then every 120°.
            let azimuth = (5.0 + 120.0 * arm as f64).to_radians();
            let (s_az, c_az) = azimuth.sin_cos();
            for k in 0..num_per_arm {
                let r = spacing_m * ((k + 1) as f64).powf(1.5);
                antennas.push([r * s_az, r * c_az, 0.0]);
            }
        }
        ArrayLayout {
            latitude_deg,
            antennas,
        }
    }

    /// Read a layout from a TOML or JSON file.
    pub fn read<P: AsRef<Path>>(file: P) -> Result<ArrayLayout, SimulateError> {
        let file = file.as_ref();
        let mut contents = String::new();
        File::open(file)?.read_to_string(&mut contents)?;
        let layout: ArrayLayout = match file
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .as_deref()
        {
            Some("toml") => toml::from_str(&contents)?,
            Some("json") => serde_json::from_str(&contents)?,
            _ => return Err(SimulateError::UnknownLayoutType(file.to_path_buf())),
        };
        if layout.antennas.len() < 2 {
            return Err(SimulateError::TooFewAntennas(layout.antennas.len()));
        }
        Ok(layout)
    }

    pub fn num_baselines(&self) -> usize {
        let n = self.antennas.len();
        n * n.saturating_sub(1) / 2
    }

    /// Antenna positions in geodetic XYZ \[metres\]: Z towards the north
    /// celestial pole, X through the local meridian and Y towards the east.
    pub fn xyzs(&self) -> Vec<XyzGeodetic> {
        let latitude_rad = self.latitude_deg.to_radians();
        self.antennas
            .iter()
            .map(|&[e, n, h]| enh_to_xyz(e, n, h, latitude_rad))
            .collect()
    }
}

/// Convert local topocentric east, north, height coordinates into geodetic
/// XYZ for an array at `latitude_rad`.
///
/// Taken from the third edition of Interferometry and Synthesis in Radio
/// Astronomy, chapter 4: Geometrical Relationships, Polarimetry, and the
/// Measurement Equation.
pub fn enh_to_xyz(e: f64, n: f64, h: f64, latitude_rad: f64) -> XyzGeodetic {
    let (s_lat, c_lat) = latitude_rad.sin_cos();
    XyzGeodetic {
        x: -n * s_lat + h * c_lat,
        y: e,
        z: n * c_lat + h * s_lat,
    }
}

/// `num` hour angles evenly spaced from `start_rad` to `end_rad` (inclusive).
pub fn hour_angles(start_rad: f64, end_rad: f64, num: usize) -> Vec<f64> {
    match num {
        0 => vec![],
        1 => vec![start_rad],
        _ => {
            let step = (end_rad - start_rad) / (num - 1) as f64;
            (0..num).map(|i| start_rad + step * i as f64).collect()
        }
    }
}

/// The (u,v,w) of every baseline of `layout` \[wavelengths\], at each hour
/// angle, for a phase centre at declination `dec_rad`. Baselines are grouped
/// by hour angle.
pub fn baselines(
    layout: &ArrayLayout,
    hour_angles: &[f64],
    dec_rad: f64,
    wavelength_m: f64,
) -> Vec<UVW> {
    let xyzs = layout.xyzs();
    let uvws: Vec<UVW> = hour_angles
        .iter()
        .flat_map(|&ha| xyzs_to_cross_uvws(&xyzs, HADec::from_radians(ha, dec_rad)))
        .map(|uvw| uvw / wavelength_m)
        .collect();
    debug!(
        "Simulated {} baselines over {} hour angles",
        uvws.len(),
        hour_angles.len()
    );
    uvws
}

/// Visibilities of a unit point source at direction cosines `(l, m)`:
/// `exp(-2πi (ul + vm + w(n-1)))`.
pub fn simulate_point(uvws: &[UVW], l: f64, m: f64) -> Result<Vec<c64>, GeometryError> {
    // Validate l and m.
    n_from_lm(l, m)?;
    let n_minus_one = n_minus_one((l * l + m * m).min(1.0));
    Ok(uvws
        .par_iter()
        .map(|uvw| cexp(-TAU * (uvw.u * l + uvw.v * m + uvw.w * n_minus_one)))
        .collect())
}

/// A point source on the sky.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointSource {
    pub ra_deg: f64,
    pub dec_deg: f64,

    /// \[Jy\]
    pub flux: f64,
}

impl PointSource {
    pub fn radec(&self) -> RADec {
        RADec::from_degrees(self.ra_deg, self.dec_deg)
    }
}

/// The sum of the visibilities of each source, measured against
/// `phase_centre`.
pub fn simulate_sources(
    uvws: &[UVW],
    sources: &[PointSource],
    phase_centre: RADec,
) -> Result<Vec<c64>, GeometryError> {
    let mut vis = vec![c64::new(0.0, 0.0); uvws.len()];
    for source in sources {
        let lmn = skycoord_to_lmn(source.radec(), phase_centre)?;
        let source_vis = simulate_point(uvws, lmn.l, lmn.m)?;
        vis.par_iter_mut()
            .zip(source_vis.par_iter())
            .for_each(|(v, s)| *v += s * source.flux);
    }
    Ok(vis)
}
