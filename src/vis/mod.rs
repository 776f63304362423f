// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Code to move visibilities between phase centres and shift them in the
//! image plane.
//!
//! Visibilities follow the convention `V = exp(-2πi (ul + vm + w(n-1)))` for a
//! unit point source at `(l,m,n)`.

#[cfg(test)]
mod tests;

use log::debug;
use marlu::{c64, RADec, LMN, UVW};
use rayon::prelude::*;
use thiserror::Error;

use crate::{
    constants::TAU,
    coord::{rotate_uvw, skycoord_to_lmn, GeometryError, Rotation3, Transform2},
    math::cexp,
};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum VisError {
    #[error("Got {num_uvws} baseline coordinates but {num_vis} visibilities; these must be the same length")]
    LengthMismatch { num_uvws: usize, num_vis: usize },

    #[error(transparent)]
    Geometry(#[from] GeometryError),
}

/// Visibilities whose coordinates were rotated to a new phase centre, but that
/// should be imaged in the tangent plane of their old one.
#[derive(Debug, Clone)]
pub struct Reprojected {
    pub uvws: Vec<UVW>,

    /// Re-phased to the new phase centre, then shifted so that the old phase
    /// centre is at the middle of the image.
    pub vis: Vec<c64>,

    /// The old phase centre relative to the new one.
    pub offset: LMN,

    /// Takes the new (shifted) (l,m) plane onto the old one. This is the
    /// transform to image with.
    pub transform: Transform2,
}

fn check_lengths(uvws: &[UVW], vis: &[c64]) -> Result<(), VisError> {
    if uvws.len() != vis.len() {
        return Err(VisError::LengthMismatch {
            num_uvws: uvws.len(),
            num_vis: vis.len(),
        });
    }
    Ok(())
}

/// Re-phase visibilities measured against `from` so that they're measured
/// against `to`. The coordinates are rotated with [`rotate_uvw`], and each
/// visibility is multiplied by `exp(+2πi (w_new - w_old))`, i.e. the change in
/// geometric delay.
///
/// The inputs are not modified. The rotation matrix is also returned, so the
/// caller can derive the residual image-plane skew.
pub fn rotate_visibilities(
    uvws: &[UVW],
    vis: &[c64],
    from: RADec,
    to: RADec,
) -> Result<(Vec<UVW>, Vec<c64>, Rotation3), VisError> {
    check_lengths(uvws, vis)?;

    let (new_uvws, rotation) = rotate_uvw(uvws, from, to);
    if rotation.is_identity() {
        return Ok((new_uvws, vis.to_vec(), rotation));
    }

    let new_vis = uvws
        .par_iter()
        .zip(new_uvws.par_iter())
        .zip(vis.par_iter())
        .map(|((old, new), &v)| v * cexp(TAU * (new.w - old.w)))
        .collect();
    Ok((new_uvws, new_vis, rotation))
}

/// Multiply each visibility by `exp(-2πi (u dl + v dm))`. This moves emission
/// at `(l,m)` in the image to `(l + dl, m + dm)` without regridding.
pub fn shift_visibilities(
    uvws: &[UVW],
    vis: &[c64],
    dl: f64,
    dm: f64,
) -> Result<Vec<c64>, VisError> {
    check_lengths(uvws, vis)?;

    if dl == 0.0 && dm == 0.0 {
        return Ok(vis.to_vec());
    }

    Ok(uvws
        .par_iter()
        .zip(vis.par_iter())
        .map(|(uvw, &v)| v * cexp(-TAU * (uvw.u * dl + uvw.v * dm)))
        .collect())
}

/// Rotate visibilities measured against `from` to `to` (e.g. to make the w
/// terms smaller), but set things up to image in the (l,m) plane of `from`.
///
/// The visibilities are shifted by the negated offset of `from` relative to
/// `to`, and the returned transform is the inverse of the rotation's (l,m)
/// skew; to first order it maps the shifted (l,m) plane of `to` onto that of
/// `from`. Kernels made with this transform put emission at the pixels it
/// would have had without any rotation.
pub fn reproject_visibilities(
    uvws: &[UVW],
    vis: &[c64],
    from: RADec,
    to: RADec,
) -> Result<Reprojected, VisError> {
    let (new_uvws, new_vis, rotation) = rotate_visibilities(uvws, vis, from, to)?;
    if rotation.is_identity() {
        return Ok(Reprojected {
            uvws: new_uvws,
            vis: new_vis,
            offset: LMN {
                l: 0.0,
                m: 0.0,
                n: 1.0,
            },
            transform: Transform2::identity(),
        });
    }

    let offset = skycoord_to_lmn(from, to)?;
    let transform = rotation.lm_skew().inverse()?;
    debug!(
        "Reprojecting: old phase centre at (l, m) = ({}, {}), transform {:?}",
        offset.l, offset.m, transform.0
    );
    let new_vis = shift_visibilities(&new_uvws, &new_vis, -offset.l, -offset.m)?;
    Ok(Reprojected {
        uvws: new_uvws,
        vis: new_vis,
        offset,
        transform,
    })
}
