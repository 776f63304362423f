// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Coordinate transformations between phase centres.
//!
//! A phase centre defines a right-handed frame on the sky: `l` increases
//! towards the east (increasing RA), `m` towards the north celestial pole and
//! `n` points at the phase centre. Baseline coordinates (u,v,w) are measured
//! along the same axes, so the same rotation converts both (u,v,w) and (l,m,n)
//! between phase centres.
//!
//! This is discussed at length in Interferometry and Synthesis in Radio
//! Astronomy, Third Edition, Section 4: Geometrical Relationships,
//! Polarimetry, and the Measurement Equation.


use marlu::{RADec, LMN, UVW};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{LMN_TOLERANCE, SINGULAR_DETERMINANT, TAU};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    #[error("Direction cosines (l = {l}, m = {m}) lie beyond the horizon (l² + m² = {})", .l * .l + .m * .m)]
    BeyondHorizon { l: f64, m: f64 },

    #[error("Direction is on the far side of the reference direction (n = {n})")]
    BehindReference { n: f64 },

    #[error("The 2x2 transform {t:?} is singular (determinant {det})")]
    SingularTransform { t: [[f64; 2]; 2], det: f64 },
}

/// A 3x3 rotation matrix operating on (u,v,w) or (l,m,n) column vectors.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rotation3(pub [[f64; 3]; 3]);

impl Rotation3 {
    pub const fn identity() -> Rotation3 {
        Rotation3([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]])
    }

    /// The matrix whose rows are the `l`, `m` and `n` unit vectors of the
    /// supplied phase centre, expressed in equatorial Cartesian coordinates (x
    /// towards RA = 0, Dec = 0; z towards the north celestial pole). Multiplying
    /// an equatorial baseline vector by this matrix gives its (u,v,w).
    pub fn frame(phase_centre: RADec) -> Rotation3 {
        let (s_ra, c_ra) = phase_centre.ra.sin_cos();
        let (s_dec, c_dec) = phase_centre.dec.sin_cos();
        Rotation3([
            [-s_ra, c_ra, 0.0],
            [-s_dec * c_ra, -s_dec * s_ra, c_dec],
            [c_dec * c_ra, c_dec * s_ra, s_dec],
        ])
    }

    /// The rotation taking coordinates measured against `from` into
    /// coordinates measured against `to`.
    pub fn between(from: RADec, to: RADec) -> Rotation3 {
        if from.ra == to.ra && from.dec == to.dec {
            return Rotation3::identity();
        }
        Rotation3::frame(to).mul(&Rotation3::frame(from).transpose())
    }

    pub fn transpose(&self) -> Rotation3 {
        let m = &self.0;
        Rotation3([
            [m[0][0], m[1][0], m[2][0]],
            [m[0][1], m[1][1], m[2][1]],
            [m[0][2], m[1][2], m[2][2]],
        ])
    }

    pub fn mul(&self, rhs: &Rotation3) -> Rotation3 {
        let mut out = [[0.0; 3]; 3];
        for (i, row) in out.iter_mut().enumerate() {
            for (j, elem) in row.iter_mut().enumerate() {
                *elem = (0..3).map(|k| self.0[i][k] * rhs.0[k][j]).sum();
            }
        }
        Rotation3(out)
    }

    /// Rotate a single vector.
    #[inline]
    pub fn apply(&self, x: [f64; 3]) -> [f64; 3] {
        let m = &self.0;
        [
            m[0][0] * x[0] + m[0][1] * x[1] + m[0][2] * x[2],
            m[1][0] * x[0] + m[1][1] * x[1] + m[1][2] * x[2],
            m[2][0] * x[0] + m[2][1] * x[1] + m[2][2] * x[2],
        ]
    }

    #[inline]
    pub fn apply_uvw(&self, uvw: UVW) -> UVW {
        let [u, v, w] = self.apply([uvw.u, uvw.v, uvw.w]);
        UVW { u, v, w }
    }

    /// The image-plane (l,m) part of this rotation, i.e. how the old (l,m)
    /// axes project onto the new (l,m) plane.
    pub fn lm_skew(&self) -> Transform2 {
        let m = &self.0;
        Transform2([[m[0][0], m[0][1]], [m[1][0], m[1][1]]])
    }

    pub fn is_identity(&self) -> bool {
        *self == Rotation3::identity()
    }
}

/// A 2x2 linear transform of (u,v) or (l,m) coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transform2(pub [[f64; 2]; 2]);

impl Default for Transform2 {
    fn default() -> Self {
        Transform2::identity()
    }
}

impl Transform2 {
    pub const fn identity() -> Transform2 {
        Transform2([[1.0, 0.0], [0.0, 1.0]])
    }

    pub fn determinant(&self) -> f64 {
        self.0[0][0] * self.0[1][1] - self.0[0][1] * self.0[1][0]
    }

    pub fn inverse(&self) -> Result<Transform2, GeometryError> {
        let det = self.determinant();
        if !det.is_finite() || det.abs() < SINGULAR_DETERMINANT {
            return Err(GeometryError::SingularTransform { t: self.0, det });
        }
        let [[a, b], [c, d]] = self.0;
        Ok(Transform2([[d / det, -b / det], [-c / det, a / det]]))
    }

    pub fn transpose(&self) -> Transform2 {
        let [[a, b], [c, d]] = self.0;
        Transform2([[a, c], [b, d]])
    }

    #[inline]
    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.0[0][0] * x + self.0[0][1] * y,
            self.0[1][0] * x + self.0[1][1] * y,
        )
    }

    pub fn is_identity(&self) -> bool {
        *self == Transform2::identity()
    }
}

/// Rotate (u,v,w) coordinates measured against the phase centre `from` so that
/// they're measured against `to`. The rotation matrix is returned alongside the
/// new coordinates; its [`Rotation3::lm_skew`] describes the residual
/// image-plane distortion.
///
/// If `from` and `to` are the same direction, the rotation is exactly the
/// identity and the coordinates are returned untouched.
pub fn rotate_uvw(uvws: &[UVW], from: RADec, to: RADec) -> (Vec<UVW>, Rotation3) {
    let rotation = Rotation3::between(from, to);
    if rotation.is_identity() {
        return (uvws.to_vec(), rotation);
    }
    let rotated = uvws.par_iter().map(|&uvw| rotation.apply_uvw(uvw)).collect();
    (rotated, rotation)
}

/// Get the direction cosines of `centre` relative to `reference`.
///
/// `n` is derived from `l` and `m` as `sqrt(1 - l² - m²)`. Small
/// floating-point overshoot beyond the horizon is clamped to `n = 0`; anything
/// more is an error, as is a direction on the far side of `reference`.
pub fn skycoord_to_lmn(centre: RADec, reference: RADec) -> Result<LMN, GeometryError> {
    let (s_ra, c_ra) = centre.ra.sin_cos();
    let (s_dec, c_dec) = centre.dec.sin_cos();
    let [l, m, n_rot] = Rotation3::frame(reference).apply([c_dec * c_ra, c_dec * s_ra, s_dec]);
    if n_rot < -LMN_TOLERANCE {
        return Err(GeometryError::BehindReference { n: n_rot });
    }
    let n = n_from_lm(l, m)?;
    Ok(LMN { l, m, n })
}

/// Get the sky direction at direction cosines `(l, m)` relative to
/// `reference`. This undoes [`skycoord_to_lmn`]; `n` is taken to be on the
/// near side of `reference`.
pub fn lm_to_skycoord(l: f64, m: f64, reference: RADec) -> Result<RADec, GeometryError> {
    let n = n_from_lm(l, m)?;
    let [x, y, z] = Rotation3::frame(reference).transpose().apply([l, m, n]);
    Ok(RADec::from_radians(
        y.atan2(x).rem_euclid(TAU),
        z.clamp(-1.0, 1.0).asin(),
    ))
}

/// `sqrt(1 - l² - m²)`, with overshoot up to [`LMN_TOLERANCE`] clamped to 0.
pub(crate) fn n_from_lm(l: f64, m: f64) -> Result<f64, GeometryError> {
    let r2 = l * l + m * m;
    if !r2.is_finite() || r2 > 1.0 + LMN_TOLERANCE {
        return Err(GeometryError::BeyondHorizon { l, m });
    }
    Ok((1.0 - r2).max(0.0).sqrt())
}

/// Apply a 2x2 linear transform to the (u,v) part of each coordinate; w is
/// left alone.
pub fn uvw_transform(uvws: &[UVW], t: Transform2) -> Vec<UVW> {
    if t.is_identity() {
        return uvws.to_vec();
    }
    uvws.par_iter()
        .map(|&UVW { u, v, w }| {
            let (u, v) = t.apply(u, v);
            UVW { u, v, w }
        })
        .collect()
}
