// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Finding point-source components in images, and reading fluxes at given
//! directions.

use log::debug;
use marlu::RADec;

use super::{lm_to_pixel, pixel_to_lm, ImagingResult};
use crate::coord::{lm_to_skycoord, skycoord_to_lmn, GeometryError};

/// A point source found in an image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Component {
    /// Pixel row (the m axis).
    pub row: usize,
    /// Pixel column (the l axis).
    pub col: usize,
    pub l: f64,
    pub m: f64,
    /// The image value at the component's pixel.
    pub flux: f64,
}

impl Component {
    /// The sky direction of the component, given the direction the image is
    /// tangent to.
    pub fn direction(&self, image_centre: RADec) -> Result<RADec, GeometryError> {
        lm_to_skycoord(self.l, self.m, image_centre)
    }
}

impl ImagingResult {
    /// The number of pixels on a side of the image.
    pub fn grid_size(&self) -> usize {
        self.image.nrows()
    }

    /// The direction cosine of an image pixel index (along either axis).
    pub fn pixel_to_lm(&self, index: usize) -> f64 {
        pixel_to_lm(index, self.grid_size(), self.theta)
    }

    /// The (fractional) image pixel index of a direction cosine.
    pub fn lm_to_pixel(&self, lm: f64) -> f64 {
        lm_to_pixel(lm, self.grid_size(), self.theta)
    }

    /// Find the brightest component in the image, i.e. the pixel with the
    /// largest absolute value. `None` if the image has no finite pixels.
    pub fn find_component(&self) -> Option<Component> {
        let ((row, col), &flux) = self
            .image
            .indexed_iter()
            .filter(|(_, v)| v.is_finite())
            .max_by(|(_, a), (_, b)| a.abs().total_cmp(&b.abs()))?;
        let component = Component {
            row,
            col,
            l: self.pixel_to_lm(col),
            m: self.pixel_to_lm(row),
            flux,
        };
        debug!("Found peak {flux} at pixel ({col}, {row})");
        Some(component)
    }

    /// The image value at the pixel nearest to `(l, m)`. `None` if that
    /// isn't on the image.
    pub fn flux_at_lm(&self, l: f64, m: f64) -> Option<f64> {
        let n = self.grid_size() as f64;
        let col = self.lm_to_pixel(l).round();
        let row = self.lm_to_pixel(m).round();
        if !(0.0..n).contains(&col) || !(0.0..n).contains(&row) {
            return None;
        }
        self.image.get((row as usize, col as usize)).copied()
    }

    /// The image value at the pixel nearest to `direction`, given the
    /// direction the image is tangent to. `Ok(None)` if the direction isn't
    /// on the image.
    pub fn flux_at_direction(
        &self,
        direction: RADec,
        image_centre: RADec,
    ) -> Result<Option<f64>, GeometryError> {
        let lmn = skycoord_to_lmn(direction, image_centre)?;
        Ok(self.flux_at_lm(lmn.l, lmn.m))
    }
}
