// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Render images as greyscale PNGs.

use std::path::Path;

use log::debug;
use ndarray::prelude::*;
use plotters::prelude::*;
use thiserror::Error;

/// Small images are scaled up so that they're at least this many pixels
/// across.
const MIN_PIXELS: usize = 512;

#[derive(Error, Debug)]
pub enum DrawError {
    #[error("Can't plot an empty image")]
    Empty,

    #[error("Error from the plotters library: {0}")]
    Plotters(Box<dyn std::error::Error>),
}

/// Draw `image` (indexed `[m, l]`) to a PNG. The brightest pixel is white and
/// the faintest is black; m increases upwards.
pub fn plot_image<P: AsRef<Path>>(image: ArrayView2<f64>, file: P) -> Result<(), DrawError> {
    let (rows, cols) = image.dim();
    if rows == 0 || cols == 0 {
        return Err(DrawError::Empty);
    }
    let scale = (MIN_PIXELS / rows.max(cols)).max(1);
    let (min, max) = image
        .iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), &v| {
            (min.min(v), max.max(v))
        });
    let range = if max > min { max - min } else { 1.0 };

    let path = file.as_ref();
    debug!("Plotting a {rows}x{cols} image to {}", path.display());
    let root_area =
        BitMapBackend::new(path, ((cols * scale) as u32, (rows * scale) as u32)).into_drawing_area();
    root_area
        .fill(&BLACK)
        .map_err(|e| DrawError::Plotters(Box::new(e)))?;

    for ((row, col), &v) in image.indexed_iter() {
        if !v.is_finite() {
            continue;
        }
        let grey = (((v - min) / range) * 255.0).round().clamp(0.0, 255.0) as u8;
        let colour = RGBColor(grey, grey, grey);
        let x0 = (col * scale) as i32;
        let y0 = ((rows - 1 - row) * scale) as i32;
        for dy in 0..scale as i32 {
            for dx in 0..scale as i32 {
                root_area
                    .draw_pixel((x0 + dx, y0 + dy), &colour)
                    .map_err(|e| DrawError::Plotters(Box::new(e)))?;
            }
        }
    }

    root_area
        .present()
        .map_err(|e| DrawError::Plotters(Box::new(e)))?;
    Ok(())
}
