// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
w-projection synthesis imaging for radio interferometers.

Visibilities are rotated to an imaging phase centre ([`coord`], [`vis`]),
convolved onto a uniform grid with w-dependent kernels that are generated on
demand and memoised ([`kernel`]), and Fourier transformed into an image and a
matching point-spread function ([`imaging`]).
 */

mod cli;
pub mod constants;
pub mod coord;
pub mod imaging;
pub mod io;
pub mod kernel;
pub(crate) mod math;
pub mod simulate;
pub mod vis;

// Re-exports.
pub use cli::{Wimager, WimagerError};
pub use coord::{
    lm_to_skycoord, rotate_uvw, skycoord_to_lmn, uvw_transform, GeometryError, Rotation3,
    Transform2,
};
pub use imaging::{BoundsPolicy, Component, Imager, ImagingConfig, ImagingError, ImagingResult};
pub use kernel::{Kernel, KernelCache, KernelError, KernelParams};
pub use vis::{
    reproject_visibilities, rotate_visibilities, shift_visibilities, Reprojected, VisError,
};

// External re-exports.
pub use marlu::{c64, RADec, LMN, UVW};

use crossbeam_utils::atomic::AtomicCell;

/// Should progress bars be drawn? The binary turns these on unless the user
/// asks otherwise; library users get no progress bars by default.
pub static PROGRESS_BARS: AtomicCell<bool> = AtomicCell::new(false);
