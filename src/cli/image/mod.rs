// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Make an image (and PSF) from visibilities with w-projection.


use std::path::{Path, PathBuf};

use clap::Parser;
use log::{debug, info, trace};
use marlu::{c64, RADec, UVW};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::common::{
    check_output_file, display_warnings, parse_radec, InfoPrinter, Warn, ARG_FILE_HELP,
};
use crate::{
    constants::*,
    coord::Transform2,
    imaging::{BoundsPolicy, Imager, ImagingConfig, ImagingResult, BOUNDS_POLICIES},
    io::{write_fits_images, VisibilityFile},
    vis::{reproject_visibilities, rotate_visibilities, shift_visibilities},
    WimagerError,
};

const DEFAULT_OUTPUT_IMAGE_FILENAME: &str = "wimager.fits";

lazy_static::lazy_static! {
    static ref THETA_HELP: String =
        format!("The field of view [direction cosines]. Default: {DEFAULT_THETA}");

    static ref LAM_HELP: String =
        format!("The uv extent of the grid [wavelengths]. The image is theta * lam pixels on a side. Default: {DEFAULT_LAM}");

    static ref QPX_HELP: String =
        format!("The number of sub-cell kernel positions per grid cell along each axis. Default: {DEFAULT_QPX}");

    static ref AA_SUPPORT_HELP: String =
        format!("The width of the anti-aliasing part of the kernel [grid cells]. Default: {DEFAULT_AA_SUPPORT}");

    static ref KERNEL_ACCURACY_HELP: String =
        format!("Scales the w-dependent part of the derived kernel width. Default: {DEFAULT_KERNEL_ACCURACY}");

    static ref BOUNDS_POLICY_HELP: String =
        format!("What to do with visibilities whose kernels don't fit on the grid. Supported: {}. Default: {}", *BOUNDS_POLICIES, crate::imaging::DEFAULT_BOUNDS_POLICY);

    static ref OUTPUT_HELP: String =
        format!("Path to the output FITS image. Default: {DEFAULT_OUTPUT_IMAGE_FILENAME}");
}

#[derive(Parser, Debug, Clone, Default, Serialize, Deserialize)]
pub(super) struct ImageCliArgs {
    /// Path to the input visibility file (JSON).
    #[clap(short, long, parse(from_str), help_heading = "INPUT FILES")]
    pub(super) data: Option<PathBuf>,

    /// The right ascension of the image centre [degrees]. If this and --dec
    /// aren't given, the visibilities' phase centre is used.
    #[clap(short, long, help_heading = "IMAGE")]
    pub(super) ra: Option<f64>,

    /// The declination of the image centre [degrees].
    #[clap(long, help_heading = "IMAGE", allow_hyphen_values = true)]
    pub(super) dec: Option<f64>,

    /// Move emission in the image by these amounts [direction cosines], by
    /// re-phasing the visibilities.
    #[clap(
        long, help_heading = "IMAGE",
        number_of_values = 2,
        allow_hyphen_values = true,
        value_names = &["DL", "DM"]
    )]
    pub(super) shift: Option<Vec<f64>>,

    #[clap(long, help = THETA_HELP.as_str(), help_heading = "IMAGE")]
    pub(super) theta: Option<f64>,

    #[clap(long, help = LAM_HELP.as_str(), help_heading = "IMAGE")]
    pub(super) lam: Option<f64>,

    /// Skew the (l,m) plane that kernels are made for, as a row-major 2x2
    /// matrix. Default: the identity.
    #[clap(
        long, help_heading = "IMAGE",
        number_of_values = 4,
        allow_hyphen_values = true,
        value_names = &["A", "B", "C", "D"]
    )]
    pub(super) transform: Option<Vec<f64>>,

    /// Rotate the visibilities to the image centre (--ra/--dec) to shrink their
    /// w terms, but make the image in the tangent plane of their phase centre.
    /// Can't be used with --transform.
    #[clap(long, help_heading = "IMAGE")]
    #[serde(default)]
    pub(super) reproject: bool,

    /// Don't make a point-spread function.
    #[clap(long, help_heading = "IMAGE")]
    #[serde(default)]
    pub(super) no_psf: bool,

    #[clap(long, help = QPX_HELP.as_str(), help_heading = "KERNELS")]
    pub(super) qpx: Option<usize>,

    /// The width of the kernels [grid cells]. Must be odd. Derived from the
    /// largest |w| if not given.
    #[clap(long, help_heading = "KERNELS")]
    pub(super) npix_kern: Option<usize>,

    #[clap(long, help = AA_SUPPORT_HELP.as_str(), help_heading = "KERNELS")]
    pub(super) aa_support: Option<usize>,

    #[clap(long, help = KERNEL_ACCURACY_HELP.as_str(), help_heading = "KERNELS")]
    pub(super) kernel_accuracy: Option<f64>,

    /// The width of the w bins that share a kernel [wavelengths]. Default:
    /// 1 / (theta * qpx)
    #[clap(long, help_heading = "KERNELS")]
    pub(super) w_step: Option<f64>,

    /// The maximum number of kernels to keep. Default: enough for every w bin.
    #[clap(long, help_heading = "KERNELS")]
    pub(super) cache_capacity: Option<usize>,

    #[clap(long, help = BOUNDS_POLICY_HELP.as_str(), help_heading = "GRIDDING")]
    pub(super) bounds_policy: Option<String>,

    #[clap(short, long, help = OUTPUT_HELP.as_str(), help_heading = "OUTPUT FILES")]
    pub(super) output: Option<PathBuf>,

    /// Also plot the image (and PSF) to PNG files next to the FITS file. Only
    /// available if compiled with the "plotting" feature.
    #[clap(long, help_heading = "OUTPUT FILES")]
    #[serde(default)]
    pub(super) plot: bool,
}

#[derive(Parser, Debug, Clone, Default, Serialize, Deserialize)]
pub(super) struct ImageArgs {
    #[clap(name = "ARGUMENTS_FILE", help = ARG_FILE_HELP.as_str(), parse(from_os_str))]
    pub(super) args_file: Option<PathBuf>,

    #[clap(flatten)]
    #[serde(rename = "image")]
    #[serde(default)]
    pub(super) image_args: ImageCliArgs,
}

/// Everything needed to make an image, derived from [`ImageArgs`].
#[derive(Debug)]
struct ImageParams {
    uvws: Vec<UVW>,
    vis: Vec<c64>,
    vis_phase_centre: RADec,
    image_centre: RADec,
    shift: Option<(f64, f64)>,
    reproject: bool,
    config: ImagingConfig,
    output: PathBuf,
    plot: bool,
}

impl ImageArgs {
    /// Both command-line and file arguments overlap in terms of what is
    /// available; this function consolidates everything that was specified into
    /// a single struct. Where applicable, it will prefer CLI parameters over
    /// those in the file.
    ///
    /// This function should only ever merge arguments, and not try to make
    /// sense of them.
    pub(super) fn merge(self) -> Result<ImageArgs, WimagerError> {
        debug!("Merging command-line arguments with the argument file");

        let cli_args = self;

        if let Some(arg_file) = cli_args.args_file {
            // Read in the file arguments. Ensure all of the file args are
            // accounted for by pattern matching.
            let ImageArgs {
                args_file: _,
                image_args,
            } = unpack_arg_file!(arg_file);

            // Merge all the arguments, preferring the CLI args when available.
            Ok(ImageArgs {
                args_file: None,
                image_args: cli_args.image_args.merge(image_args),
            })
        } else {
            Ok(cli_args)
        }
    }

    fn parse(self) -> Result<ImageParams, WimagerError> {
        debug!("{:#?}", self);

        // Expose all the struct fields to ensure they're all used.
        let ImageArgs {
            args_file: _,
            image_args:
                ImageCliArgs {
                    data,
                    ra,
                    dec,
                    shift,
                    theta,
                    lam,
                    transform,
                    reproject,
                    no_psf,
                    qpx,
                    npix_kern,
                    aa_support,
                    kernel_accuracy,
                    w_step,
                    cache_capacity,
                    bounds_policy,
                    output,
                    plot,
                },
        } = self;

        let data = data.ok_or(ImageArgsError::NoData)?;
        if !data.exists() {
            return Err(ImageArgsError::DataDoesntExist(data.into_boxed_path()).into());
        }
        let vis_file = VisibilityFile::read(&data)?;
        if vis_file.is_empty() {
            return Err(ImageArgsError::NoVisibilities(data.into_boxed_path()).into());
        }
        let vis_phase_centre = vis_file.phase_centre();
        let uvws = vis_file.uvws();
        let vis = vis_file.vis();

        let mut input_printer = InfoPrinter::new("Input visibilities".into());
        input_printer.push_block(vec![
            format!("{}", data.display()).into(),
            format!("{} visibilities", vis.len()).into(),
            format!(
                "Phase centre: ({:.4}°, {:.4}°)",
                vis_phase_centre.ra.to_degrees(),
                vis_phase_centre.dec.to_degrees()
            )
            .into(),
        ]);

        let mut image_printer = InfoPrinter::new("Image".into());
        let image_centre = parse_radec(ra, dec)?.unwrap_or(vis_phase_centre);
        image_printer.push_line(
            format!(
                "Centre: ({:.4}°, {:.4}°)",
                image_centre.ra.to_degrees(),
                image_centre.dec.to_degrees()
            )
            .into(),
        );
        let shift = match shift.as_deref() {
            None => None,
            Some([dl, dm]) if dl.is_finite() && dm.is_finite() => {
                image_printer.push_line(format!("Shifted by (dl, dm) = ({dl}, {dm})").into());
                Some((*dl, *dm))
            }
            Some(other) => return Err(ImageArgsError::BadShift(other.to_vec()).into()),
        };

        let transform = match transform.as_deref() {
            None => Transform2::identity(),
            Some(&[a, b, c, d]) => {
                let t = Transform2([[a, b], [c, d]]);
                // Singular transforms are caught here rather than after
                // reading kernels.
                t.inverse()?;
                t
            }
            Some(other) => return Err(ImageArgsError::InvalidTransform(other.to_vec()).into()),
        };
        if reproject {
            if !transform.is_identity() {
                return Err(ImageArgsError::ReprojectWithTransform.into());
            }
            if image_centre.ra == vis_phase_centre.ra && image_centre.dec == vis_phase_centre.dec {
                "--reproject was given, but the image centre is the visibilities' phase centre"
                    .warn();
            }
            image_printer.push_line(
                format!(
                    "Reprojected to the tangent plane of ({:.4}°, {:.4}°)",
                    vis_phase_centre.ra.to_degrees(),
                    vis_phase_centre.dec.to_degrees()
                )
                .into(),
            );
        }

        let bounds_policy = match bounds_policy {
            Some(s) => BoundsPolicy::parse(&s).map_err(|_| ImageArgsError::BadBoundsPolicy(s))?,
            None => BoundsPolicy::default(),
        };

        let default = ImagingConfig::default();
        let config = ImagingConfig {
            theta: theta.unwrap_or(default.theta),
            lam: lam.unwrap_or(default.lam),
            qpx: qpx.unwrap_or(default.qpx),
            npix_kern,
            aa_support: aa_support.unwrap_or(default.aa_support),
            kernel_accuracy: kernel_accuracy.unwrap_or(default.kernel_accuracy),
            w_step,
            cache_capacity,
            bounds_policy,
            transform,
            make_psf: !no_psf,
        };
        let grid_size = config.grid_size()?;
        image_printer.push_block(vec![
            format!(
                "Field of view: {} (direction cosines), {grid_size}x{grid_size} pixels",
                config.theta
            )
            .into(),
            format!(
                "Pixel size: {:.3}″, uv cell: {} wavelengths",
                (config.theta / grid_size as f64).asin().to_degrees() * 3600.0,
                1.0 / config.theta
            )
            .into(),
        ]);
        if !transform.is_identity() {
            image_printer.push_line(format!("(l,m) transform: {:?}", transform.0).into());
        }
        image_printer.push_line(format!("Out-of-grid visibilities: {bounds_policy}").into());

        #[cfg(not(feature = "plotting"))]
        {
            if plot {
                return Err(ImageArgsError::NoPlottingFeature.into());
            }
        }

        let output = output.unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_IMAGE_FILENAME));
        check_output_file(&output, "fits")?;
        let mut output_printer = InfoPrinter::new("Output files".into());
        output_printer.push_line(format!("{}", output.display()).into());
        if plot {
            output_printer.push_line(format!("{}", image_plot_path(&output).display()).into());
            if config.make_psf {
                output_printer.push_line(format!("{}", psf_plot_path(&output).display()).into());
            }
        }

        input_printer.display();
        image_printer.display();
        output_printer.display();
        display_warnings();

        Ok(ImageParams {
            uvws,
            vis,
            vis_phase_centre,
            image_centre,
            shift,
            reproject,
            config,
            output,
            plot,
        })
    }

    pub(super) fn run(self, dry_run: bool) -> Result<(), WimagerError> {
        debug!("Converting arguments into parameters");
        trace!("{:#?}", self);
        let params = self.parse()?;

        if dry_run {
            info!("Dry run -- exiting now.");
            return Ok(());
        }

        params.run()?;
        Ok(())
    }
}

impl ImageParams {
    fn run(self) -> Result<ImagingResult, WimagerError> {
        let ImageParams {
            mut uvws,
            mut vis,
            vis_phase_centre,
            image_centre,
            shift,
            reproject,
            mut config,
            output,
            plot,
        } = self;

        // The direction the image is tangent to.
        let tangent = if reproject {
            let reprojected =
                reproject_visibilities(&uvws, &vis, vis_phase_centre, image_centre)?;
            info!("Rotated visibilities to the image centre, imaging in their original plane");
            config.transform = reprojected.transform;
            uvws = reprojected.uvws;
            vis = reprojected.vis;
            vis_phase_centre
        } else {
            let (new_uvws, new_vis, rotation) =
                rotate_visibilities(&uvws, &vis, vis_phase_centre, image_centre)?;
            if !rotation.is_identity() {
                info!("Rotated visibilities to the image centre");
                debug!("Residual (l,m) skew: {:?}", rotation.lm_skew().0);
                uvws = new_uvws;
                vis = new_vis;
            }
            image_centre
        };
        if let Some((dl, dm)) = shift {
            vis = shift_visibilities(&uvws, &vis, dl, dm)?;
        }

        let imager = Imager::for_visibilities(config, &uvws)?;
        let params = imager.kernel_params();
        let mut kernel_printer = InfoPrinter::new("Kernels".into());
        kernel_printer.push_block(vec![
            format!(
                "{0}x{0} cells, {1}x oversampled",
                params.npix_kern, params.qpx
            )
            .into(),
            format!(
                "w step: {} wavelengths, cache capacity: {}",
                imager.cache().w_step(),
                imager.cache().capacity()
            )
            .into(),
        ]);
        kernel_printer.display();

        let result = imager.invert(&uvws, &vis)?;
        if result.num_dropped > 0 {
            format!(
                "{} visibilities didn't fit on the grid and were dropped",
                result.num_dropped
            )
            .warn();
        }
        if result.num_clipped > 0 {
            format!(
                "{} visibilities were only partly gridded",
                result.num_clipped
            )
            .warn();
        }
        display_warnings();

        let mut result_printer = InfoPrinter::new("Result".into());
        result_printer.push_line(
            format!(
                "Gridded {} visibilities (sum of weights {})",
                result.num_gridded, result.sum_weights
            )
            .into(),
        );
        result_printer.push_line(format!("Generated {} kernels", result.kernels_computed).into());
        if let Some(peak) = result.find_component() {
            result_printer.push_line(
                format!(
                    "Peak {:.6} at pixel ({}, {}), (l, m) = ({:.6}, {:.6})",
                    peak.flux, peak.col, peak.row, peak.l, peak.m
                )
                .into(),
            );
            match peak.direction(tangent) {
                Ok(d) => result_printer.push_line(
                    format!(
                        "Peak direction: ({:.4}°, {:.4}°)",
                        d.ra.to_degrees(),
                        d.dec.to_degrees()
                    )
                    .into(),
                ),
                Err(e) => debug!("Couldn't get the peak's direction: {e}"),
            }
        }
        result_printer.display();

        write_fits_images(&output, &result, Some(tangent))?;
        info!("Wrote image to {}", output.display());

        if plot {
            #[cfg(feature = "plotting")]
            {
                let file = image_plot_path(&output);
                crate::io::plot_image(result.image.view(), &file)?;
                info!("Plotted image to {}", file.display());
                if let Some(psf) = result.psf.as_ref() {
                    let file = psf_plot_path(&output);
                    crate::io::plot_image(psf.view(), &file)?;
                    info!("Plotted PSF to {}", file.display());
                }
            }
        }

        Ok(result)
    }
}

fn image_plot_path(output: &Path) -> PathBuf {
    output.with_extension("png")
}

fn psf_plot_path(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    output.with_file_name(format!("{stem}_psf.png"))
}

#[derive(Error, Debug)]
pub(super) enum ImageArgsError {
    #[error("No visibility file was supplied")]
    NoData,

    #[error("Visibility file '{0}' doesn't exist")]
    DataDoesntExist(Box<Path>),

    #[error("Visibility file '{0}' has no visibilities")]
    NoVisibilities(Box<Path>),

    #[error("Shift specified as {0:?}, not [<dl>, <dm>]")]
    BadShift(Vec<f64>),

    #[error("Transform specified as {0:?}, not [<a>, <b>, <c>, <d>]")]
    InvalidTransform(Vec<f64>),

    #[error("--reproject sets the (l,m) transform itself, so it can't be used with --transform")]
    ReprojectWithTransform,

    #[error("Bounds policy '{0}' isn't one of: {list}", list = *BOUNDS_POLICIES)]
    BadBoundsPolicy(String),

    #[cfg(not(feature = "plotting"))]
    #[error("Plots were requested, but wimager was compiled without the \"plotting\" feature")]
    NoPlottingFeature,
}

impl ImageCliArgs {
    fn merge(self, other: Self) -> Self {
        Self {
            data: self.data.or(other.data),
            ra: self.ra.or(other.ra),
            dec: self.dec.or(other.dec),
            shift: self.shift.or(other.shift),
            theta: self.theta.or(other.theta),
            lam: self.lam.or(other.lam),
            transform: self.transform.or(other.transform),
            reproject: self.reproject || other.reproject,
            no_psf: self.no_psf || other.no_psf,
            qpx: self.qpx.or(other.qpx),
            npix_kern: self.npix_kern.or(other.npix_kern),
            aa_support: self.aa_support.or(other.aa_support),
            kernel_accuracy: self.kernel_accuracy.or(other.kernel_accuracy),
            w_step: self.w_step.or(other.w_step),
            cache_capacity: self.cache_capacity.or(other.cache_capacity),
            bounds_policy: self.bounds_policy.or(other.bounds_policy),
            output: self.output.or(other.output),
            plot: self.plot || other.plot,
        }
    }
}
