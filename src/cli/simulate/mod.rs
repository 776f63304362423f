// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Simulate the visibilities of point sources observed by an array.


use std::path::{Path, PathBuf};

use clap::Parser;
use log::{debug, info, trace};
use marlu::RADec;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::common::{
    check_output_file, display_warnings, parse_radec, InfoPrinter, ARG_FILE_HELP,
};
use crate::{
    constants::{DEFAULT_WAVELENGTH_M, VLA_LAT_DEG},
    io::VisibilityFile,
    simulate::{baselines, hour_angles, simulate_sources, ArrayLayout, PointSource},
    WimagerError,
};

const DEFAULT_OUTPUT_VIS_FILENAME: &str = "wimager_vis.json";
const DEFAULT_NUM_PER_ARM: usize = 9;
const DEFAULT_SPACING_M: f64 = 40.0;
const DEFAULT_HA_HOURS: f64 = 2.0;
const DEFAULT_NUM_HOUR_ANGLES: usize = 16;
const DEFAULT_RA_DEG: f64 = 0.0;
const DEFAULT_DEC_DEG: f64 = 45.0;

lazy_static::lazy_static! {
    static ref NUM_PER_ARM_HELP: String =
        format!("The number of antennas on each arm of the generated Y-shaped array. Ignored if --layout is given. Default: {DEFAULT_NUM_PER_ARM}");

    static ref SPACING_HELP: String =
        format!("The spacing scale of the generated Y-shaped array [metres]. Ignored if --layout is given. Default: {DEFAULT_SPACING_M}");

    static ref LATITUDE_HELP: String =
        format!("The latitude of the generated Y-shaped array [degrees]. Ignored if --layout is given. Default: {VLA_LAT_DEG}");

    static ref HA_HELP: String =
        format!("The range of hour angles to observe over [hours]. Default: -{DEFAULT_HA_HOURS} to {DEFAULT_HA_HOURS}");

    static ref NUM_HOUR_ANGLES_HELP: String =
        format!("The number of hour angles (i.e. time steps). Default: {DEFAULT_NUM_HOUR_ANGLES}");

    static ref WAVELENGTH_HELP: String =
        format!("The observing wavelength [metres]. Default: {DEFAULT_WAVELENGTH_M}");

    static ref PHASE_CENTRE_HELP: String =
        format!("Default: ({DEFAULT_RA_DEG}°, {DEFAULT_DEC_DEG}°)");

    static ref OUTPUT_HELP: String =
        format!("Path to the output visibility file (JSON). Default: {DEFAULT_OUTPUT_VIS_FILENAME}");
}

#[derive(Parser, Debug, Clone, Default, Serialize, Deserialize)]
pub(super) struct SimulateCliArgs {
    /// Path to an array layout file (toml or json), with the keys
    /// "latitude_deg" and "antennas" (east, north, height [metres] for each
    /// antenna). If not given, a Y-shaped array is generated.
    #[clap(short, long, parse(from_str), help_heading = "ARRAY")]
    pub(super) layout: Option<PathBuf>,

    #[clap(long, help = NUM_PER_ARM_HELP.as_str(), help_heading = "ARRAY")]
    pub(super) num_per_arm: Option<usize>,

    #[clap(long, help = SPACING_HELP.as_str(), help_heading = "ARRAY")]
    pub(super) spacing: Option<f64>,

    #[clap(long, help = LATITUDE_HELP.as_str(), help_heading = "ARRAY", allow_hyphen_values = true)]
    pub(super) latitude: Option<f64>,

    /// The phase centre right ascension [degrees].
    #[clap(short, long, help_heading = "OBSERVATION PARAMETERS")]
    pub(super) ra: Option<f64>,

    /// The phase centre declination [degrees].
    #[clap(short, long, help_heading = "OBSERVATION PARAMETERS", allow_hyphen_values = true)]
    pub(super) dec: Option<f64>,

    #[clap(
        long, help = HA_HELP.as_str(), help_heading = "OBSERVATION PARAMETERS",
        number_of_values = 2,
        allow_hyphen_values = true,
        value_names = &["START_HOURS", "END_HOURS"]
    )]
    pub(super) hour_angles: Option<Vec<f64>>,

    #[clap(short = 't', long, help = NUM_HOUR_ANGLES_HELP.as_str(), help_heading = "OBSERVATION PARAMETERS")]
    pub(super) num_hour_angles: Option<usize>,

    #[clap(short, long, help = WAVELENGTH_HELP.as_str(), help_heading = "OBSERVATION PARAMETERS")]
    pub(super) wavelength: Option<f64>,

    /// A point source to simulate. May be given multiple times. If no sources
    /// are given, a 1 Jy source at the phase centre is used.
    #[clap(
        short, long, help_heading = "SKY MODEL",
        number_of_values = 3,
        multiple_occurrences(true),
        allow_hyphen_values = true,
        value_names = &["RA_DEG", "DEC_DEG", "FLUX_JY"]
    )]
    pub(super) source: Option<Vec<f64>>,

    #[clap(short, long, help = OUTPUT_HELP.as_str(), help_heading = "OUTPUT FILES")]
    pub(super) output: Option<PathBuf>,
}

#[derive(Parser, Debug, Clone, Default, Serialize, Deserialize)]
pub(super) struct SimulateArgs {
    #[clap(name = "ARGUMENTS_FILE", help = ARG_FILE_HELP.as_str(), parse(from_os_str))]
    pub(super) args_file: Option<PathBuf>,

    #[clap(flatten)]
    #[serde(rename = "simulate")]
    #[serde(default)]
    pub(super) simulate_args: SimulateCliArgs,
}

/// Everything needed to run a simulation, derived from [`SimulateArgs`].
#[derive(Debug)]
struct SimulateParams {
    layout: ArrayLayout,
    phase_centre: RADec,
    hour_angles: Vec<f64>,
    wavelength_m: f64,
    sources: Vec<PointSource>,
    output: PathBuf,
}

impl SimulateArgs {
    /// Both command-line and file arguments overlap in terms of what is
    /// available; this function consolidates everything that was specified into
    /// a single struct. Where applicable, it will prefer CLI parameters over
    /// those in the file.
    ///
    /// This function should only ever merge arguments, and not try to make
    /// sense of them.
    pub(super) fn merge(self) -> Result<SimulateArgs, WimagerError> {
        debug!("Merging command-line arguments with the argument file");

        let cli_args = self;

        if let Some(arg_file) = cli_args.args_file {
            // Read in the file arguments. Ensure all of the file args are
            // accounted for by pattern matching.
            let SimulateArgs {
                args_file: _,
                simulate_args,
            } = unpack_arg_file!(arg_file);

            // Merge all the arguments, preferring the CLI args when available.
            Ok(SimulateArgs {
                args_file: None,
                simulate_args: cli_args.simulate_args.merge(simulate_args),
            })
        } else {
            Ok(cli_args)
        }
    }

    fn parse(self) -> Result<SimulateParams, WimagerError> {
        debug!("{:#?}", self);

        // Expose all the struct fields to ensure they're all used.
        let SimulateArgs {
            args_file: _,
            simulate_args:
                SimulateCliArgs {
                    layout,
                    num_per_arm,
                    spacing,
                    latitude,
                    ra,
                    dec,
                    hour_angles: ha_range,
                    num_hour_angles,
                    wavelength,
                    source,
                    output,
                },
        } = self;

        let mut array_printer = InfoPrinter::new("Array".into());
        let layout = match layout {
            Some(layout) => {
                if !layout.exists() {
                    return Err(
                        SimulateArgsError::LayoutDoesntExist(layout.into_boxed_path()).into(),
                    );
                }
                array_printer.push_line(format!("Read from {}", layout.display()).into());
                ArrayLayout::read(&layout)?
            }
            None => {
                let num_per_arm = num_per_arm.unwrap_or(DEFAULT_NUM_PER_ARM);
                let spacing = spacing.unwrap_or(DEFAULT_SPACING_M);
                if num_per_arm == 0 {
                    return Err(SimulateArgsError::NoAntennas.into());
                }
                if !(spacing.is_finite() && spacing > 0.0) {
                    return Err(SimulateArgsError::BadSpacing(spacing).into());
                }
                array_printer.push_line(
                    format!("Y-shaped: {num_per_arm} antennas per arm, spacing {spacing} m")
                        .into(),
                );
                ArrayLayout::y_shaped(num_per_arm, spacing, latitude.unwrap_or(VLA_LAT_DEG))
            }
        };
        array_printer.push_block(vec![
            format!("Latitude: {:.4}°", layout.latitude_deg).into(),
            format!(
                "{} antennas, {} baselines",
                layout.antennas.len(),
                layout.num_baselines()
            )
            .into(),
        ]);

        let mut obs_printer = InfoPrinter::new("Observation".into());
        let phase_centre = parse_radec(ra, dec)?
            .unwrap_or_else(|| RADec::from_degrees(DEFAULT_RA_DEG, DEFAULT_DEC_DEG));
        obs_printer.push_line(
            format!(
                "Phase centre: ({:.4}°, {:.4}°)",
                phase_centre.ra.to_degrees(),
                phase_centre.dec.to_degrees()
            )
            .into(),
        );

        let (ha_start, ha_end) = match ha_range.as_deref() {
            Some([start, end]) => (*start, *end),
            Some(other) => return Err(SimulateArgsError::BadHourAngles(other.to_vec()).into()),
            None => (-DEFAULT_HA_HOURS, DEFAULT_HA_HOURS),
        };
        if !(ha_start.is_finite() && ha_end.is_finite()) {
            return Err(SimulateArgsError::BadHourAngles(vec![ha_start, ha_end]).into());
        }
        let num_hour_angles = num_hour_angles.unwrap_or(DEFAULT_NUM_HOUR_ANGLES);
        if num_hour_angles == 0 {
            return Err(SimulateArgsError::ZeroHourAngles.into());
        }
        // 1 hour of hour angle is 15 degrees.
        let hour_angles = hour_angles(
            (ha_start * 15.0).to_radians(),
            (ha_end * 15.0).to_radians(),
            num_hour_angles,
        );
        obs_printer.push_line(
            format!("{num_hour_angles} hour angles from {ha_start}h to {ha_end}h").into(),
        );

        let wavelength_m = wavelength.unwrap_or(DEFAULT_WAVELENGTH_M);
        if !(wavelength_m.is_finite() && wavelength_m > 0.0) {
            return Err(SimulateArgsError::BadWavelength(wavelength_m).into());
        }
        obs_printer.push_line(format!("Wavelength: {wavelength_m} m").into());

        let sources = match source {
            Some(values) => {
                if values.len() % 3 != 0 {
                    return Err(SimulateArgsError::BadSources(values.len()).into());
                }
                values
                    .chunks_exact(3)
                    .map(|s| PointSource {
                        ra_deg: s[0],
                        dec_deg: s[1],
                        flux: s[2],
                    })
                    .collect()
            }
            None => vec![PointSource {
                ra_deg: phase_centre.ra.to_degrees(),
                dec_deg: phase_centre.dec.to_degrees(),
                flux: 1.0,
            }],
        };
        let mut sky_printer = InfoPrinter::new("Sky model".into());
        sky_printer.push_block(
            sources
                .iter()
                .map(|s| {
                    format!("({:.4}°, {:.4}°): {} Jy", s.ra_deg, s.dec_deg, s.flux).into()
                })
                .collect(),
        );

        let output = output.unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_VIS_FILENAME));
        check_output_file(&output, "json")?;

        array_printer.display();
        obs_printer.display();
        sky_printer.display();
        display_warnings();

        Ok(SimulateParams {
            layout,
            phase_centre,
            hour_angles,
            wavelength_m,
            sources,
            output,
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

        params.run()
    }
}

impl SimulateParams {
    fn run(self) -> Result<(), WimagerError> {
        let SimulateParams {
            layout,
            phase_centre,
            hour_angles,
            wavelength_m,
            sources,
            output,
        } = self;

        let uvws = baselines(&layout, &hour_angles, phase_centre.dec, wavelength_m);
        let vis = simulate_sources(&uvws, &sources, phase_centre)?;
        info!("Simulated {} visibilities", vis.len());

        let vis_file = VisibilityFile::new(phase_centre, &uvws, &vis)?;
        vis_file.write(&output)?;
        info!("Wrote visibilities to {}", output.display());
        Ok(())
    }
}

#[derive(Error, Debug)]
pub(super) enum SimulateArgsError {
    #[error("Array layout file '{0}' doesn't exist")]
    LayoutDoesntExist(Box<Path>),

    #[error("The generated array needs at least 1 antenna per arm")]
    NoAntennas,

    #[error("The array spacing must be a positive number of metres; got {0}")]
    BadSpacing(f64),

    #[error("Hour angles specified as {0:?}, not [<start>, <end>]")]
    BadHourAngles(Vec<f64>),

    #[error("Number of hour angles cannot be 0!")]
    ZeroHourAngles,

    #[error("The wavelength must be a positive number of metres; got {0}")]
    BadWavelength(f64),

    #[error("Sources are specified as triples of RA, Dec and flux density; got {0} numbers")]
    BadSources(usize),
}

impl SimulateCliArgs {
    fn merge(self, other: Self) -> Self {
        Self {
            layout: self.layout.or(other.layout),
            num_per_arm: self.num_per_arm.or(other.num_per_arm),
            spacing: self.spacing.or(other.spacing),
            latitude: self.latitude.or(other.latitude),
            ra: self.ra.or(other.ra),
            dec: self.dec.or(other.dec),
            hour_angles: self.hour_angles.or(other.hour_angles),
            num_hour_angles: self.num_hour_angles.or(other.num_hour_angles),
            wavelength: self.wavelength.or(other.wavelength),
            source: self.source.or(other.source),
            output: self.output.or(other.output),
        }
    }
}
