// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Code shared between `wimager` subcommands: argument files, phase-centre
//! parsing, output-file checks and pretty printing.

mod printers;

pub(super) use printers::InfoPrinter;
pub(crate) use printers::{display_warnings, Warn};

use std::path::Path;

use itertools::Itertools;
use log::trace;
use marlu::RADec;
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};
use thiserror::Error;

lazy_static::lazy_static! {
    pub(super) static ref ARG_FILE_TYPES_COMMA_SEPARATED: String = ArgFileTypes::iter().join(", ");

    pub(super) static ref ARG_FILE_HELP: String =
        format!("All arguments may be specified in a file. Any CLI arguments override arguments set in the file. Supported formats: {}", *ARG_FILE_TYPES_COMMA_SEPARATED);
}

#[derive(Debug, Display, EnumIter, EnumString)]
pub(super) enum ArgFileTypes {
    #[strum(serialize = "toml")]
    Toml,
    #[strum(serialize = "json")]
    Json,
}

/// Read an argument file into whatever type is expected where the macro is
/// used. Returns early with a [`WimagerError::ArgFile`] if the file can't be
/// decoded.
///
/// [`WimagerError::ArgFile`]: super::WimagerError::ArgFile
macro_rules! unpack_arg_file {
    ($arg_file:expr) => ({
        use std::{fs::File, io::Read, str::FromStr};

        use crate::cli::common::{ArgFileTypes, ARG_FILE_TYPES_COMMA_SEPARATED};

        debug!("Attempting to parse argument file {}", $arg_file.display());

        let mut contents = String::new();
        let arg_file_type = $arg_file
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .and_then(|e| ArgFileTypes::from_str(&e).ok());

        match arg_file_type {
            Some(ArgFileTypes::Toml) => {
                debug!("Parsing toml file...");
                let mut fh = File::open(&$arg_file)?;
                fh.read_to_string(&mut contents)?;
                match toml::from_str(&contents) {
                    Ok(p) => p,
                    Err(err) => {
                        return Err(WimagerError::ArgFile(format!(
                            "Couldn't decode toml structure from {:?}:\n{err}",
                            $arg_file
                        )))
                    }
                }
            }
            Some(ArgFileTypes::Json) => {
                debug!("Parsing json file...");
                let mut fh = File::open(&$arg_file)?;
                fh.read_to_string(&mut contents)?;
                match serde_json::from_str(&contents) {
                    Ok(p) => p,
                    Err(err) => {
                        return Err(WimagerError::ArgFile(format!(
                            "Couldn't decode json structure from {:?}:\n{err}",
                            $arg_file
                        )))
                    }
                }
            }

            _ => {
                return Err(WimagerError::ArgFile(format!(
                    "Argument file '{:?}' doesn't have a recognised file extension! Valid extensions are: {}", $arg_file, *ARG_FILE_TYPES_COMMA_SEPARATED)
                ))
            }
        }
    });
}

#[derive(Error, Debug)]
pub(super) enum CommonArgsError {
    #[error("Right Ascension ({0}°) was not within 0 to 360!")]
    RaInvalid(f64),

    #[error("Declination ({0}°) was not within -90 to 90!")]
    DecInvalid(f64),

    #[error("One of RA and Dec was specified, but none or both are required!")]
    OnlyOneRAOrDec,

    #[error("Can't write to '{0}'; its directory doesn't exist")]
    NoOutputDir(Box<Path>),

    #[error("Output file '{file}' has an unsupported extension; expected '{expected}'")]
    BadOutputExtension {
        file: Box<Path>,
        expected: &'static str,
    },
}

/// Turn an optional RA and Dec \[degrees\] into a [`RADec`]. If neither is
/// given, `None` is returned; if only one is given, that's an error.
pub(super) fn parse_radec(
    ra: Option<f64>,
    dec: Option<f64>,
) -> Result<Option<RADec>, CommonArgsError> {
    match (ra, dec) {
        (Some(ra), Some(dec)) => {
            if !(0.0..=360.0).contains(&ra) {
                return Err(CommonArgsError::RaInvalid(ra));
            }
            if !(-90.0..=90.0).contains(&dec) {
                return Err(CommonArgsError::DecInvalid(dec));
            }
            Ok(Some(RADec::from_degrees(ra, dec)))
        }
        (None, None) => Ok(None),
        _ => Err(CommonArgsError::OnlyOneRAOrDec),
    }
}

/// Check that `file` can be written with one of the `expected` extensions
/// (case insensitive), and warn if it's going to be overwritten.
pub(super) fn check_output_file(
    file: &Path,
    expected: &'static str,
) -> Result<(), CommonArgsError> {
    trace!("Testing whether we can write to {}", file.display());

    let ext_ok = file
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(expected))
        .unwrap_or(false);
    if !ext_ok {
        return Err(CommonArgsError::BadOutputExtension {
            file: file.to_path_buf().into_boxed_path(),
            expected,
        });
    }

    match file.parent() {
        Some(dir) if !dir.as_os_str().is_empty() && !dir.is_dir() => {
            return Err(CommonArgsError::NoOutputDir(
                file.to_path_buf().into_boxed_path(),
            ));
        }
        _ => (),
    }

    if file.exists() {
        format!("Will overwrite the existing file '{}'", file.display()).warn();
    }
    Ok(())
}
