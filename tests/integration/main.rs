// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Integration tests.
//!
//! Some help for laying out these tests was taken from:
//! https://matklad.github.io/2021/02/27/delete-cargo-integration-tests.html

mod image;
mod simulate;

use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::Output;
use std::str::from_utf8;

use assert_cmd::{output::OutputError, Command};

fn wimager() -> Command {
    Command::cargo_bin("wimager").unwrap()
}

fn get_cmd_output(result: Result<Output, OutputError>) -> (String, String) {
    let output = match result {
        Ok(o) => o,
        Err(o) => o.as_output().unwrap().clone(),
    };
    (
        from_utf8(&output.stdout).unwrap().to_string(),
        from_utf8(&output.stderr).unwrap().to_string(),
    )
}

fn make_file_in_dir<T: AsRef<Path>, U: AsRef<Path>>(filename: T, dir: U) -> (PathBuf, File) {
    let path = dir.as_ref().join(filename);
    let f = File::create(&path).expect("couldn't make file");
    (path, f)
}

/// Simulate a small array observing the given sources and return the path to
/// the visibility file.
fn simulate_small<P: AsRef<Path>>(dir: P, sources: &[[f64; 3]]) -> PathBuf {
    let vis = dir.as_ref().join("vis.json");
    let mut cmd = wimager();
    cmd.args([
        "simulate",
        "--num-per-arm",
        "4",
        "--spacing",
        "10",
        "--ra",
        "0",
        "--dec",
        "45",
        "--num-hour-angles",
        "4",
        "--wavelength",
        "2",
        "--no-progress-bars",
    ]);
    for source in sources {
        cmd.arg("--source");
        for v in source {
            cmd.arg(v.to_string());
        }
    }
    cmd.arg("--output").arg(&vis);
    let (stdout, stderr) = get_cmd_output(cmd.ok());
    assert!(stderr.is_empty(), "stdout: {stdout}\nstderr: {stderr}");
    assert!(vis.exists());
    vis
}
