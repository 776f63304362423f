// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::io::Write;

use approx::assert_abs_diff_eq;
use indoc::indoc;
use tempfile::TempDir;

use crate::{get_cmd_output, make_file_in_dir, simulate_small, wimager};
use wimager::io::VisibilityFile;

#[test]
fn test_simulate_y_shaped() {
    let tmp_dir = TempDir::new().unwrap();
    let vis = simulate_small(tmp_dir.path(), &[[0.0, 45.0, 2.5]]);

    let vis_file = VisibilityFile::read(vis).unwrap();
    // 12 antennas, 66 baselines, 4 hour angles.
    assert_eq!(vis_file.len(), 264);
    assert_abs_diff_eq!(vis_file.phase_centre_deg[1], 45.0, epsilon = 1e-10);
    for v in vis_file.vis() {
        assert_abs_diff_eq!(v.re, 2.5, epsilon = 1e-9);
        assert_abs_diff_eq!(v.im, 0.0, epsilon = 1e-9);
    }
}

#[test]
fn test_simulate_layout_file_and_arg_file() {
    let tmp_dir = TempDir::new().unwrap();
    let (layout, mut f) = make_file_in_dir("layout.toml", tmp_dir.path());
    write!(
        f,
        "{}",
        indoc! {r#"
            latitude_deg = -26.7
            antennas = [
                [0.0, 0.0, 0.0],
                [30.0, 0.0, 0.0],
                [0.0, 50.0, 1.0],
            ]
        "#}
    )
    .unwrap();
    drop(f);

    let output = tmp_dir.path().join("vis.json");
    let (args_file, mut f) = make_file_in_dir("args.toml", tmp_dir.path());
    write!(
        f,
        "[simulate]\nlayout = {:?}\ndec = -30.0\nra = 10.0\nnum_hour_angles = 5\noutput = {:?}\n",
        layout.display().to_string(),
        output.display().to_string()
    )
    .unwrap();
    drop(f);

    let saved = tmp_dir.path().join("saved.toml");
    let cmd = wimager()
        .arg("simulate")
        .arg(&args_file)
        .arg("--save-toml")
        .arg(&saved)
        .ok();
    let (stdout, stderr) = get_cmd_output(cmd);
    assert!(stderr.is_empty(), "stdout: {stdout}\nstderr: {stderr}");

    let vis_file = VisibilityFile::read(&output).unwrap();
    // 3 baselines, 5 hour angles.
    assert_eq!(vis_file.len(), 15);
    assert_abs_diff_eq!(vis_file.phase_centre_deg[0], 10.0, epsilon = 1e-10);
    assert!(saved.exists());
}

#[test]
fn test_simulate_dry_run() {
    let tmp_dir = TempDir::new().unwrap();
    let output = tmp_dir.path().join("vis.json");
    let cmd = wimager()
        .args(["simulate", "--dry-run", "--output"])
        .arg(&output)
        .ok();
    let (stdout, stderr) = get_cmd_output(cmd);
    assert!(stderr.is_empty(), "stdout: {stdout}\nstderr: {stderr}");
    assert!(stdout.contains("Dry run"));
    assert!(!output.exists());
}

#[test]
fn test_simulate_bad_sources() {
    let tmp_dir = TempDir::new().unwrap();
    let output = tmp_dir.path().join("vis.json");
    // A source behind the phase centre.
    let cmd = wimager()
        .args([
            "simulate",
            "--ra",
            "0",
            "--dec",
            "45",
            "--source",
            "180",
            "-45",
            "1",
            "--output",
        ])
        .arg(&output)
        .ok();
    assert!(cmd.is_err());
    let (_, stderr) = get_cmd_output(cmd);
    assert!(stderr.contains("Error"), "{stderr}");
    assert!(!output.exists());
}
