// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::io::Write;

use approx::assert_abs_diff_eq;
use fitsio::FitsFile;
use indoc::formatdoc;
use tempfile::TempDir;

use crate::{get_cmd_output, make_file_in_dir, simulate_small, wimager};

/// Read the "IMAGE" HDU back and find its brightest pixel.
fn image_peak(file: &std::path::Path) -> (usize, usize, f64) {
    let mut fptr = FitsFile::open(file).unwrap();
    let hdu = fptr.hdu("IMAGE").unwrap();
    let naxis1: i64 = hdu.read_key(&mut fptr, "NAXIS1").unwrap();
    let data: Vec<f64> = hdu.read_image(&mut fptr).unwrap();
    let (index, peak) = data
        .iter()
        .copied()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.total_cmp(b))
        .unwrap();
    let n = naxis1 as usize;
    (index / n, index % n, peak)
}

#[test]
fn test_simulate_then_image() {
    let tmp_dir = TempDir::new().unwrap();
    let vis = simulate_small(tmp_dir.path(), &[[0.0, 45.0, 1.0]]);
    let image = tmp_dir.path().join("image.fits");

    let cmd = wimager()
        .args([
            "image",
            "--theta",
            "0.1",
            "--lam",
            "640",
            "--no-progress-bars",
            "--data",
        ])
        .arg(&vis)
        .arg("--output")
        .arg(&image)
        .ok();
    let (stdout, stderr) = get_cmd_output(cmd);
    assert!(stderr.is_empty(), "stdout: {stdout}\nstderr: {stderr}");
    assert!(stdout.contains("wimager image complete"), "{stdout}");

    let (row, col, peak) = image_peak(&image);
    assert_eq!((row, col), (32, 32));
    assert_abs_diff_eq!(peak, 1.0, epsilon = 2e-2);

    let mut fptr = FitsFile::open(&image).unwrap();
    assert!(fptr.hdu("PSF").is_ok());
}

#[test]
fn test_image_with_arg_file() {
    let tmp_dir = TempDir::new().unwrap();
    // About 8 pixels east of the phase centre.
    let vis = simulate_small(tmp_dir.path(), &[[1.0, 45.0, 1.0]]);
    let image = tmp_dir.path().join("image.fits");

    let (args_file, mut f) = make_file_in_dir("args.toml", tmp_dir.path());
    write!(
        f,
        "{}",
        formatdoc! {r#"
            [image]
            data = {:?}
            output = {:?}
            theta = 0.1
            lam = 640.0
            ra = 1.0
            dec = 45.0
            no_psf = true
            bounds_policy = "error"
        "#,
        vis.display().to_string(),
        image.display().to_string()}
    )
    .unwrap();
    drop(f);

    let cmd = wimager()
        .arg("image")
        .arg(&args_file)
        .arg("--no-progress-bars")
        .ok();
    let (stdout, stderr) = get_cmd_output(cmd);
    assert!(stderr.is_empty(), "stdout: {stdout}\nstderr: {stderr}");

    // The image was centred on the source.
    let (row, col, peak) = image_peak(&image);
    assert_eq!((row, col), (32, 32));
    assert_abs_diff_eq!(peak, 1.0, epsilon = 2e-2);

    let mut fptr = FitsFile::open(&image).unwrap();
    assert!(fptr.hdu("PSF").is_err());
}

#[test]
fn test_image_grid_too_small() {
    let tmp_dir = TempDir::new().unwrap();
    let vis = simulate_small(tmp_dir.path(), &[[0.0, 45.0, 1.0]]);
    let image = tmp_dir.path().join("image.fits");

    // A 4x4 grid can't hold 7x7 kernels.
    let cmd = wimager()
        .args(["image", "--theta", "0.1", "--lam", "40", "--data"])
        .arg(&vis)
        .arg("--output")
        .arg(&image)
        .ok();
    assert!(cmd.is_err());
    let (_, stderr) = get_cmd_output(cmd);
    assert!(stderr.contains("too small"), "{stderr}");
    assert!(!image.exists());
}

#[test]
fn test_image_missing_data() {
    let tmp_dir = TempDir::new().unwrap();
    let cmd = wimager()
        .args(["image", "--data"])
        .arg(tmp_dir.path().join("nope.json"))
        .ok();
    assert!(cmd.is_err());
    let (_, stderr) = get_cmd_output(cmd);
    assert!(stderr.contains("doesn't exist"), "{stderr}");
}

#[test]
fn test_image_reprojected() {
    let tmp_dir = TempDir::new().unwrap();
    let vis = simulate_small(tmp_dir.path(), &[[1.0, 45.0, 1.0]]);
    let image = tmp_dir.path().join("image.fits");

    let cmd = wimager()
        .args([
            "image",
            "--theta",
            "0.1",
            "--lam",
            "640",
            "--ra",
            "1",
            "--dec",
            "45",
            "--reproject",
            "--no-psf",
            "--no-progress-bars",
            "--data",
        ])
        .arg(&vis)
        .arg("--output")
        .arg(&image)
        .ok();
    let (stdout, stderr) = get_cmd_output(cmd);
    assert!(stderr.is_empty(), "stdout: {stdout}\nstderr: {stderr}");
    assert!(stdout.contains("Reprojected"), "{stdout}");

    // Rotated to the source, but the source stays where it is in the tangent
    // plane of the data's phase centre.
    let (row, col, _) = image_peak(&image);
    assert_eq!(row, 32);
    assert!((39..=41).contains(&col), "peak at column {col}");

    let mut fptr = FitsFile::open(&image).unwrap();
    let hdu = fptr.primary_hdu().unwrap();
    let ra: f64 = hdu.read_key(&mut fptr, "OBSRA").unwrap();
    assert_abs_diff_eq!(ra, 0.0, epsilon = 1e-10);

    let cmd = wimager()
        .args(["image", "--reproject", "--transform", "1", "0.1", "0", "1", "--data"])
        .arg(&vis)
        .arg("--output")
        .arg(tmp_dir.path().join("other.fits"))
        .ok();
    assert!(cmd.is_err());
    let (_, stderr) = get_cmd_output(cmd);
    assert!(stderr.contains("--reproject"), "{stderr}");
}
