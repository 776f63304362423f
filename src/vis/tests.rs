// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use approx::assert_abs_diff_eq;
use marlu::{c64, RADec, UVW};

use super::*;
use crate::{
    coord::skycoord_to_lmn,
    imaging::{invert, ImagingConfig},
    simulate::simulate_point,
};

fn test_uvws() -> Vec<UVW> {
    (0..20)
        .map(|i| {
            let i = i as f64;
            UVW {
                u: 37.0 * i - 300.0,
                v: 250.0 - 21.5 * i,
                w: 3.5 * i - 30.0,
            }
        })
        .collect()
}

#[test]
fn test_length_mismatch() {
    let uvws = test_uvws();
    let vis = vec![c64::new(1.0, 0.0); uvws.len() - 1];
    let pc = RADec::from_degrees(0.0, -27.0);

    let result = rotate_visibilities(&uvws, &vis, pc, pc);
    assert_eq!(
        result.unwrap_err(),
        VisError::LengthMismatch {
            num_uvws: 20,
            num_vis: 19
        }
    );

    let result = shift_visibilities(&uvws, &vis, 0.01, 0.0);
    assert!(matches!(result, Err(VisError::LengthMismatch { .. })));
}

#[test]
fn test_shift_unshift() {
    let uvws = test_uvws();
    let vis: Vec<c64> = (0..uvws.len())
        .map(|i| c64::new(1.0 + i as f64, -0.5 * i as f64))
        .collect();

    let shifted = shift_visibilities(&uvws, &vis, 0.013, -0.021).unwrap();
    assert_ne!(shifted, vis);
    let unshifted = shift_visibilities(&uvws, &shifted, -0.013, 0.021).unwrap();
    for (a, b) in vis.iter().zip(unshifted.iter()) {
        assert_abs_diff_eq!(a.re, b.re, epsilon = 1e-10);
        assert_abs_diff_eq!(a.im, b.im, epsilon = 1e-10);
    }
}

#[test]
fn test_shift_moves_source() {
    // A source at (l,m) shifted by (dl,dm) looks like a source at
    // (l + dl, m + dm), as far as the u and v terms go.
    let uvws: Vec<UVW> = test_uvws()
        .into_iter()
        .map(|uvw| UVW { w: 0.0, ..uvw })
        .collect();
    let vis = simulate_point(&uvws, 0.01, 0.02).unwrap();
    let shifted = shift_visibilities(&uvws, &vis, 0.005, -0.01).unwrap();
    let expected: Vec<c64> = uvws
        .iter()
        .map(|uvw| cexp(-TAU * (uvw.u * 0.015 + uvw.v * 0.01)))
        .collect();
    for (a, b) in shifted.iter().zip(expected.iter()) {
        assert_abs_diff_eq!(a.re, b.re, epsilon = 1e-10);
        assert_abs_diff_eq!(a.im, b.im, epsilon = 1e-10);
    }
}

#[test]
fn test_rotate_same_centre_is_untouched() {
    let uvws = test_uvws();
    let vis = simulate_point(&uvws, 0.01, -0.03).unwrap();
    let pc = RADec::from_degrees(10.0, -40.0);
    let (new_uvws, new_vis, rotation) = rotate_visibilities(&uvws, &vis, pc, pc).unwrap();
    assert!(rotation.is_identity());
    assert_eq!(new_uvws, uvws);
    assert_eq!(new_vis, vis);
}

#[test]
fn test_rotate_matches_simulation_at_new_centre() {
    // Simulate a source against one phase centre, rotate to another, and
    // compare against simulating directly at the new phase centre.
    let from = RADec::from_degrees(60.0, -27.0);
    let to = RADec::from_degrees(61.5, -25.0);
    let source = RADec::from_degrees(60.5, -26.0);

    let uvws_from = test_uvws();
    let lmn_from = skycoord_to_lmn(source, from).unwrap();
    let vis_from = simulate_point(&uvws_from, lmn_from.l, lmn_from.m).unwrap();

    let (uvws_to, vis_rotated, _) = rotate_visibilities(&uvws_from, &vis_from, from, to).unwrap();
    let lmn_to = skycoord_to_lmn(source, to).unwrap();
    let vis_expected = simulate_point(&uvws_to, lmn_to.l, lmn_to.m).unwrap();

    for (a, b) in vis_rotated.iter().zip(vis_expected.iter()) {
        assert_abs_diff_eq!(a.re, b.re, epsilon = 1e-8);
        assert_abs_diff_eq!(a.im, b.im, epsilon = 1e-8);
    }

    // The inputs aren't touched.
    assert_eq!(uvws_from, test_uvws());
}

/// Baselines spread over a 100x100 grid with theta = 0.1, lam = 1000.
fn spread_uvws() -> Vec<UVW> {
    (0..60)
        .map(|i| {
            let angle = i as f64 * 0.37;
            let radius = 30.0 + 5.5 * i as f64;
            UVW {
                u: radius * angle.cos(),
                v: radius * angle.sin(),
                w: 3.0 * (i as f64 - 30.0),
            }
        })
        .collect()
}

#[test]
fn test_reproject_lands_source_at_old_pixel() {
    // Near the pole a big change in RA is a small change in direction but
    // twists the (l,m) axes by ~20 degrees.
    let from = RADec::from_degrees(30.0, 85.0);
    let to = RADec::from_degrees(50.0, 85.0);
    let (l, m) = (0.01, -0.007);
    let uvws = spread_uvws();
    let vis = simulate_point(&uvws, l, m).unwrap();

    let result = reproject_visibilities(&uvws, &vis, from, to);
    assert!(result.is_ok(), "{result:?}");
    let reprojected = result.unwrap();
    let offset = skycoord_to_lmn(from, to).unwrap();
    assert_abs_diff_eq!(reprojected.offset.l, offset.l);
    assert_abs_diff_eq!(reprojected.offset.m, offset.m);
    assert!(!reprojected.transform.is_identity());
    // w has changed, u and v are the rotated ones.
    let (rotated, _, _) = rotate_visibilities(&uvws, &vis, from, to).unwrap();
    assert_eq!(reprojected.uvws, rotated);

    let config = ImagingConfig {
        theta: 0.1,
        lam: 1000.0,
        transform: reprojected.transform,
        make_psf: false,
        ..Default::default()
    };
    let result = invert(config, &reprojected.uvws, &reprojected.vis).unwrap();
    let peak = result.find_component().unwrap();
    // Pixel (0.01, -0.007) of the old tangent plane.
    assert_eq!((peak.row, peak.col), (43, 60));
    assert!(peak.flux > 0.95, "{}", peak.flux);

    // Without the transform, the twist puts it somewhere else.
    let config = ImagingConfig {
        theta: 0.1,
        lam: 1000.0,
        make_psf: false,
        ..Default::default()
    };
    let result = invert(config, &reprojected.uvws, &reprojected.vis).unwrap();
    let peak = result.find_component().unwrap();
    assert_ne!((peak.row, peak.col), (43, 60));
}

#[test]
fn test_reproject_same_centre() {
    let uvws = spread_uvws();
    let vis = simulate_point(&uvws, 0.01, 0.0).unwrap();
    let pc = RADec::from_degrees(30.0, -27.0);
    let reprojected = reproject_visibilities(&uvws, &vis, pc, pc).unwrap();
    // Exactly the identity, so kernels are the same as without reprojecting.
    assert_eq!(reprojected.transform, Transform2::identity());
    assert_eq!(reprojected.uvws, uvws);
    assert_eq!(reprojected.vis, vis);
    assert_eq!(reprojected.offset.l, 0.0);
    assert_eq!(reprojected.offset.m, 0.0);
}

#[test]
fn test_reproject_errors() {
    let uvws = spread_uvws();
    let vis = vec![c64::new(1.0, 0.0); 3];
    let pc = RADec::from_degrees(30.0, -27.0);
    let result = reproject_visibilities(&uvws, &vis, pc, pc);
    assert!(matches!(result, Err(VisError::LengthMismatch { .. })));

    // The old phase centre is on the far side of the sky from the new one.
    let vis = vec![c64::new(1.0, 0.0); uvws.len()];
    let result = reproject_visibilities(&uvws, &vis, pc, RADec::from_degrees(210.0, 27.0));
    assert!(matches!(result, Err(VisError::Geometry(_))));
}
