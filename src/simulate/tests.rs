// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use approx::assert_abs_diff_eq;
use marlu::{RADec, UVW};
use tempfile::Builder;

use super::*;
use crate::constants::{DEFAULT_WAVELENGTH_M, VLA_LAT_DEG};

#[test]
fn test_enh_to_xyz() {
    let mwa_lat_rad = (-26.703319405555554_f64).to_radians();
    let xyz = enh_to_xyz(-585.675, -101.530, 375.212, mwa_lat_rad);
    assert_abs_diff_eq!(xyz.x, 289.5692867016053, epsilon = 1e-10);
    assert_abs_diff_eq!(xyz.y, -585.675, epsilon = 1e-10);
    assert_abs_diff_eq!(xyz.z, -259.3106516191025, epsilon = 1e-10);
}

#[test]
fn test_y_shaped() {
    let layout = ArrayLayout::y_shaped(9, 10.0, VLA_LAT_DEG);
    assert_eq!(layout.antennas.len(), 27);
    assert_eq!(layout.num_baselines(), 351);
    // The first antenna on the first arm is 10 m from the centre.
    let [e, n, h] = layout.antennas[0];
    assert_abs_diff_eq!((e * e + n * n).sqrt(), 10.0, epsilon = 1e-12);
    assert_eq!(h, 0.0);
    // The last is 10 * 9^1.5 = 270 m away.
    let [e, n, _] = layout.antennas[8];
    assert_abs_diff_eq!((e * e + n * n).sqrt(), 270.0, epsilon = 1e-9);
}

#[test]
fn test_hour_angles() {
    assert!(hour_angles(0.0, 1.0, 0).is_empty());
    assert_eq!(hour_angles(0.3, 1.0, 1), vec![0.3]);
    let has = hour_angles(-1.0, 1.0, 5);
    assert_eq!(has.len(), 5);
    assert_abs_diff_eq!(has[0], -1.0);
    assert_abs_diff_eq!(has[2], 0.0);
    assert_abs_diff_eq!(has[4], 1.0);
}

#[test]
fn test_baselines() {
    let layout = ArrayLayout::y_shaped(4, 20.0, VLA_LAT_DEG);
    let has = hour_angles(-0.2, 0.2, 3);
    let dec = VLA_LAT_DEG.to_radians();
    let uvws = baselines(&layout, &has, dec, DEFAULT_WAVELENGTH_M);
    assert_eq!(uvws.len(), 3 * layout.num_baselines());

    // Baseline lengths don't depend on the hour angle or the wavelength scale
    // (other than by dividing).
    let n = layout.num_baselines();
    for i in 0..n {
        let len = |uvw: &UVW| (uvw.u * uvw.u + uvw.v * uvw.v + uvw.w * uvw.w).sqrt();
        assert_abs_diff_eq!(len(&uvws[i]), len(&uvws[n + i]), epsilon = 1e-9);
        assert_abs_diff_eq!(len(&uvws[i]), len(&uvws[2 * n + i]), epsilon = 1e-9);
    }

    let uvws_m = baselines(&layout, &has, dec, 1.0);
    assert_abs_diff_eq!(uvws_m[5].u / DEFAULT_WAVELENGTH_M, uvws[5].u, epsilon = 1e-12);

    // A flat array observing the zenith at transit has no w.
    let at_zenith = baselines(&layout, &[0.0], dec, 1.0);
    for uvw in at_zenith {
        assert_abs_diff_eq!(uvw.w, 0.0, epsilon = 1e-9);
    }
}

#[test]
fn test_simulate_point() {
    let uvws = [
        UVW {
            u: 10.0,
            v: 0.0,
            w: 0.0,
        },
        UVW {
            u: 0.0,
            v: 0.0,
            w: 100.0,
        },
    ];
    // At the phase centre, all visibilities are 1.
    let vis = simulate_point(&uvws, 0.0, 0.0).unwrap();
    for v in vis {
        assert_abs_diff_eq!(v.re, 1.0);
        assert_abs_diff_eq!(v.im, 0.0);
    }

    let vis = simulate_point(&uvws, 0.025, 0.0).unwrap();
    // exp(-2πi * 0.25) = -i
    assert_abs_diff_eq!(vis[0].re, 0.0, epsilon = 1e-12);
    assert_abs_diff_eq!(vis[0].im, -1.0, epsilon = 1e-12);
    let n_minus_one = (1.0_f64 - 0.025 * 0.025).sqrt() - 1.0;
    assert_abs_diff_eq!(vis[1].arg(), -TAU * 100.0 * n_minus_one, epsilon = 1e-10);

    assert!(matches!(
        simulate_point(&uvws, 0.9, 0.9),
        Err(GeometryError::BeyondHorizon { .. })
    ));
}

#[test]
fn test_simulate_sources() {
    let uvws: Vec<UVW> = (0..10)
        .map(|i| UVW {
            u: 10.0 * i as f64,
            v: -5.0 * i as f64,
            w: i as f64,
        })
        .collect();
    let phase_centre = RADec::from_degrees(30.0, -20.0);
    let sources = [
        PointSource {
            ra_deg: 30.0,
            dec_deg: -20.0,
            flux: 2.0,
        },
        PointSource {
            ra_deg: 30.5,
            dec_deg: -19.5,
            flux: 0.5,
        },
    ];
    let vis = simulate_sources(&uvws, &sources, phase_centre).unwrap();
    let lmn = skycoord_to_lmn(sources[1].radec(), phase_centre).unwrap();
    let second = simulate_point(&uvws, lmn.l, lmn.m).unwrap();
    for (v, s) in vis.iter().zip(second.iter()) {
        assert_abs_diff_eq!(v.re, 2.0 + 0.5 * s.re, epsilon = 1e-12);
        assert_abs_diff_eq!(v.im, 0.5 * s.im, epsilon = 1e-12);
    }

    let behind = [PointSource {
        ra_deg: 210.0,
        dec_deg: 20.0,
        flux: 1.0,
    }];
    assert!(simulate_sources(&uvws, &behind, phase_centre).is_err());
}

#[test]
fn test_read_layout() {
    let layout = ArrayLayout::y_shaped(3, 15.0, -30.0);

    let toml_file = Builder::new().suffix(".toml").tempfile().unwrap();
    std::fs::write(toml_file.path(), toml::to_string(&layout).unwrap()).unwrap();
    assert_eq!(ArrayLayout::read(toml_file.path()).unwrap(), layout);

    let json_file = Builder::new().suffix(".json").tempfile().unwrap();
    std::fs::write(json_file.path(), serde_json::to_string(&layout).unwrap()).unwrap();
    assert_eq!(ArrayLayout::read(json_file.path()).unwrap(), layout);

    let yaml_file = Builder::new().suffix(".yaml").tempfile().unwrap();
    assert!(matches!(
        ArrayLayout::read(yaml_file.path()),
        Err(SimulateError::UnknownLayoutType(_))
    ));

    let lonely = Builder::new().suffix(".toml").tempfile().unwrap();
    std::fs::write(lonely.path(), "latitude_deg = 0.0\nantennas = [[0.0, 0.0, 0.0]]").unwrap();
    assert!(matches!(
        ArrayLayout::read(lonely.path()),
        Err(SimulateError::TooFewAntennas(1))
    ));
}
