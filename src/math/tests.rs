// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::f64::consts::{FRAC_PI_2, PI};

use approx::assert_abs_diff_eq;

use super::*;

#[test]
fn test_cexp() {
    let c = cexp(PI);
    assert_abs_diff_eq!(c.re, -1.0);
    assert_abs_diff_eq!(c.im, 0.0, epsilon = 1e-15);

    let c = cexp(FRAC_PI_2);
    assert_abs_diff_eq!(c.re, 0.0, epsilon = 1e-15);
    assert_abs_diff_eq!(c.im, 1.0);
}

#[test]
fn test_div_ceil() {
    assert_eq!(div_ceil(10, 5), 2);
    assert_eq!(div_ceil(11, 5), 3);
    assert_eq!(div_ceil(1, 8), 1);
}

#[test]
fn test_n_minus_one() {
    for r2 in [0.0, 1e-12, 0.01, 0.5, 0.99] {
        let expected = (1.0_f64 - r2).sqrt() - 1.0;
        assert_abs_diff_eq!(n_minus_one(r2), expected, epsilon = 1e-15);
    }
}
