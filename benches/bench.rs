// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use criterion::*;

use wimager::{
    constants::VLA_LAT_DEG,
    kernel::{generate_kernel, kernel_support},
    simulate::{baselines, hour_angles, simulate_point, ArrayLayout},
    Imager, ImagingConfig, KernelCache, KernelParams, Transform2, UVW,
};

fn test_uvws() -> Vec<UVW> {
    let layout = ArrayLayout::y_shaped(9, 40.0, VLA_LAT_DEG);
    let has = hour_angles(-0.5, 0.5, 32);
    baselines(&layout, &has, 45.0_f64.to_radians(), 2.0)
}

fn kernels(c: &mut Criterion) {
    let theta = 0.1;
    let npix_kern = kernel_support(theta, 500.0, 7, 1.0);
    let params = KernelParams::new(theta, npix_kern, 4, Transform2::identity()).unwrap();

    c.bench_function("generate kernel w = 0", |b| {
        b.iter(|| generate_kernel(&params, 0.0).unwrap())
    });
    c.bench_function("generate kernel w = 500", |b| {
        b.iter(|| generate_kernel(&params, 500.0).unwrap())
    });

    let cache = KernelCache::for_w_max(params, 500.0, None, None).unwrap();
    cache.get(&params, 123.0).unwrap();
    c.bench_function("cached kernel", |b| {
        b.iter(|| cache.get(&params, 123.0).unwrap())
    });
}

fn imaging(c: &mut Criterion) {
    let uvws = test_uvws();
    let vis = simulate_point(&uvws, 0.01, -0.02).unwrap();
    let config = ImagingConfig {
        lam: 5120.0,
        ..Default::default()
    };
    let imager = Imager::for_visibilities(config, &uvws).unwrap();
    // Fill the cache first, so only gridding is timed.
    imager.grid(&uvws, &vis).unwrap();

    let mut group = c.benchmark_group("imaging");
    group.sample_size(10);
    group.bench_function(format!("grid {} visibilities", uvws.len()), |b| {
        b.iter(|| imager.grid(&uvws, &vis).unwrap())
    });
    group.bench_function(format!("invert {} visibilities", uvws.len()), |b| {
        b.iter(|| imager.invert(&uvws, &vis).unwrap())
    });
    group.finish();
}

criterion_group!(benches, kernels, imaging);
criterion_main!(benches);
