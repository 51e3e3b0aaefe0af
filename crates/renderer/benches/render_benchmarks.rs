//! Benchmarks for the renderer crate - compositing, rasterization and PNG.
//!
//! Run with: cargo bench --package renderer --bench render_benchmarks

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use projection::compute_mesh;
use renderer::{compose, png, render_mesh, Canvas, MapProjection, WHITE};
use sat_common::GeoBounds;
use test_utils::{conus_axes, create_reflectance_band, GOES_EAST_LON};

fn bench_compose(c: &mut Criterion) {
    let mut group = c.benchmark_group("compose");

    for (cols, rows) in [(500, 300), (2500, 1500), (5000, 3000)] {
        let blue = create_reflectance_band(cols, rows, 0.9);
        let red = create_reflectance_band(cols, rows, 1.1);
        let green = create_reflectance_band(cols, rows, 0.7);
        let mask = vec![false; cols * rows];

        group.throughput(Throughput::Elements((cols * rows) as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}x{}", cols, rows)),
            &(cols, rows),
            |b, &(cols, rows)| {
                b.iter(|| {
                    compose(
                        (rows, cols),
                        black_box(&blue),
                        black_box(&red),
                        black_box(&green),
                        &mask,
                    )
                    .unwrap()
                })
            },
        );
    }
    group.finish();
}

fn bench_render_display(c: &mut Criterion) {
    let mut group = c.benchmark_group("render_display");
    group.sample_size(10);

    for (cols, rows) in [(500, 300), (1250, 750)] {
        let (x, y) = conus_axes(cols, rows);
        let mesh = compute_mesh(&x, &y, GOES_EAST_LON, 1e-6).unwrap();
        let band = create_reflectance_band(cols, rows, 1.0);
        let rgb = compose((rows, cols), &band, &band, &band, &mesh.no_data).unwrap();

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}x{}", cols, rows)),
            &(),
            |b, _| {
                b.iter(|| {
                    let canvas = Canvas::new(
                        1920,
                        1080,
                        GeoBounds::conus(),
                        MapProjection::PlateCarree,
                        WHITE,
                    )
                    .unwrap();
                    black_box(render_mesh(&mesh, &rgb, canvas).unwrap())
                })
            },
        );
    }
    group.finish();
}

fn bench_mesh(c: &mut Criterion) {
    let mut group = c.benchmark_group("compute_mesh");
    group.sample_size(10);

    for (cols, rows) in [(500, 300), (2500, 1500)] {
        let (x, y) = conus_axes(cols, rows);
        group.throughput(Throughput::Elements((cols * rows) as u64));
        group.bench_function(format!("{}x{}", cols, rows), |b| {
            b.iter(|| compute_mesh(black_box(&x), black_box(&y), GOES_EAST_LON, 1e-6).unwrap())
        });
    }
    group.finish();
}

fn bench_png(c: &mut Criterion) {
    let mut group = c.benchmark_group("png_encode");
    group.sample_size(10);

    let (width, height) = (3840, 2160);
    let mut pixels = Vec::with_capacity(width * height * 4);
    for y in 0..height {
        for x in 0..width {
            let (r, g, b) = ((x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8);
            pixels.extend_from_slice(&[r, g, b, 255]);
        }
    }

    group.throughput(Throughput::Bytes(pixels.len() as u64));
    group.bench_function("3840x2160", |b| {
        b.iter(|| png::create_png(black_box(&pixels), width, height).unwrap())
    });
    group.finish();
}

criterion_group!(benches, bench_compose, bench_render_display, bench_mesh, bench_png);
criterion_main!(benches);
