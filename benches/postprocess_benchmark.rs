use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use fcepost::{fourier_to_polygons, polygon_nms, Boundary, Complex64};
use ndarray::Array2;

/// Jittered octagons around a handful of centres, like one image's candidates.
fn candidates(n: usize) -> Vec<Boundary> {
    (0..n)
        .map(|i| {
            let cx = 40.0 * (i % 5) as f64 + (i % 3) as f64;
            let cy = 30.0 * (i / 5 % 4) as f64 + (i % 2) as f64;
            let points = (0..8)
                .flat_map(|t| {
                    let angle = std::f64::consts::TAU * t as f64 / 8.0;
                    [cx + 12.0 * angle.cos(), cy + 8.0 * angle.sin()]
                })
                .collect();
            let score = 0.5 + 0.5 * ((i * 7919) % 100) as f64 / 100.0;
            Boundary::new(points, score).expect("octagon is a valid boundary")
        })
        .collect()
}

fn descriptors(n: usize, degree: usize) -> Array2<Complex64> {
    Array2::from_shape_fn((n, 2 * degree + 1), |(row, col)| {
        if col == degree {
            Complex64::new(10.0 + row as f64, 20.0)
        } else {
            Complex64::new(1.0 / (1.0 + col as f64), 0.5)
        }
    })
}

fn benchmark_polygon_nms(c: &mut Criterion) {
    let mut group = c.benchmark_group("polygon_nms");
    group.sample_size(20);

    for n in [10usize, 50, 200] {
        let input = candidates(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &input, |b, input| {
            b.iter(|| polygon_nms(black_box(input), 0.1).expect("NMS failed"));
        });
    }

    group.finish();
}

fn benchmark_fourier_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("fourier_to_polygons");

    for n in [100usize, 1000] {
        let coeffs = descriptors(n, 5);
        group.bench_with_input(BenchmarkId::from_parameter(n), &coeffs, |b, coeffs| {
            b.iter(|| fourier_to_polygons(black_box(coeffs.view()), 50).expect("decode failed"));
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_polygon_nms, benchmark_fourier_decode);
criterion_main!(benches);
