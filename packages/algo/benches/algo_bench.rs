//! Benchmark suite for aquastat-algo
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use aquastat_algo::matrix::{solve, Matrix};
use aquastat_algo::regression::models::fit_polynomial;

/// 对角占优矩阵，保证可解
fn diagonally_dominant(n: usize) -> Matrix {
    let rows: Vec<Vec<f64>> = (0..n)
        .map(|i| {
            (0..n)
                .map(|j| {
                    if i == j {
                        n as f64 + 1.0
                    } else {
                        ((i * 31 + j * 17) % 7) as f64 * 0.1
                    }
                })
                .collect()
        })
        .collect();
    Matrix::from_rows(&rows).unwrap()
}

fn bench_solve(c: &mut Criterion) {
    let mut group = c.benchmark_group("solve");
    for n in [4, 16, 64] {
        let a = diagonally_dominant(n);
        let b: Vec<f64> = (0..n).map(|i| i as f64).collect();
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |bench, _| {
            bench.iter(|| black_box(solve(&a, &b).unwrap()))
        });
    }
    group.finish();
}

fn bench_polynomial_fit(c: &mut Criterion) {
    let mut group = c.benchmark_group("polynomial_fit");
    let x: Vec<Vec<f64>> = (0..1000)
        .map(|i| vec![(i as f64 * 0.01).sin() * 3.0, (i as f64 * 0.003).cos()])
        .collect();
    let y: Vec<f64> = x
        .iter()
        .map(|r| 1.0 + 2.0 * r[0] - 0.5 * r[0] * r[0] + 3.0 * r[1])
        .collect();

    for degree in [1u32, 3, 5] {
        group.bench_with_input(BenchmarkId::from_parameter(degree), &degree, |bench, &d| {
            bench.iter(|| black_box(fit_polynomial(&x, &y, d).unwrap()))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_solve, bench_polynomial_fit);
criterion_main!(benches);
