//! Benchmarks for the self-consistent carrier solvers.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use pvlife_core::Doping;
use pvlife_physics::{FixedPointCriteria, IntrinsicParams, WaferState, solve_equilibrium};

fn logspace(start: f64, stop: f64, num: usize) -> Vec<f64> {
    (0..num)
        .map(|i| 10f64.powf(start + (stop - start) * i as f64 / (num - 1) as f64))
        .collect()
}

fn bench_equilibrium(c: &mut Criterion) {
    let intrinsic = IntrinsicParams::at(298.15).unwrap();
    let criteria = FixedPointCriteria::default();
    let doping = Doping::donors(1e15);

    c.bench_function("equilibrium_n_type_1e15", |b| {
        b.iter(|| solve_equilibrium(black_box(&doping), 298.15, &intrinsic, &criteria).unwrap());
    });
}

fn bench_injection_profile(c: &mut Criterion) {
    let wafer = WaferState::new(
        298.15,
        0.03,
        Doping::donors(1e15),
        FixedPointCriteria::default(),
    )
    .unwrap();

    let mut group = c.benchmark_group("injection_profile");
    for num in [10, 100, 500] {
        let dn = logspace(13.0, 17.0, num);
        group.bench_with_input(BenchmarkId::from_parameter(num), &dn, |b, dn| {
            b.iter(|| wafer.injection_profile(black_box(dn)).unwrap());
        });
    }
    group.finish();
}

criterion_group!(benches, bench_equilibrium, bench_injection_profile);
criterion_main!(benches);
