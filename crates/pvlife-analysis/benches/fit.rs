//! Benchmarks for lifetime fitting and batch execution.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use pvlife_analysis::{
    BatchConfig, FitConfig, FitJob, LifetimeModel, ModelEvaluator, fit_batch, fit_lifetime,
};
use pvlife_core::{Doping, LifetimeCurve};
use pvlife_physics::{FixedPointCriteria, WaferState};
use pvlife_solver::logspace;

fn curve(points: usize) -> LifetimeCurve {
    let nd = logspace(13.0, 17.0, points);
    let wafer =
        WaferState::new(298.15, 0.03, Doping::donors(1e15), FixedPointCriteria::default()).unwrap();
    let profile = wafer.injection_profile(&nd).unwrap();
    let model = LifetimeModel::standard();
    let layout = model.layout().unwrap();
    let evaluator = ModelEvaluator::new(&model, &layout, &profile, 1e15, 0.03).unwrap();
    LifetimeCurve {
        tau: evaluator.tau_eff(&[2e-14, 3e-4, 5e-5]),
        nd,
        temperature: 298.15,
        wafer_thickness: 0.03,
        doping: Doping::donors(1e15),
    }
}

fn bench_fit(c: &mut Criterion) {
    let config = FitConfig::default();
    let mut group = c.benchmark_group("fit_lifetime");
    for points in [20, 50, 200] {
        let curve = curve(points);
        group.bench_with_input(BenchmarkId::from_parameter(points), &curve, |b, curve| {
            b.iter(|| fit_lifetime(black_box(curve), &config).unwrap());
        });
    }
    group.finish();
}

fn bench_batch(c: &mut Criterion) {
    let jobs: Vec<FitJob> = (0..16)
        .map(|i| FitJob {
            id: i.to_string(),
            curve: curve(50),
            config: FitConfig::default(),
        })
        .collect();

    let mut group = c.benchmark_group("fit_batch_16");
    group.bench_function("sequential", |b| {
        let config = BatchConfig::default().with_min_parallel(usize::MAX);
        b.iter(|| fit_batch(black_box(&jobs), &config));
    });
    group.bench_function("parallel", |b| {
        let config = BatchConfig::default();
        b.iter(|| fit_batch(black_box(&jobs), &config));
    });
    group.finish();
}

criterion_group!(benches, bench_fit, bench_batch);
criterion_main!(benches);
