//! Criterion benchmarks for path evaluation and optimizer steps.
//! Focus sizes: image width d in {16, 64, 256}, N = 16 transitions.
//! Results land under target/criterion.

use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use geodesics::api::{
    evaluate, translation_sequence, Chain, GeodesicCfg, GeodesicOptimizer, Initializer, Linear,
    Objective, Path, PixelChangeTol, StopCriterion, Tanh, Tensor,
};
use rand::{rngs::StdRng, Rng, SeedableRng};

const N_STEPS: usize = 16;

fn random_image(d: usize, seed: u64) -> Tensor {
    let mut rng = StdRng::seed_from_u64(seed);
    let data = (0..d).map(|_| rng.gen::<f64>()).collect();
    Tensor::new(vec![1, d], data).expect("shape matches data")
}

fn setup(d: usize) -> (Chain<Linear, Tanh>, Tensor, Tensor) {
    let img = random_image(d, 41);
    let seq = translation_sequence(&img, 4).expect("positive n_steps");
    let model = Chain::new(Linear::random(d, d / 2, 42), Tanh);
    (model, seq[0].clone(), seq[4].clone())
}

fn cfg() -> GeodesicCfg {
    GeodesicCfg {
        initializer: Initializer::BrownianBridge {
            max_norm: 0.1,
            seed: 43,
        },
        stop: StopCriterion {
            pixel_change: PixelChangeTol::Off,
            relative_decrease: None,
            patience: 1,
        },
        max_iterations: usize::MAX,
        ..GeodesicCfg::default()
    }
}

fn bench_energy(c: &mut Criterion) {
    let mut group = c.benchmark_group("geodesic");
    for &d in &[16usize, 64, 256] {
        group.bench_with_input(BenchmarkId::new("evaluate", d), &d, |b, &d| {
            let (model, a, z) = setup(d);
            let opt = GeodesicOptimizer::new(&model, &a, &z, N_STEPS, &cfg()).expect("valid cfg");
            let path = opt.path();
            let path = Path::from_sequence(&a, &z, N_STEPS, path).expect("path");
            b.iter(|| evaluate(&model, &path, &Objective::default()).expect("evaluate"))
        });

        group.bench_with_input(BenchmarkId::new("run_step", d), &d, |b, &d| {
            let (model, a, z) = setup(d);
            b.iter_batched(
                || GeodesicOptimizer::new(&model, &a, &z, N_STEPS, &cfg()).expect("valid cfg"),
                |mut opt| {
                    let _out = opt.run_step().expect("finite step");
                },
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

criterion_group!(benches, bench_energy);
criterion_main!(benches);
