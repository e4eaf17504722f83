use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use vanguard_core::{Universe, UniverseConfig};

fn bench_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("universe_step");
    for population in [16usize, 64, 256] {
        group.bench_function(format!("population_{population}"), |b| {
            let config = UniverseConfig {
                population,
                rng_seed: Some(0xBEEF),
                report_interval: 0,
                ..UniverseConfig::default()
            };
            b.iter_batched(
                || Universe::new(config.clone()).expect("valid config"),
                |mut universe| {
                    for _ in 0..32 {
                        universe.step();
                    }
                    universe
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_step);
criterion_main!(benches);
