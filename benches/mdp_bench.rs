//! Benchmarks for the grid MDP solvers.

use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use grid_mdp::mdp::{CellType, Grid, GridMdp, PolicyIteration, SolverConfig, ValueIteration};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Random `size x size` world: mostly active cells, a few barriers, one
/// terminal in the top-left corner.
fn random_world(size: usize, seed: u64, config: &SolverConfig) -> GridMdp {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut cells = Vec::with_capacity(size * size);
    let mut rewards = Vec::with_capacity(size * size);
    for i in 0..size * size {
        let cell = if i == 0 {
            CellType::Terminal
        } else if rng.gen_bool(0.1) {
            CellType::Barrier
        } else {
            CellType::Active
        };
        let reward = match cell {
            CellType::Terminal => 10.0,
            CellType::Barrier => 0.0,
            CellType::Active => -rng.gen_range(0.5..2.0),
        };
        cells.push(cell);
        rewards.push(reward);
    }

    GridMdp::new(
        Grid::from_vec(size, size, cells).expect("square grid"),
        Grid::from_vec(size, size, rewards).expect("square grid"),
        config.slip_success,
        config.discount,
    )
    .expect("valid world")
}

fn value_iteration_benchmark(c: &mut Criterion) {
    let config = SolverConfig::default();
    let mut group = c.benchmark_group("value_iteration");
    for size in [5, 10, 20] {
        let mdp = random_world(size, 42, &config);
        group.bench_with_input(BenchmarkId::from_parameter(size), &mdp, |b, mdp| {
            b.iter(|| {
                let mut solver = ValueIteration::new(mdp.clone(), config.clone());
                black_box(solver.solve())
            })
        });
    }
    group.finish();
}

fn single_sweep_benchmark(c: &mut Criterion) {
    let config = SolverConfig::default();
    let mdp = random_world(20, 7, &config);

    // Fresh solver per batch; every sweep appends to the value history.
    c.bench_function("value_iteration_single_sweep_20", |b| {
        b.iter_batched(
            || ValueIteration::new(mdp.clone(), config.clone()),
            |mut solver| black_box(solver.run_sweep()),
            BatchSize::SmallInput,
        )
    });
}

fn policy_iteration_benchmark(c: &mut Criterion) {
    let config = SolverConfig::default().with_max_policy_iterations(200);
    let mut group = c.benchmark_group("policy_iteration");
    for reset_values in [true, false] {
        let mdp = random_world(10, 42, &config);
        let label = if reset_values { "reset" } else { "warm_start" };
        group.bench_with_input(BenchmarkId::new(label, 10), &mdp, |b, mdp| {
            b.iter(|| {
                let mut solver = PolicyIteration::new(mdp.clone(), config.clone(), reset_values);
                black_box(solver.solve())
            })
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    value_iteration_benchmark,
    single_sweep_benchmark,
    policy_iteration_benchmark
);
criterion_main!(benches);
