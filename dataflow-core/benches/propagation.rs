use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use dataflow_core::{Engine, Ref};

/// `x` incremented `2^exponent - 1` times.
fn linear_sequence(engine: &Engine, exponent: u32, x: &Ref<i32>) -> Ref<i32> {
    let mut y = x.clone();
    for _ in 0..(1 << exponent) - 1 {
        y = engine.lift("incr", &y, |v| v + 1).unwrap();
    }
    y
}

/// A binary tree of increments fanning out of `x`, summed back pairwise.
fn binary_tree(engine: &Engine, exponent: u32, x: &Ref<i32>) -> Ref<i32> {
    let mut level = vec![x.clone()];
    for _ in 0..exponent - 1 {
        level = level
            .iter()
            .flat_map(|a| {
                [
                    engine.lift("incr", a, |v| v + 1).unwrap(),
                    engine.lift("incr", a, |v| v + 1).unwrap(),
                ]
            })
            .collect();
    }

    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| engine.lift2("add", &pair[0], &pair[1], |a, b| a + b).unwrap())
            .collect();
    }
    level.pop().unwrap()
}

type Shape = fn(&Engine, u32, &Ref<i32>) -> Ref<i32>;

const SHAPES: [(&str, Shape); 2] = [("linear", linear_sequence), ("binary", binary_tree)];

pub fn bench_lifecycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("construct-activate-deactivate");
    for (name, shape) in SHAPES {
        for exponent in [8, 12] {
            group.bench_with_input(BenchmarkId::new(name, exponent), &exponent, |b, &exponent| {
                let engine = Engine::new();
                b.iter(|| {
                    let x = engine.var(1);
                    let y = shape(&engine, exponent, &x);
                    let observed = y.observe().unwrap();
                    observed.get().unwrap()
                });
            });
        }
    }
    group.finish();
}

pub fn bench_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("update");
    for (name, shape) in SHAPES {
        for exponent in [8, 12] {
            group.bench_with_input(BenchmarkId::new(name, exponent), &exponent, |b, &exponent| {
                let engine = Engine::new();
                let x = engine.var(1);
                let y = shape(&engine, exponent, &x);
                let observed = y.observe().unwrap();

                let mut next = 1;
                b.iter(|| {
                    next += 1;
                    x.set(next).unwrap();
                    observed.get().unwrap()
                });
            });
        }
    }
    group.finish();
}

criterion_group!(benches, bench_lifecycle, bench_update);
criterion_main!(benches);
