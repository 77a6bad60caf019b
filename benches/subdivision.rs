//! Benchmarks for the subdivision passes.

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};

use tessel::prelude::*;
use tessel::terrain::icosphere;

fn planet(level_max: usize) -> (TerrainSkeleton, Scratchpad) {
    let config = TerrainConfig::geometric(level_max, 10, 6_371_000.0, 9_000.0);
    let terrain = TerrainSkeleton::new(&config).unwrap();
    let mut scratch = Scratchpad::new(&config);
    scratch.on_subdivide = Box::new(icosphere::project_new_midpoints);
    (terrain, scratch)
}

fn bench_cold_descent(c: &mut Criterion) {
    c.bench_function("descend_to_surface_level5", |b| {
        b.iter_batched(
            || planet(5),
            |(mut terrain, mut scratch)| {
                let pos = terrain.positions[0];
                update(&mut terrain, &mut scratch, pos);
                terrain.skel.group_count()
            },
            BatchSize::LargeInput,
        );
    });
}

fn bench_steady_hover(c: &mut Criterion) {
    let (mut terrain, mut scratch) = planet(5);
    let pos = terrain.positions[0];
    update(&mut terrain, &mut scratch, pos);

    // Nothing changes frame-to-frame; this measures the pure frontier-scan
    // overhead of a settled mesh.
    c.bench_function("steady_hover_level5", |b| {
        b.iter(|| {
            update(&mut terrain, &mut scratch, pos);
            scratch.distance_check_count
        });
    });
}

fn bench_surface_crawl(c: &mut Criterion) {
    c.bench_function("surface_crawl_level4", |b| {
        b.iter_batched(
            || {
                let (mut terrain, mut scratch) = planet(4);
                let pos = terrain.positions[0];
                update(&mut terrain, &mut scratch, pos);
                (terrain, scratch)
            },
            |(mut terrain, mut scratch)| {
                // Slide the observer along the surface toward a neighboring
                // base vertex; most of the hierarchy is reused.
                let from = terrain.positions[0].map(|c| c as f64);
                let to = terrain.positions[4].map(|c| c as f64);
                for step in 1..=8 {
                    let t = step as f64 / 8.0;
                    let pos = (from * (1.0 - t) + to * t).map(|c| c as i64);
                    update(&mut terrain, &mut scratch, pos);
                }
                terrain.skel.group_count()
            },
            BatchSize::LargeInput,
        );
    });
}

criterion_group!(
    benches,
    bench_cold_descent,
    bench_steady_hover,
    bench_surface_crawl
);
criterion_main!(benches);
