//! Criterion benchmarks for the grid registry.
//!
//! Benchmarks:
//!   - status lookups on a 41x41 grid with a few thousand tracked cells
//!   - owner lookup through the index
//!   - 5x5 neighborhood around a busy cell
//!   - full reconcile pass against 1500 islands
//!
//! Run with: cargo bench -p grid --features bench --bench registry_bench

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use uuid::Uuid;

use grid::settings::GridBounds;
use grid::source::IslandInfo;
use grid::{GridCoordinate, GridRegistry, GridSettings, MemoryCellStore, StaticIslandSource};

const HALF: i32 = 20;
const ISLANDS: usize = 1500;

fn settings() -> GridSettings {
    GridSettings {
        bounds: GridBounds::new(-HALF, HALF, -HALF, HALF),
        ..GridSettings::default()
    }
}

/// One island per cell, row-major from the north-west corner.
fn island_source(settings: &GridSettings) -> (StaticIslandSource, Vec<Uuid>) {
    let spacing = settings.effective_spacing();
    let mut source = StaticIslandSource::new("bench_world");
    let mut owners = Vec::with_capacity(ISLANDS);
    let side = 2 * HALF + 1;
    for i in 0..ISLANDS as i32 {
        let owner = Uuid::new_v4();
        let x = -HALF + i % side;
        let z = -HALF + i / side;
        source = source.with_island(IslandInfo {
            id: format!("isl-{i}"),
            owner: Some(owner),
            center_x: x * spacing,
            center_z: z * spacing,
        });
        owners.push(owner);
    }
    (source, owners)
}

fn populated_registry() -> (GridRegistry, Vec<Uuid>) {
    let settings = settings();
    let (source, owners) = island_source(&settings);
    let mut registry = GridRegistry::new(settings, Arc::new(MemoryCellStore::new()))
        .with_source(Arc::new(source));
    registry.reconcile();
    registry.flush_persistence();
    (registry, owners)
}

// ---------------------------------------------------------------------------
// Benchmark: lookups
// ---------------------------------------------------------------------------

fn bench_lookups(c: &mut Criterion) {
    let mut group = c.benchmark_group("registry_lookup");
    group.sample_size(1000);

    let (mut registry, owners) = populated_registry();

    group.bench_function("status_tracked", |b| {
        b.iter(|| black_box(registry.status(black_box(GridCoordinate::new(3, -7)))));
    });

    group.bench_function("status_locked", |b| {
        b.iter(|| black_box(registry.status(black_box(GridCoordinate::new(HALF + 1, 0)))));
    });

    group.bench_function("neighborhood_r2", |b| {
        b.iter(|| black_box(registry.neighborhood(black_box(GridCoordinate::ORIGIN), 2)));
    });

    let owner = owners[ISLANDS / 2];
    group.bench_function("owner_index", |b| {
        b.iter(|| black_box(registry.find_coordinate_for_owner(black_box(owner))));
    });

    group.finish();
}

// ---------------------------------------------------------------------------
// Benchmark: reconcile
// ---------------------------------------------------------------------------

fn bench_reconcile(c: &mut Criterion) {
    let mut group = c.benchmark_group("registry_reconcile");
    group.sample_size(20);

    let (mut registry, _) = populated_registry();

    // Every pass purges and re-derives the same 1500 cells.
    group.bench_function("reconcile_1500_islands", |b| {
        b.iter(|| {
            let report = registry.reconcile();
            registry.flush_persistence();
            black_box(report)
        });
    });

    group.finish();
}

criterion_group!(benches, bench_lookups, bench_reconcile);
criterion_main!(benches);
