//! Store file encode/decode benchmarks.
//!
//! Measures the full file image (bitcode + lz4 + header) for grids of
//! 500, 2000 and 5000 tracked cells.
//!
//! Run with: `cargo bench -p save --bench file_store_bench`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use grid::{CellRecord, CellStatus, GridCoordinate};
use save::{decode_records, encode_records};

const SIZES: [usize; 3] = [500, 2_000, 5_000];

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Two thirds occupied, the rest reserved with a price.
fn synthetic_records(count: usize) -> Vec<CellRecord> {
    (0..count)
        .map(|i| {
            let coord = GridCoordinate::new((i % 100) as i32 - 50, (i / 100) as i32 - 25);
            if i % 3 == 0 {
                CellRecord {
                    reserved: true,
                    purchase_price: 100.0 + i as f64,
                    ..CellRecord::new(coord, CellStatus::Reserved)
                }
            } else {
                CellRecord {
                    owner_id: Some(format!("00000000-0000-4000-8000-{i:012}")),
                    owner_name: Some(format!("player{i}")),
                    island_id: Some(format!("isl-{i}")),
                    ..CellRecord::new(coord, CellStatus::Occupied)
                }
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Benchmark: encode / decode
// ---------------------------------------------------------------------------

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_encode");
    for size in SIZES {
        let records = synthetic_records(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &records, |b, records| {
            b.iter(|| black_box(encode_records(black_box(records))));
        });
    }
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_decode");
    for size in SIZES {
        let bytes = encode_records(&synthetic_records(size));
        group.bench_with_input(BenchmarkId::from_parameter(size), &bytes, |b, bytes| {
            b.iter(|| black_box(decode_records(black_box(bytes))));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode);
criterion_main!(benches);
