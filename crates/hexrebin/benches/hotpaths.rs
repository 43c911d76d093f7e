use criterion::{black_box, criterion_group, criterion_main, Criterion};
use hexrebin::{
    default_pixel_edge_mm, EventSeries, GeometryIndexer, SensorGeometry, SliceWindow,
    DEFAULT_EXTENT_MM,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Hex patch close to the reference camera's pixel count (1387 pixels).
fn camera_fixture() -> SensorGeometry {
    SensorGeometry::hexagonal("bench", 21, default_pixel_edge_mm(), DEFAULT_EXTENT_MM)
        .expect("bench geometry")
}

fn make_series(n_pixels: usize, n_slices: usize, seed: u64) -> EventSeries {
    let mut rng = StdRng::seed_from_u64(seed);
    let rows = (0..n_pixels)
        .map(|_| (0..n_slices).map(|_| rng.gen_range(0.0f32..4.0)).collect())
        .collect();
    EventSeries::from_dense(rows).expect("bench series")
}

fn bench_build(c: &mut Criterion) {
    let geometry = camera_fixture();
    let indexer = GeometryIndexer::default();

    c.bench_function("build_map_1387px_cell5", |b| {
        b.iter(|| {
            let map = indexer
                .build(black_box(&geometry), black_box(5.0))
                .expect("build");
            black_box(map.n_entries())
        })
    });

    c.bench_function("build_map_1387px_cell2", |b| {
        b.iter(|| {
            let map = indexer
                .build(black_box(&geometry), black_box(2.0))
                .expect("build");
            black_box(map.n_entries())
        })
    });
}

fn bench_rebin(c: &mut Criterion) {
    let geometry = camera_fixture();
    let map = GeometryIndexer::default()
        .build(&geometry, 5.0)
        .expect("build");
    let series = make_series(geometry.n_pixels(), 100, 17);
    let window = SliceWindow::new(0, 100);

    c.bench_function("rebin_1387px_100t", |b| {
        b.iter(|| {
            let tensor =
                hexrebin::rebin(black_box(&map), black_box(&series), window).expect("rebin");
            black_box(tensor.total())
        })
    });

    let events: Vec<EventSeries> = (0..16)
        .map(|i| make_series(geometry.n_pixels(), 100, 100 + i))
        .collect();
    c.bench_function("rebin_batch_16x1387px_100t", |b| {
        b.iter(|| {
            let out = hexrebin::rebin_batch(black_box(&map), black_box(&events), window);
            black_box(out.len())
        })
    });
}

criterion_group!(benches, bench_build, bench_rebin);
criterion_main!(benches);
