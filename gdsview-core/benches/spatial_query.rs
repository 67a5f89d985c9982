use criterion::{black_box, criterion_group, criterion_main, Criterion};
use gdsview_core::{
    BoundingBox, DrawableHandle, IndexedItem, LayerVisibilityMap, SpatialIndex, ViewportManager,
    VisibilityFlag,
};
use std::rc::Rc;

fn generate_tile_grid(side: u64, layers: i32) -> Vec<IndexedItem> {
    let mut items = Vec::with_capacity((side * side) as usize * layers as usize);
    let mut id = 0;
    for y in 0..side {
        for x in 0..side {
            for layer in 0..layers {
                let drawable: DrawableHandle = Rc::new(VisibilityFlag::default());
                let min_x = x as f64 * 1000.0;
                let min_y = y as f64 * 1000.0;
                items.push(IndexedItem::tile(
                    id,
                    BoundingBox::new(min_x, min_y, min_x + 1000.0, min_y + 1000.0),
                    layer,
                    0,
                    2_000,
                    drawable,
                ));
                id += 1;
            }
        }
    }
    items
}

fn bench_build(c: &mut Criterion) {
    let items = generate_tile_grid(100, 4);

    c.bench_function("build_40k_tiles", |b| {
        b.iter(|| {
            let mut index = SpatialIndex::default();
            let report = index.build(black_box(items.clone()));
            black_box(report)
        })
    });
}

fn bench_query(c: &mut Criterion) {
    let mut index = SpatialIndex::default();
    index.build(generate_tile_grid(100, 4));
    let viewport = BoundingBox::new(40_000.0, 40_000.0, 52_000.0, 49_000.0);

    c.bench_function("query_viewport_40k_tiles", |b| {
        b.iter(|| {
            let hits = index.query(black_box(&viewport));
            black_box(hits.len())
        })
    });
}

fn bench_visibility_pass(c: &mut Criterion) {
    let mut index = SpatialIndex::default();
    index.build(generate_tile_grid(100, 4));
    let mut manager = ViewportManager::new(LayerVisibilityMap::new());
    let viewports = [
        BoundingBox::new(0.0, 0.0, 12_000.0, 9_000.0),
        BoundingBox::new(6_000.0, 3_000.0, 18_000.0, 12_000.0),
    ];

    c.bench_function("indexed_pan_40k_tiles", |b| {
        let mut frame = 0usize;
        b.iter(|| {
            frame += 1;
            let stats = manager.update_visibility_indexed(&viewports[frame % 2], &index);
            black_box(stats)
        })
    });
}

criterion_group!(benches, bench_build, bench_query, bench_visibility_pass);
criterion_main!(benches);
