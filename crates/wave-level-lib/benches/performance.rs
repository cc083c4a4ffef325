//! Performance benchmarks for wave-level-lib
//!
//! Run with: cargo bench --package wave-level-lib

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use geo::{Coord, LineString, Polygon};
use wave_level_lib::{
    DistanceOptions, Properties, QueryOptions, QueryPoint, Region, RegionStore, classify, query,
    resolve,
};

/// Generate a wobbly ring of `num_vertices` around a center, in degrees
fn generate_ring(center_lon: f64, center_lat: f64, radius_deg: f64, num_vertices: usize) -> Polygon<f64> {
    let mut coords: Vec<Coord<f64>> = (0..num_vertices)
        .map(|i| {
            let t = i as f64 / num_vertices as f64 * std::f64::consts::TAU;
            let r = radius_deg * (1.0 + 0.1 * (t * 7.0).sin());
            Coord {
                x: center_lon + r * t.cos(),
                y: center_lat + r * t.sin(),
            }
        })
        .collect();
    coords.push(coords[0]);
    Polygon::new(LineString::new(coords), vec![])
}

/// Generate a grid of regions with levels cycling through 1..=levels
fn generate_store(num_regions: usize, vertices_per_region: usize, levels: i64) -> RegionStore {
    let regions = (0..num_regions)
        .map(|i| {
            let lon = 150.0 + (i % 20) as f64 * 3.0;
            let lat = -30.0 + (i / 20) as f64 * 3.0;
            let level = (i as i64 % levels) + 1;
            Region::new(
                generate_ring(lon, lat, 1.2, vertices_per_region),
                level,
                Properties::new(),
            )
            .unwrap()
        })
        .collect();
    RegionStore::new(regions)
}

// ============================================================================
// Core Benchmarks - Key performance indicators
// ============================================================================

fn bench_classify(c: &mut Criterion) {
    let mut group = c.benchmark_group("classify");

    let store = generate_store(200, 200, 8);

    // Inside a region: resolved by the direct stage
    let inside = QueryPoint::new(150.0, -30.0).unwrap();
    group.bench_function("inside_200_regions", |b| {
        b.iter(|| classify(&inside, &store, 1.0));
    });

    // Between regions: falls through to the boundary check
    let between = QueryPoint::new(151.5, -28.5).unwrap();
    group.bench_function("between_200_regions", |b| {
        b.iter(|| classify(&between, &store, 1.0));
    });

    group.finish();
}

fn bench_resolve(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve");
    group.sample_size(20);

    let store = generate_store(200, 200, 8);
    let point = QueryPoint::new(165.0, -15.0).unwrap();

    for radius_km in [None, Some(500.0), Some(2_000.0)] {
        let options = DistanceOptions {
            radius_km,
            ..DistanceOptions::default()
        };
        let label = radius_km.map_or("unbounded".to_string(), |r| format!("{r}km"));
        group.bench_with_input(BenchmarkId::new("radius", label), &options, |b, options| {
            b.iter(|| resolve(&point, &store, options));
        });
    }

    group.finish();
}

fn bench_full_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("query");
    group.sample_size(20);

    let store = generate_store(100, 100, 5);
    let options = QueryOptions {
        radius_km: Some(740.0),
        ..QueryOptions::default()
    };

    group.bench_function("100_regions_radius_740km", |b| {
        b.iter(|| query(&store, 160.0, -20.0, &options));
    });

    group.finish();
}

fn bench_construction(c: &mut Criterion) {
    let mut group = c.benchmark_group("construction");
    group.sample_size(20);

    let regions: Vec<Region> = generate_store(400, 100, 8).regions().to_vec();
    let total_vertices = 400 * 101;

    group.throughput(Throughput::Elements(total_vertices as u64));
    group.bench_function("store_400x100", |b| {
        b.iter(|| RegionStore::new(regions.clone()));
    });

    group.finish();
}

fn bench_store_info(c: &mut Criterion) {
    let mut group = c.benchmark_group("info");

    let store = generate_store(400, 100, 8);

    group.bench_function("get_info", |b| {
        b.iter(|| store.info());
    });

    group.finish();
}

// ============================================================================
// Criterion Configuration
// ============================================================================

criterion_group!(
    benches,
    bench_classify,
    bench_resolve,
    bench_full_query,
    bench_construction,
    bench_store_info,
);

criterion_main!(benches);
