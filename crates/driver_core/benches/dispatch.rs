//! Dispatch benchmarks for driver_core using Criterion.rs.

use std::collections::HashSet;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use driver_core::config::DispatchPolicy;
use driver_core::dispatch::{
    DriverContext, InMemoryRideStore, IntakeFilter, MergeMode, NearbyQuery, RideRecord,
    RideRequest, RideStore, VehicleClass,
};
use driver_core::clock::{ClientClock, EventKind};
use driver_core::geo::{snap_to_polyline, GeoPoint, DEFAULT_SNAP_THRESHOLD_M};
use driver_core::runner::{dashboard_schedule, run_until};
use driver_core::test_helpers::{
    create_test_world, point_km_north, ride_record, sample_at, DRIVER_POINT, TEST_EPOCH_MS,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// `count` open requests scattered within ~30 km of the driver.
fn scattered_records(count: usize, seed: u64) -> Vec<RideRecord> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|i| {
            let pickup = GeoPoint::new(
                DRIVER_POINT.lat + rng.gen_range(-0.27..0.27),
                DRIVER_POINT.lng + rng.gen_range(-0.27..0.27),
            );
            let mut record = ride_record(&format!("r{i}"), pickup, TEST_EPOCH_MS + i as u64);
            if rng.gen_bool(0.2) {
                record.ride_type = Some("moto".to_string());
            }
            record
        })
        .collect()
}

fn bench_intake_filter(c: &mut Criterion) {
    let filter = IntakeFilter::new(&DispatchPolicy::default());
    let declined = HashSet::new();
    let driver = DriverContext {
        vehicle: VehicleClass::Standard,
        location: Some(DRIVER_POINT),
        declined: &declined,
    };

    let mut group = c.benchmark_group("intake_filter");
    for count in [100usize, 1_000, 10_000] {
        let batch: Vec<RideRequest> = scattered_records(count, 42)
            .iter()
            .map(RideRequest::from_record)
            .collect();
        let held: Vec<RideRequest> = filter
            .apply(&driver, &[], &batch[..count / 2], MergeMode::Replace)
            .requests;
        group.bench_with_input(BenchmarkId::from_parameter(count), &batch, |b, batch| {
            b.iter(|| black_box(filter.apply(&driver, &held, batch, MergeMode::Incremental)));
        });
    }
    group.finish();
}

fn bench_nearby_query(c: &mut Criterion) {
    let store = InMemoryRideStore::new();
    for record in scattered_records(10_000, 7) {
        store.insert(record).expect("insert");
    }
    let query = NearbyQuery {
        center: DRIVER_POINT,
        radius_km: 10.0,
        class: VehicleClass::Standard,
    };

    let mut group = c.benchmark_group("nearby_query");
    group.bench_function("h3_index_10k_rides", |b| {
        b.iter(|| black_box(store.fetch_nearby(&query).map(|rows| rows.len())));
    });
    group.bench_function("full_scan_10k_rides", |b| {
        b.iter(|| black_box(store.fetch_open_requests().map(|rows| rows.len())));
    });
    group.finish();
}

fn bench_snap_to_polyline(c: &mut Criterion) {
    let mut group = c.benchmark_group("snap_to_polyline");
    for vertices in [50usize, 500, 5_000] {
        // Zig-zag route heading north, ~20 m per vertex.
        let path: Vec<GeoPoint> = (0..vertices)
            .map(|i| {
                let p = point_km_north(DRIVER_POINT, i as f64 * 0.02);
                GeoPoint::new(p.lat, p.lng + if i % 2 == 0 { 0.0 } else { 1e-4 })
            })
            .collect();
        let off_route = GeoPoint::new(path[vertices / 2].lat, path[vertices / 2].lng + 2e-4);
        group.bench_with_input(BenchmarkId::from_parameter(vertices), &path, |b, path| {
            b.iter(|| black_box(snap_to_polyline(off_route, path, DEFAULT_SNAP_THRESHOLD_M)));
        });
    }
    group.finish();
}

fn bench_dashboard_minute(c: &mut Criterion) {
    c.bench_function("dashboard_online_minute", |b| {
        b.iter(|| {
            let mut world = create_test_world();
            {
                let mut clock = world.resource_mut::<ClientClock>();
                clock.schedule_at(0, EventKind::GoOnline);
                for second in 0..60u64 {
                    let at = second * 1_000;
                    let position =
                        GeoPoint::new(DRIVER_POINT.lat + second as f64 * 1e-4, DRIVER_POINT.lng);
                    clock.schedule_at(at, EventKind::LocationSample(sample_at(position, at)));
                }
            }
            let mut schedule = dashboard_schedule();
            black_box(run_until(&mut world, &mut schedule, 60_000));
        });
    });
}

criterion_group!(
    benches,
    bench_intake_filter,
    bench_nearby_query,
    bench_snap_to_polyline,
    bench_dashboard_minute
);
criterion_main!(benches);
