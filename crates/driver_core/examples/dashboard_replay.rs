//! Replay a scripted driver session against the in-memory store and print telemetry.
//!
//! Run with: cargo run -p driver_core --example dashboard_replay [-- config.json]
//! Log level via RUST_LOG (e.g. RUST_LOG=driver_core=debug).

use std::path::Path;
use std::sync::Arc;

use driver_core::alert::{Notification, RecordingNotificationSink};
use driver_core::clock::{ClientClock, EventKind};
use driver_core::config::DriverClientConfig;
use driver_core::dashboard::DashboardBuilder;
use driver_core::dispatch::{InMemoryRideStore, RideStatus};
use driver_core::geo::GeoPoint;
use driver_core::runner::{dashboard_schedule, run_until};
use driver_core::state::{ActiveTrip, RequestBoard};
use driver_core::telemetry::DashboardTelemetry;
use driver_core::test_helpers::{ride_record, sample_at, test_profile, DRIVER_POINT, TEST_EPOCH_MS};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing_subscriber::EnvFilter;

const SESSION_MINUTES: u64 = 10;
const NUM_REQUESTS: usize = 40;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => DriverClientConfig::from_path(Path::new(&path))?,
        None => DriverClientConfig::default(),
    };

    let store = InMemoryRideStore::new();
    let sink = RecordingNotificationSink::new();
    let mut world = DashboardBuilder::new(test_profile())
        .with_config(config)
        .with_session_id("replay")
        .with_epoch_ms(TEST_EPOCH_MS)
        .with_store(Arc::new(store.clone()))
        .with_notification_sink(Arc::new(sink.clone()))
        .build();
    let mut schedule = dashboard_schedule();

    // The driver drives slowly north-east, one fix every 2 s.
    {
        let mut clock = world.resource_mut::<ClientClock>();
        clock.schedule_at(0, EventKind::GoOnline);
        for tick in 0..(SESSION_MINUTES * 30) {
            let at = tick * 2_000;
            let position = GeoPoint::new(
                DRIVER_POINT.lat + tick as f64 * 2e-5,
                DRIVER_POINT.lng + tick as f64 * 1e-5,
            );
            clock.schedule_at(at, EventKind::LocationSample(sample_at(position, at)));
        }
    }

    let mut rng = StdRng::seed_from_u64(123);
    let end_ms = SESSION_MINUTES * 60_000;
    let mut next_request_ms = 5_000;
    let mut issued = 0;
    let mut now = 0;
    while now < end_ms {
        now = (now + 1_000).min(end_ms);
        run_until(&mut world, &mut schedule, now);

        if issued < NUM_REQUESTS && now >= next_request_ms {
            let pickup = GeoPoint::new(
                DRIVER_POINT.lat + rng.gen_range(-0.12..0.12),
                DRIVER_POINT.lng + rng.gen_range(-0.12..0.12),
            );
            store.insert(ride_record(&format!("ride-{issued}"), pickup, TEST_EPOCH_MS + now))?;
            issued += 1;
            next_request_ms = now + rng.gen_range(5_000..20_000);
        }

        // Another driver grabs some requests; this driver accepts the first one it sees.
        if rng.gen_bool(0.05) {
            if let Some(id) = world.resource::<RequestBoard>().ids().last().cloned() {
                store.set_status(&id, RideStatus::Accepted, Some("driver-other"))?;
            }
        }
        let trip_active = world.resource::<ActiveTrip>().is_active();
        let first_offer = world.resource::<RequestBoard>().ids().first().cloned();
        let mut clock = world.resource_mut::<ClientClock>();
        match (trip_active, first_offer) {
            (false, Some(id)) if now % 7_000 == 0 => clock.schedule_in(0, EventKind::AcceptRequested(id)),
            (true, _) if now % 60_000 == 0 => clock.schedule_in(0, EventKind::CompleteStep),
            (true, _) if now % 60_000 == 30_000 => clock.schedule_in(0, EventKind::CloseRide),
            _ => {}
        }
    }

    let telemetry = world.resource::<DashboardTelemetry>();
    println!("--- Dashboard replay ({SESSION_MINUTES} min, {issued} requests) ---");
    println!("Batches filtered:  {}", telemetry.batches_filtered);
    println!("Requests shown:    {}", telemetry.requests_shown);
    println!("Alerts fired:      {}", telemetry.alerts_fired);
    println!("Offers expired:    {}", telemetry.requests_expired);
    println!("Requests gone:     {}", telemetry.requests_gone);
    println!("Accepts won/lost:  {}/{}", telemetry.accepts_won, telemetry.accepts_lost);
    println!("Trips completed:   {}", telemetry.trips_completed);
    println!(
        "Routes req/applied/stale/failed: {}/{}/{}/{}",
        telemetry.routes_requested,
        telemetry.routes_applied,
        telemetry.routes_stale,
        telemetry.routes_failed
    );
    let gone = sink.count_where(|n| matches!(n, Notification::RequestGone { .. }));
    println!("Gone notifications: {gone}");
    Ok(())
}
