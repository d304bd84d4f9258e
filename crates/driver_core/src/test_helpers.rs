//! Test helpers for common test setup and utilities.
//!
//! This module provides shared fixtures so unit tests, integration tests and
//! benches build rides, fixes and worlds the same way.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use bevy_ecs::prelude::World;

use crate::dashboard::DashboardBuilder;
use crate::dispatch::{RideRecord, RideStatus};
use crate::error::RouteError;
use crate::geo::GeoPoint;
use crate::routing::{RouteProvider, RouteSnapshot, StraightLineRouteProvider};
use crate::state::{AccountStatus, DriverProfile, LocationSample};

/// Wall-clock time that dashboard time zero maps to in tests.
pub const TEST_EPOCH_MS: u64 = 1_700_000_000_000;

/// Driver id used by [`test_profile`].
pub const TEST_DRIVER_ID: &str = "driver-1";

/// A standard driver position used across test files (Caracas).
pub const DRIVER_POINT: GeoPoint = GeoPoint::new(10.480, -66.100);

/// Kilometres per degree of latitude on the Haversine sphere.
const KM_PER_DEG_LAT: f64 = 111.195;

/// Point `km` kilometres due north of `origin`.
pub fn point_km_north(origin: GeoPoint, km: f64) -> GeoPoint {
    GeoPoint::new(origin.lat + km / KM_PER_DEG_LAT, origin.lng)
}

/// Active driver with a car.
pub fn test_profile() -> DriverProfile {
    DriverProfile {
        driver_id: TEST_DRIVER_ID.to_string(),
        vehicle_type: Some("carro".to_string()),
        account_status: AccountStatus::Active,
    }
}

/// Open car request with its pickup at `pickup` and a dropoff 3 km further north.
pub fn ride_record(id: &str, pickup: GeoPoint, created_at: u64) -> RideRecord {
    let dropoff = point_km_north(pickup, 3.0);
    RideRecord {
        id: id.to_string(),
        ride_type: Some("carro".to_string()),
        pickup: Some(format!("Pickup {id}")),
        dropoff: Some(format!("Dropoff {id}")),
        pickup_lat: Some(pickup.lat),
        pickup_lng: Some(pickup.lng),
        dropoff_lat: Some(dropoff.lat),
        dropoff_lng: Some(dropoff.lng),
        price: 5.0,
        created_at,
        status: RideStatus::Requested,
        driver_id: None,
        delivery_info: None,
    }
}

/// Location fix at `position`, taken at dashboard time `at_ms`.
pub fn sample_at(position: GeoPoint, at_ms: u64) -> LocationSample {
    LocationSample {
        position,
        heading: None,
        recorded_at_ms: TEST_EPOCH_MS + at_ms,
    }
}

/// Dashboard world for [`test_profile`] with every default collaborator.
///
/// For custom stores, sinks or providers use [`DashboardBuilder`] directly.
pub fn create_test_world() -> World {
    DashboardBuilder::new(test_profile())
        .with_epoch_ms(TEST_EPOCH_MS)
        .build()
}

#[derive(Default)]
struct ScriptState {
    queued: VecDeque<Result<RouteSnapshot, RouteError>>,
    calls: Vec<(GeoPoint, GeoPoint)>,
}

/// Route provider that replays queued results, then falls back to straight lines.
///
/// Clones share the script, so a test can keep a handle after boxing one into the world.
#[derive(Clone, Default)]
pub struct ScriptedRouteProvider {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedRouteProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_result(&self, result: Result<RouteSnapshot, RouteError>) {
        if let Ok(mut state) = self.state.lock() {
            state.queued.push_back(result);
        }
    }

    pub fn call_count(&self) -> usize {
        self.state.lock().map(|s| s.calls.len()).unwrap_or(0)
    }

    pub fn calls(&self) -> Vec<(GeoPoint, GeoPoint)> {
        self.state
            .lock()
            .map(|s| s.calls.clone())
            .unwrap_or_default()
    }
}

impl RouteProvider for ScriptedRouteProvider {
    fn route(&self, origin: GeoPoint, destination: GeoPoint) -> Result<RouteSnapshot, RouteError> {
        let scripted = match self.state.lock() {
            Ok(mut state) => {
                state.calls.push((origin, destination));
                state.queued.pop_front()
            }
            Err(_) => None,
        };
        scripted.unwrap_or_else(|| StraightLineRouteProvider.route(origin, destination))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::distance_km;

    #[test]
    fn point_km_north_is_that_far() {
        let north = point_km_north(DRIVER_POINT, 10.0);
        assert!((distance_km(DRIVER_POINT, north) - 10.0).abs() < 0.01);
    }

    #[test]
    fn scripted_provider_replays_then_falls_back() {
        let provider = ScriptedRouteProvider::new();
        provider.push_result(Err(RouteError::NoRoute));
        let handle = provider.clone();

        let a = DRIVER_POINT;
        let b = point_km_north(a, 1.0);
        assert_eq!(provider.route(a, b), Err(RouteError::NoRoute));
        let fallback = provider.route(a, b).expect("straight line");
        assert_eq!(fallback.path, vec![a, b]);
        assert_eq!(handle.call_count(), 2);
    }
}
