//! Route resolution state machine: `Idle` → `Pending` → `Active`.
//!
//! Routing is expensive, so a new request is only issued when the destination
//! changes or the origin moves more than `min_origin_shift_m`; GPS jitter keeps
//! the current route. Every request carries a monotonically increasing version
//! and only the latest version may be applied.

use bevy_ecs::prelude::Resource;

use crate::config::RouteConfig;
use crate::error::RouteError;
use crate::geo::{distance_m, GeoPoint};

use super::RouteSnapshot;

/// Destination moves below this many metres are treated as the same destination.
const DESTINATION_EPSILON_M: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutePhase {
    Idle,
    Pending,
    Active,
}

/// A route query the runner must hand to the provider.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouteRequest {
    pub version: u64,
    pub origin: GeoPoint,
    pub destination: GeoPoint,
}

/// What happened to a provider response.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteApply {
    Applied,
    /// A newer request superseded this one; the response was dropped.
    Stale,
    /// The provider failed; the previous route (if any) is kept.
    Failed(RouteError),
}

#[derive(Debug, Default, Resource)]
pub struct RouteTracker {
    origin: Option<GeoPoint>,
    destination: Option<GeoPoint>,
    latest_version: u64,
    in_flight: Option<u64>,
    snapshot: Option<RouteSnapshot>,
    last_error: Option<RouteError>,
}

impl RouteTracker {
    pub fn phase(&self) -> RoutePhase {
        if self.in_flight.is_some() {
            RoutePhase::Pending
        } else if self.snapshot.is_some() {
            RoutePhase::Active
        } else {
            RoutePhase::Idle
        }
    }

    pub fn snapshot(&self) -> Option<&RouteSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn destination(&self) -> Option<GeoPoint> {
        self.destination
    }

    pub fn latest_version(&self) -> u64 {
        self.latest_version
    }

    pub fn last_error(&self) -> Option<&RouteError> {
        self.last_error.as_ref()
    }

    /// Feeds the current endpoints. Returns a request when a new route is needed.
    ///
    /// Clearing the destination drops the route and returns to `Idle`.
    pub fn update_endpoints(
        &mut self,
        origin: Option<GeoPoint>,
        destination: Option<GeoPoint>,
        config: &RouteConfig,
    ) -> Option<RouteRequest> {
        let Some(destination) = destination else {
            if self.destination.is_some() {
                self.clear();
            }
            return None;
        };
        let origin = origin?;

        let destination_changed = self
            .destination
            .map(|prev| distance_m(prev, destination) > DESTINATION_EPSILON_M)
            .unwrap_or(true);
        let origin_moved = self
            .origin
            .map(|prev| distance_m(prev, origin) > config.min_origin_shift_m)
            .unwrap_or(true);

        if !destination_changed && !origin_moved {
            return None;
        }
        if origin.approx_eq(&destination, config.same_point_epsilon_deg) {
            // Already there; a same-point routing call is degenerate.
            self.origin = Some(origin);
            self.destination = Some(destination);
            self.in_flight = None;
            self.snapshot = None;
            return None;
        }

        self.latest_version += 1;
        self.in_flight = Some(self.latest_version);
        self.origin = Some(origin);
        self.destination = Some(destination);
        Some(RouteRequest {
            version: self.latest_version,
            origin,
            destination,
        })
    }

    /// True when `destination` differs from the one currently tracked.
    pub fn is_new_destination(&self, destination: Option<GeoPoint>) -> bool {
        match (self.destination, destination) {
            (None, Some(_)) => true,
            (Some(prev), Some(next)) => distance_m(prev, next) > DESTINATION_EPSILON_M,
            _ => false,
        }
    }

    pub fn apply_result(&mut self, version: u64, result: Result<RouteSnapshot, RouteError>) -> RouteApply {
        if version != self.latest_version || self.in_flight != Some(version) {
            return RouteApply::Stale;
        }
        self.in_flight = None;
        match result {
            Ok(snapshot) => {
                self.snapshot = Some(snapshot);
                self.last_error = None;
                RouteApply::Applied
            }
            Err(err) => {
                // Keep the last known route and endpoints; only a real endpoint change retries.
                self.last_error = Some(err.clone());
                RouteApply::Failed(err)
            }
        }
    }

    /// Drops the route and any in-flight request; the version counter keeps increasing.
    pub fn clear(&mut self) {
        self.origin = None;
        self.destination = None;
        self.in_flight = None;
        self.snapshot = None;
        self.last_error = None;
    }
}
