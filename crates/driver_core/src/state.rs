//! Dashboard resources: the single owner of all mutable client state.
//!
//! Every resource here is mutated only by the systems reacting to the current
//! event (or by [`crate::dashboard::reset_dashboard_state`]).

use std::collections::{HashMap, HashSet};

use bevy_ecs::prelude::Resource;
use serde::{Deserialize, Serialize};

use crate::config::SmoothingConfig;
use crate::dispatch::{RideFeed, RideRequest, RideStatus, VehicleClass};
use crate::geo::{bearing_degrees, distance_m, GeoPoint};
use crate::routing::RouteRequest;
use crate::smoothing::{HeadingSmoother, PositionSmoother, SmoothedVehicleState};

/// One fix from the location source (native watcher, browser watch or poll fallback).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationSample {
    pub position: GeoPoint,
    #[serde(default)]
    pub heading: Option<f64>,
    /// Wall-clock milliseconds.
    pub recorded_at_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    #[default]
    Active,
    Suspended,
}

#[derive(Debug, Clone, Resource)]
pub struct DriverProfile {
    pub driver_id: String,
    /// Raw vehicle type as stored on the profile ("carro", "moto", ...).
    pub vehicle_type: Option<String>,
    pub account_status: AccountStatus,
}

impl DriverProfile {
    pub fn vehicle_class(&self) -> VehicleClass {
        VehicleClass::for_driver(self.vehicle_type.as_deref())
    }
}

#[derive(Debug, Default, Resource)]
pub struct OnlineStatus {
    pub online: bool,
    pub since_ms: Option<u64>,
}

/// Latest location fix only; older samples are not retained.
#[derive(Debug, Default, Resource)]
pub struct DriverLocation {
    latest: Option<LocationSample>,
    heading: Option<f64>,
}

impl DriverLocation {
    /// Stores `sample`, deriving a heading from the previous fix when the sample
    /// carries none and the vehicle moved at least `min_move_m`.
    pub fn record(&mut self, sample: LocationSample, min_move_m: f64) {
        let derived = match (sample.heading, self.latest) {
            (Some(heading), _) => Some(heading),
            (None, Some(previous)) if distance_m(previous.position, sample.position) >= min_move_m => {
                Some(bearing_degrees(previous.position, sample.position))
            }
            _ => self.heading,
        };
        self.heading = derived;
        self.latest = Some(sample);
    }

    pub fn latest(&self) -> Option<&LocationSample> {
        self.latest.as_ref()
    }

    pub fn position(&self) -> Option<GeoPoint> {
        self.latest.map(|s| s.position)
    }

    pub fn heading(&self) -> Option<f64> {
        self.heading
    }

    /// Position if the fix is no older than `stale_after_secs`; otherwise unknown.
    pub fn fresh_position(&self, now_wall_ms: u64, stale_after_secs: u64) -> Option<GeoPoint> {
        let sample = self.latest?;
        let age_ms = now_wall_ms.saturating_sub(sample.recorded_at_ms);
        (age_ms <= stale_after_secs.saturating_mul(1000)).then_some(sample.position)
    }

    pub fn clear(&mut self) {
        self.latest = None;
        self.heading = None;
    }
}

/// Requests currently shown to the driver, newest first.
#[derive(Debug, Default, Resource)]
pub struct RequestBoard {
    requests: Vec<RideRequest>,
    /// Dashboard time each held request was last put on the board.
    shown_at: HashMap<String, u64>,
}

impl RequestBoard {
    pub fn requests(&self) -> &[RideRequest] {
        &self.requests
    }

    pub fn ids(&self) -> Vec<String> {
        self.requests.iter().map(|r| r.id.clone()).collect()
    }

    pub fn get(&self, ride_id: &str) -> Option<&RideRequest> {
        self.requests.iter().find(|r| r.id == ride_id)
    }

    pub fn contains(&self, ride_id: &str) -> bool {
        self.get(ride_id).is_some()
    }

    pub fn replace(&mut self, requests: Vec<RideRequest>) {
        self.requests = requests;
        let held: HashSet<&str> = self.requests.iter().map(|r| r.id.as_str()).collect();
        self.shown_at.retain(|id, _| held.contains(id.as_str()));
    }

    /// Records that `ride_id` was (re)shown at `now_ms`.
    pub fn mark_shown(&mut self, ride_id: &str, now_ms: u64) {
        if self.contains(ride_id) {
            self.shown_at.insert(ride_id.to_string(), now_ms);
        }
    }

    pub fn shown_at(&self, ride_id: &str) -> Option<u64> {
        self.shown_at.get(ride_id).copied()
    }

    pub fn remove(&mut self, ride_id: &str) -> Option<RideRequest> {
        let index = self.requests.iter().position(|r| r.id == ride_id)?;
        self.shown_at.remove(ride_id);
        Some(self.requests.remove(index))
    }

    pub fn clear(&mut self) {
        self.requests.clear();
        self.shown_at.clear();
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}

/// Ids the driver declined (or let expire); never shown again this session.
#[derive(Debug, Default, Resource)]
pub struct DeclinedRequests {
    pub ids: HashSet<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NavStep {
    #[default]
    Idle,
    ToPickup,
    ToDropoff,
}

#[derive(Debug, Default, Resource)]
pub struct ActiveTrip {
    pub ride: Option<RideRequest>,
    pub nav_step: NavStep,
    /// Dropoff confirmed; waiting for the payment hand-off before closing.
    pub awaiting_close: bool,
}

impl ActiveTrip {
    pub fn start(&mut self, ride: RideRequest) {
        self.ride = Some(ride);
        self.nav_step = NavStep::ToPickup;
        self.awaiting_close = false;
    }

    pub fn is_active(&self) -> bool {
        self.ride.is_some()
    }

    pub fn ride_id(&self) -> Option<&str> {
        self.ride.as_ref().map(|r| r.id.as_str())
    }

    pub fn status(&self) -> Option<RideStatus> {
        self.ride.as_ref().map(|r| r.status)
    }

    /// Applies a status observed remotely or written locally. Regressions are ignored.
    pub fn advance_status(&mut self, next: RideStatus) -> bool {
        let Some(ride) = self.ride.as_mut() else {
            return false;
        };
        if !ride.status.can_advance_to(next) {
            return false;
        }
        ride.status = next;
        true
    }

    /// Where navigation currently points: pickup, then dropoff, nothing once done.
    pub fn destination(&self) -> Option<GeoPoint> {
        let ride = self.ride.as_ref()?;
        if self.awaiting_close {
            return None;
        }
        match self.nav_step {
            NavStep::Idle => None,
            NavStep::ToPickup => ride.pickup,
            NavStep::ToDropoff => ride.dropoff,
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Smoothed vehicle marker.
#[derive(Debug, Clone, Resource)]
pub struct MarkerState {
    pub position: PositionSmoother,
    pub heading: HeadingSmoother,
}

impl MarkerState {
    pub fn new(config: &SmoothingConfig) -> Self {
        Self {
            position: PositionSmoother::new(config.position_factor, config.snap_epsilon_deg),
            heading: HeadingSmoother::default(),
        }
    }

    pub fn vehicle_state(&self) -> Option<SmoothedVehicleState> {
        Some(SmoothedVehicleState {
            position: self.position.current()?,
            heading: self.heading.normalized().unwrap_or(0.0),
        })
    }

    pub fn clear(&mut self) {
        self.position.clear();
        self.heading.clear();
    }
}

/// Animation-frame loop bookkeeping. Frames from a cancelled run carry a stale
/// generation and are dropped.
#[derive(Debug, Default, Resource)]
pub struct FrameLoop {
    running: bool,
    generation: u64,
    frames: u64,
}

impl FrameLoop {
    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Starts a run unless one is active. Returns the generation of the new run.
    pub fn start(&mut self) -> Option<u64> {
        if self.running {
            return None;
        }
        self.running = true;
        self.generation += 1;
        Some(self.generation)
    }

    pub fn accept(&mut self, generation: u64) -> bool {
        if !self.running || generation != self.generation {
            return false;
        }
        self.frames += 1;
        true
    }

    /// The marker settled; the loop goes idle until the next kick.
    pub fn settle(&mut self) {
        self.running = false;
    }

    /// The target disappeared; any queued frame becomes stale.
    pub fn cancel(&mut self) -> bool {
        let was_running = self.running;
        self.running = false;
        self.generation += 1;
        was_running
    }
}

/// Backstop poll bookkeeping, same generation scheme as [`FrameLoop`].
#[derive(Debug, Default, Resource)]
pub struct ReconcileLoop {
    active: bool,
    generation: u64,
}

impl ReconcileLoop {
    pub fn start(&mut self) -> u64 {
        self.active = true;
        self.generation += 1;
        self.generation
    }

    pub fn accept(&self, generation: u64) -> bool {
        self.active && generation == self.generation
    }

    pub fn cancel(&mut self) {
        self.active = false;
        self.generation += 1;
    }
}

#[derive(Debug, Resource)]
pub struct SessionGuard {
    pub local_session_id: String,
    pub signed_out: bool,
}

/// Live realtime subscriptions; dropping the feed unsubscribes.
#[derive(Debug, Default, Resource)]
pub struct RealtimeFeeds {
    pub rides: Option<RideFeed>,
}

impl RealtimeFeeds {
    pub fn is_subscribed(&self) -> bool {
        self.rides.is_some()
    }
}

/// Route queries waiting for the runner to hand them to the provider.
#[derive(Debug, Default, Resource)]
pub struct RouteOutbox {
    pub requests: Vec<RouteRequest>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetScope {
    /// Drop the current trip and its route.
    Trip,
    /// Back to a freshly opened, offline dashboard.
    Full,
}

/// Reset requested by a system; the runner applies it after the schedule.
#[derive(Debug, Default, Resource)]
pub struct PendingReset(pub Option<ResetScope>);

impl PendingReset {
    pub fn request(&mut self, scope: ResetScope) {
        self.0 = match (self.0, scope) {
            (Some(ResetScope::Full), _) | (_, ResetScope::Full) => Some(ResetScope::Full),
            _ => Some(ResetScope::Trip),
        };
    }

    pub fn take(&mut self) -> Option<ResetScope> {
        self.0.take()
    }
}
