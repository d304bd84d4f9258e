//! Route planning and resolution.
//!
//! The planner runs after every state-changing event: it derives the endpoints
//! (live location → current nav target), asks the tracker whether a new route
//! is needed and queues the request in [`RouteOutbox`]. The runner resolves it
//! and feeds the answer back as `RouteResolved`.

use bevy_ecs::prelude::{Res, ResMut};

use crate::clock::{ClientClock, CurrentEvent, EventKind};
use crate::config::DriverClientConfig;
use crate::follow::{FollowCamera, ForceFollowReason};
use crate::geo::snap_to_polyline;
use crate::routing::{RouteApply, RouteTracker};
use crate::state::{ActiveTrip, DriverLocation, FrameLoop, MarkerState, RouteOutbox};
use crate::telemetry::DashboardTelemetry;

use super::animation::kick_frame_loop;

#[allow(clippy::too_many_arguments)]
pub fn route_planning_system(
    mut clock: ResMut<ClientClock>,
    config: Res<DriverClientConfig>,
    trip: Res<ActiveTrip>,
    location: Res<DriverLocation>,
    mut tracker: ResMut<RouteTracker>,
    mut camera: ResMut<FollowCamera>,
    mut frames: ResMut<FrameLoop>,
    mut outbox: ResMut<RouteOutbox>,
    mut telemetry: ResMut<DashboardTelemetry>,
) {
    let destination = trip.destination();
    let new_destination = tracker.is_new_destination(destination);

    if let Some(request) = tracker.update_endpoints(location.position(), destination, &config.routing) {
        tracing::debug!(version = request.version, "route requested");
        telemetry.routes_requested = telemetry.routes_requested.saturating_add(1);
        outbox.requests.push(request);
    }

    // Only once the tracker actually holds the new destination (origin known).
    if new_destination && tracker.destination().is_some() {
        camera.force_follow(clock.now(), ForceFollowReason::DestinationChanged, &config.follow);
        kick_frame_loop(&mut frames, &mut clock, &config.smoothing);
    }
}

#[allow(clippy::too_many_arguments)]
pub fn route_resolved_system(
    event: Res<CurrentEvent>,
    mut clock: ResMut<ClientClock>,
    config: Res<DriverClientConfig>,
    location: Res<DriverLocation>,
    mut tracker: ResMut<RouteTracker>,
    mut marker: ResMut<MarkerState>,
    mut frames: ResMut<FrameLoop>,
    mut telemetry: ResMut<DashboardTelemetry>,
) {
    let EventKind::RouteResolved { version, result } = &event.0.kind else {
        return;
    };

    match tracker.apply_result(*version, result.clone()) {
        RouteApply::Applied => {
            telemetry.routes_applied = telemetry.routes_applied.saturating_add(1);
            let (Some(raw), Some(route)) = (location.position(), tracker.snapshot()) else {
                return;
            };
            let snapped = snap_to_polyline(raw, &route.path, config.routing.snap_threshold_m);
            marker.position.set_target(snapped);
            kick_frame_loop(&mut frames, &mut clock, &config.smoothing);
        }
        RouteApply::Stale => {
            tracing::debug!(version, "discarded stale route response");
            telemetry.routes_stale = telemetry.routes_stale.saturating_add(1);
        }
        RouteApply::Failed(err) => {
            tracing::warn!(version, error = %err, "route resolution failed, keeping last route");
            telemetry.routes_failed = telemetry.routes_failed.saturating_add(1);
        }
    }
}
