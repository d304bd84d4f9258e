//! LocationSample / LocationLost systems.
//!
//! Every sample updates the latest fix, retargets the marker (snapped onto the
//! active route when close enough) and, while online, publishes presence and
//! triggers a nearby re-poll.

use bevy_ecs::prelude::{Res, ResMut};

use crate::clock::{ClientClock, CurrentEvent, EventKind};
use crate::config::DriverClientConfig;
use crate::dispatch::{DriverPresence, RideStoreResource};
use crate::follow::{FollowCamera, ForceFollowReason};
use crate::geo::snap_to_polyline;
use crate::routing::RouteTracker;
use crate::state::{DriverLocation, DriverProfile, FrameLoop, MarkerState, OnlineStatus};
use crate::telemetry::DashboardTelemetry;

use super::animation::kick_frame_loop;

#[allow(clippy::too_many_arguments)]
pub fn location_sample_system(
    event: Res<CurrentEvent>,
    mut clock: ResMut<ClientClock>,
    config: Res<DriverClientConfig>,
    profile: Res<DriverProfile>,
    status: Res<OnlineStatus>,
    store: Res<RideStoreResource>,
    tracker: Res<RouteTracker>,
    mut location: ResMut<DriverLocation>,
    mut marker: ResMut<MarkerState>,
    mut camera: ResMut<FollowCamera>,
    mut frames: ResMut<FrameLoop>,
    mut telemetry: ResMut<DashboardTelemetry>,
) {
    let EventKind::LocationSample(sample) = event.0.kind else {
        return;
    };

    location.record(sample, config.smoothing.bearing_min_move_m);

    let target = match tracker.snapshot() {
        Some(route) => snap_to_polyline(sample.position, &route.path, config.routing.snap_threshold_m),
        None => sample.position,
    };
    let appeared = marker.position.current().is_none();
    marker.position.set_target(target);
    if let Some(heading) = location.heading() {
        marker.heading.set_target(heading);
    }
    if appeared {
        camera.force_follow(clock.now(), ForceFollowReason::VehicleAppeared, &config.follow);
    }
    kick_frame_loop(&mut frames, &mut clock, &config.smoothing);

    if !status.online {
        return;
    }
    let presence = DriverPresence {
        position: sample.position,
        heading: location.heading(),
        recorded_at_ms: sample.recorded_at_ms,
    };
    if let Err(err) = store.0.publish_presence(&profile.driver_id, presence) {
        tracing::warn!(error = %err, "presence publish failed");
        telemetry.store_errors = telemetry.store_errors.saturating_add(1);
    }
    clock.schedule_in(0, EventKind::NearbyPollDue);
}

pub fn location_lost_system(
    event: Res<CurrentEvent>,
    mut location: ResMut<DriverLocation>,
    mut marker: ResMut<MarkerState>,
    mut frames: ResMut<FrameLoop>,
) {
    if event.0.kind != EventKind::LocationLost {
        return;
    }
    location.clear();
    marker.clear();
    if frames.cancel() {
        tracing::debug!("frame loop cancelled, vehicle target gone");
    }
}
