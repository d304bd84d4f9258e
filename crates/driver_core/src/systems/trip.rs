//! CompleteStep / CloseRide systems: pickup → dropoff → payment hand-off.

use bevy_ecs::prelude::{Res, ResMut};

use crate::alert::{Notification, NotificationSinkResource};
use crate::clock::{ClientClock, CurrentEvent, EventKind};
use crate::config::DriverClientConfig;
use crate::dispatch::{RideStatus, RideStoreResource};
use crate::follow::{FollowCamera, ForceFollowReason};
use crate::state::{ActiveTrip, FrameLoop, NavStep, PendingReset, ResetScope};
use crate::telemetry::DashboardTelemetry;

use super::animation::kick_frame_loop;

#[allow(clippy::too_many_arguments)]
pub fn complete_step_system(
    event: Res<CurrentEvent>,
    mut clock: ResMut<ClientClock>,
    config: Res<DriverClientConfig>,
    store: Res<RideStoreResource>,
    sink: Res<NotificationSinkResource>,
    mut trip: ResMut<ActiveTrip>,
    mut camera: ResMut<FollowCamera>,
    mut frames: ResMut<FrameLoop>,
    mut telemetry: ResMut<DashboardTelemetry>,
) {
    if event.0.kind != EventKind::CompleteStep || trip.awaiting_close {
        return;
    }
    let Some(ride_id) = trip.ride_id().map(str::to_string) else {
        return;
    };
    let next_status = match trip.nav_step {
        NavStep::Idle => return,
        NavStep::ToPickup => RideStatus::InProgress,
        NavStep::ToDropoff => RideStatus::Completed,
    };

    if let Err(err) = store.0.update_status(&ride_id, next_status) {
        tracing::warn!(%ride_id, error = %err, ?next_status, "status update failed");
        telemetry.store_errors = telemetry.store_errors.saturating_add(1);
        sink.0.notify(Notification::StoreFailure {
            operation: "update_status",
            message: err.to_string(),
        });
        return;
    }
    trip.advance_status(next_status);

    match trip.nav_step {
        NavStep::ToPickup => {
            trip.nav_step = NavStep::ToDropoff;
            camera.force_follow(clock.now(), ForceFollowReason::NavStepChanged, &config.follow);
            kick_frame_loop(&mut frames, &mut clock, &config.smoothing);
            tracing::info!(%ride_id, "passenger picked up");
        }
        NavStep::ToDropoff => {
            trip.awaiting_close = true;
            telemetry.trips_completed = telemetry.trips_completed.saturating_add(1);
            tracing::info!(%ride_id, "trip completed, awaiting payment hand-off");
        }
        NavStep::Idle => {}
    }
}

pub fn close_ride_system(
    event: Res<CurrentEvent>,
    trip: Res<ActiveTrip>,
    mut pending_reset: ResMut<PendingReset>,
) {
    if event.0.kind != EventKind::CloseRide || !trip.awaiting_close {
        return;
    }
    pending_reset.request(ResetScope::Trip);
}
