//! RealtimeChanges system: row-level pushes from the requests table.

use bevy_ecs::prelude::{Res, ResMut};

use crate::alert::{AlertController, GoneReason, Notification, NotificationSinkResource};
use crate::clock::{ClientClock, CurrentEvent, EventKind};
use crate::config::DriverClientConfig;
use crate::dispatch::{MergeMode, RideRequest, RideStatus};
use crate::state::{
    ActiveTrip, DeclinedRequests, DriverLocation, DriverProfile, OnlineStatus, PendingReset,
    RequestBoard, ResetScope,
};
use crate::telemetry::DashboardTelemetry;

use super::alert_loop::stop_alert;
use super::intake::Intake;

#[allow(clippy::too_many_arguments)]
pub fn realtime_changes_system(
    event: Res<CurrentEvent>,
    mut clock: ResMut<ClientClock>,
    config: Res<DriverClientConfig>,
    profile: Res<DriverProfile>,
    status: Res<OnlineStatus>,
    location: Res<DriverLocation>,
    declined: Res<DeclinedRequests>,
    sink: Res<NotificationSinkResource>,
    mut board: ResMut<RequestBoard>,
    mut trip: ResMut<ActiveTrip>,
    mut alert: ResMut<AlertController>,
    mut pending_reset: ResMut<PendingReset>,
    mut telemetry: ResMut<DashboardTelemetry>,
) {
    let EventKind::RealtimeChanges(changes) = &event.0.kind else {
        return;
    };
    if !status.online {
        return;
    }

    let mut batch = Vec::new();
    for change in changes {
        let record = change.record();

        if trip.ride_id() == Some(record.id.as_str()) {
            if record.status == RideStatus::Cancelled && trip.advance_status(RideStatus::Cancelled) {
                tracing::info!(ride_id = %record.id, "active trip cancelled remotely");
                telemetry.trips_cancelled = telemetry.trips_cancelled.saturating_add(1);
                sink.0.notify(Notification::TripCancelled {
                    ride_id: record.id.clone(),
                });
                pending_reset.request(ResetScope::Trip);
            } else {
                trip.advance_status(record.status);
            }
            continue;
        }

        let request = RideRequest::from_record(record);
        if request.is_open() {
            batch.push(request);
            continue;
        }

        if board.remove(&record.id).is_some() {
            let reason = match record.driver_id.as_deref() {
                Some(driver) if driver != profile.driver_id => GoneReason::TakenByAnotherDriver,
                _ => GoneReason::NoLongerAvailable,
            };
            tracing::info!(ride_id = %record.id, ?reason, "request removed from board");
            telemetry.requests_gone = telemetry.requests_gone.saturating_add(1);
            sink.0.notify(Notification::RequestGone {
                ride_id: record.id.clone(),
                reason,
            });
        }
    }

    // No new offers while a trip is in progress.
    if batch.is_empty() || trip.is_active() {
        if board.is_empty() {
            stop_alert(&mut alert, sink.0.as_ref());
        }
        return;
    }

    Intake {
        config: &config,
        profile: &profile,
        location: &location,
        declined: &declined,
        board: &mut board,
        clock: &mut clock,
        alert: &mut alert,
        sink: sink.0.as_ref(),
        telemetry: &mut telemetry,
    }
    .ingest(&batch, MergeMode::Incremental);
}
