//! ReconcileTick system: low-frequency backstop poll for state realtime may have missed.
//!
//! Safe to interleave with realtime pushes: removals are idempotent and trip
//! status only moves forward.

use std::collections::HashMap;

use bevy_ecs::prelude::{Res, ResMut};

use crate::alert::{AlertController, GoneReason, Notification, NotificationSinkResource};
use crate::clock::{ClientClock, CurrentEvent, EventKind};
use crate::config::DriverClientConfig;
use crate::dispatch::{RideStatus, RideStoreResource};
use crate::state::{ActiveTrip, PendingReset, ReconcileLoop, RequestBoard, ResetScope};
use crate::telemetry::DashboardTelemetry;

use super::alert_loop::stop_alert;

#[allow(clippy::too_many_arguments)]
pub fn reconcile_system(
    event: Res<CurrentEvent>,
    mut clock: ResMut<ClientClock>,
    config: Res<DriverClientConfig>,
    reconcile: Res<ReconcileLoop>,
    store: Res<RideStoreResource>,
    sink: Res<NotificationSinkResource>,
    mut board: ResMut<RequestBoard>,
    mut trip: ResMut<ActiveTrip>,
    mut alert: ResMut<AlertController>,
    mut pending_reset: ResMut<PendingReset>,
    mut telemetry: ResMut<DashboardTelemetry>,
) {
    let EventKind::ReconcileTick { generation } = event.0.kind else {
        return;
    };
    if !reconcile.accept(generation) {
        return;
    }
    clock.schedule_in_secs(
        config.dispatch.reconcile_interval_secs,
        EventKind::ReconcileTick { generation },
    );

    let mut ids = board.ids();
    if let Some(trip_id) = trip.ride_id() {
        ids.push(trip_id.to_string());
    }
    if ids.is_empty() {
        return;
    }

    let statuses: HashMap<String, RideStatus> = match store.0.fetch_statuses(&ids) {
        Ok(statuses) => statuses.into_iter().collect(),
        Err(err) => {
            tracing::warn!(error = %err, "reconciliation poll failed");
            telemetry.store_errors = telemetry.store_errors.saturating_add(1);
            return;
        }
    };

    if let Some(trip_id) = trip.ride_id().map(str::to_string) {
        match statuses.get(&trip_id) {
            Some(RideStatus::Cancelled) if trip.advance_status(RideStatus::Cancelled) => {
                tracing::info!(ride_id = %trip_id, "reconciliation found the active trip cancelled");
                telemetry.trips_cancelled = telemetry.trips_cancelled.saturating_add(1);
                sink.0.notify(Notification::TripCancelled { ride_id: trip_id });
                pending_reset.request(ResetScope::Trip);
            }
            Some(status) => {
                trip.advance_status(*status);
            }
            None => {}
        }
    }

    for ride_id in board.ids() {
        // Rows that vanished from the store count as gone too.
        let still_open = statuses.get(&ride_id) == Some(&RideStatus::Requested);
        if still_open {
            continue;
        }
        board.remove(&ride_id);
        tracing::info!(%ride_id, "reconciliation removed request");
        telemetry.requests_gone = telemetry.requests_gone.saturating_add(1);
        sink.0.notify(Notification::RequestGone {
            ride_id,
            reason: GoneReason::NoLongerAvailable,
        });
    }

    if board.is_empty() {
        stop_alert(&mut alert, sink.0.as_ref());
    }
}
