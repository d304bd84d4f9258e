//! SnapshotDue / NearbyPollDue systems: pull open requests from the store.
//!
//! The snapshot after subscribing replaces the board outright. Re-polls are
//! driven by location samples and merge into the board; they query the store's
//! proximity endpoint when the driver position is fresh and fall back to the
//! full open list otherwise.

use bevy_ecs::prelude::{Res, ResMut};

use crate::alert::{AlertController, Notification, NotificationSinkResource};
use crate::clock::{ClientClock, CurrentEvent, EventKind};
use crate::config::DriverClientConfig;
use crate::dispatch::{MergeMode, NearbyQuery, RideRecord, RideRequest, RideStoreResource};
use crate::error::StoreError;
use crate::state::{
    ActiveTrip, DeclinedRequests, DriverLocation, DriverProfile, OnlineStatus, RequestBoard,
};
use crate::telemetry::DashboardTelemetry;

use super::intake::Intake;

fn normalize(records: Vec<RideRecord>) -> Vec<RideRequest> {
    records.iter().map(RideRequest::from_record).collect()
}

fn report_failure(
    operation: &'static str,
    err: &StoreError,
    sink: &NotificationSinkResource,
    telemetry: &mut DashboardTelemetry,
) {
    tracing::warn!(operation, error = %err, "store read failed");
    telemetry.store_errors = telemetry.store_errors.saturating_add(1);
    sink.0.notify(Notification::StoreFailure {
        operation,
        message: err.to_string(),
    });
}

#[allow(clippy::too_many_arguments)]
pub fn snapshot_system(
    event: Res<CurrentEvent>,
    mut clock: ResMut<ClientClock>,
    config: Res<DriverClientConfig>,
    profile: Res<DriverProfile>,
    status: Res<OnlineStatus>,
    location: Res<DriverLocation>,
    trip: Res<ActiveTrip>,
    declined: Res<DeclinedRequests>,
    store: Res<RideStoreResource>,
    sink: Res<NotificationSinkResource>,
    mut board: ResMut<RequestBoard>,
    mut alert: ResMut<AlertController>,
    mut telemetry: ResMut<DashboardTelemetry>,
) {
    if event.0.kind != EventKind::SnapshotDue || !status.online || trip.is_active() {
        return;
    }
    let records = match store.0.fetch_open_requests() {
        Ok(records) => records,
        Err(err) => {
            report_failure("fetch_open_requests", &err, &sink, &mut telemetry);
            return;
        }
    };
    let batch = normalize(records);
    let outcome = Intake {
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
    .ingest(&batch, MergeMode::Replace);
    tracing::debug!(shown = outcome.requests.len(), "initial snapshot applied");
}

#[allow(clippy::too_many_arguments)]
pub fn nearby_poll_system(
    event: Res<CurrentEvent>,
    mut clock: ResMut<ClientClock>,
    config: Res<DriverClientConfig>,
    profile: Res<DriverProfile>,
    status: Res<OnlineStatus>,
    location: Res<DriverLocation>,
    trip: Res<ActiveTrip>,
    declined: Res<DeclinedRequests>,
    store: Res<RideStoreResource>,
    sink: Res<NotificationSinkResource>,
    mut board: ResMut<RequestBoard>,
    mut alert: ResMut<AlertController>,
    mut telemetry: ResMut<DashboardTelemetry>,
) {
    if event.0.kind != EventKind::NearbyPollDue || !status.online || trip.is_active() {
        return;
    }
    let fresh = location.fresh_position(clock.now_wall_ms(), config.dispatch.presence_stale_secs);
    let fetched = match fresh {
        Some(center) => store.0.fetch_nearby(&NearbyQuery {
            center,
            radius_km: config.dispatch.radius_km,
            class: profile.vehicle_class(),
        }),
        None => store.0.fetch_open_requests(),
    };
    let records = match fetched {
        Ok(records) => records,
        Err(err) => {
            report_failure("fetch_nearby", &err, &sink, &mut telemetry);
            return;
        }
    };
    let batch = normalize(records);
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
