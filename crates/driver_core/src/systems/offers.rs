//! Offer handling: accept (compare-and-swap), decline and offer expiry.

use bevy_ecs::prelude::{Res, ResMut};

use crate::alert::{AlertController, GoneReason, Notification, NotificationSinkResource};
use crate::clock::{ClientClock, CurrentEvent, EventKind};
use crate::config::DriverClientConfig;
use crate::dispatch::{AcceptOutcome, RideRequest, RideStoreResource};
use crate::follow::{FollowCamera, ForceFollowReason};
use crate::state::{ActiveTrip, DeclinedRequests, DriverProfile, FrameLoop, OnlineStatus, RequestBoard};
use crate::telemetry::DashboardTelemetry;

use super::alert_loop::stop_alert;
use super::animation::kick_frame_loop;

/// AcceptRequested system.
///
/// Losing the race is an expected outcome: the request is removed and the
/// driver told it is gone. A store error leaves the board untouched so the
/// driver can retry.
#[allow(clippy::too_many_arguments)]
pub fn accept_request_system(
    event: Res<CurrentEvent>,
    mut clock: ResMut<ClientClock>,
    config: Res<DriverClientConfig>,
    profile: Res<DriverProfile>,
    status: Res<OnlineStatus>,
    store: Res<RideStoreResource>,
    sink: Res<NotificationSinkResource>,
    mut board: ResMut<RequestBoard>,
    mut trip: ResMut<ActiveTrip>,
    mut alert: ResMut<AlertController>,
    mut camera: ResMut<FollowCamera>,
    mut frames: ResMut<FrameLoop>,
    mut telemetry: ResMut<DashboardTelemetry>,
) {
    let EventKind::AcceptRequested(ride_id) = &event.0.kind else {
        return;
    };
    if !status.online || trip.is_active() || !board.contains(ride_id) {
        tracing::debug!(%ride_id, "accept ignored");
        return;
    }

    match store.0.try_accept(ride_id, &profile.driver_id) {
        AcceptOutcome::Accepted(record) => {
            tracing::info!(%ride_id, driver_id = %profile.driver_id, "request accepted");
            telemetry.accepts_won = telemetry.accepts_won.saturating_add(1);
            board.clear();
            stop_alert(&mut alert, sink.0.as_ref());
            trip.start(RideRequest::from_record(&record));
            camera.force_follow(clock.now(), ForceFollowReason::TripChanged, &config.follow);
            kick_frame_loop(&mut frames, &mut clock, &config.smoothing);
            sink.0.notify(Notification::RequestAccepted {
                ride_id: ride_id.clone(),
            });
        }
        AcceptOutcome::AlreadyTaken => {
            tracing::info!(%ride_id, "accept race lost");
            telemetry.accepts_lost = telemetry.accepts_lost.saturating_add(1);
            board.remove(ride_id);
            sink.0.notify(Notification::RequestGone {
                ride_id: ride_id.clone(),
                reason: GoneReason::TakenByAnotherDriver,
            });
            if board.is_empty() {
                stop_alert(&mut alert, sink.0.as_ref());
            }
        }
        AcceptOutcome::Error(err) => {
            tracing::warn!(%ride_id, error = %err, "accept failed");
            telemetry.store_errors = telemetry.store_errors.saturating_add(1);
            sink.0.notify(Notification::StoreFailure {
                operation: "try_accept",
                message: err.to_string(),
            });
        }
    }
}

pub fn decline_request_system(
    event: Res<CurrentEvent>,
    sink: Res<NotificationSinkResource>,
    mut board: ResMut<RequestBoard>,
    mut declined: ResMut<DeclinedRequests>,
    mut alert: ResMut<AlertController>,
    mut telemetry: ResMut<DashboardTelemetry>,
) {
    let EventKind::DeclineRequested(ride_id) = &event.0.kind else {
        return;
    };
    declined.ids.insert(ride_id.clone());
    if board.remove(ride_id).is_some() {
        telemetry.requests_declined = telemetry.requests_declined.saturating_add(1);
    }
    if board.is_empty() {
        stop_alert(&mut alert, sink.0.as_ref());
    }
}

/// OfferExpired system: auto-decline once the offer window elapses.
pub fn offer_expired_system(
    event: Res<CurrentEvent>,
    sink: Res<NotificationSinkResource>,
    mut board: ResMut<RequestBoard>,
    mut declined: ResMut<DeclinedRequests>,
    mut alert: ResMut<AlertController>,
    mut telemetry: ResMut<DashboardTelemetry>,
) {
    let EventKind::OfferExpired { ride_id, shown_at } = &event.0.kind else {
        return;
    };
    // A window from an earlier showing of the same request.
    if board.shown_at(ride_id) != Some(*shown_at) {
        return;
    }
    board.remove(ride_id);
    declined.ids.insert(ride_id.clone());
    telemetry.requests_expired = telemetry.requests_expired.saturating_add(1);
    sink.0.notify(Notification::RequestGone {
        ride_id: ride_id.clone(),
        reason: GoneReason::Expired,
    });
    if board.is_empty() {
        stop_alert(&mut alert, sink.0.as_ref());
    }
}
