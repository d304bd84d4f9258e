//! GoOnline / GoOffline systems: availability toggle and realtime subscription lifecycle.

use bevy_ecs::prelude::{Res, ResMut};

use crate::alert::{AlertController, Notification, NotificationSinkResource};
use crate::clock::{ClientClock, CurrentEvent, EventKind};
use crate::config::DriverClientConfig;
use crate::dispatch::RideStoreResource;
use crate::state::{
    AccountStatus, DriverProfile, OnlineStatus, RealtimeFeeds, ReconcileLoop, RequestBoard,
    SessionGuard,
};
use crate::telemetry::DashboardTelemetry;

use super::alert_loop::stop_alert;

#[allow(clippy::too_many_arguments)]
pub fn go_online_system(
    event: Res<CurrentEvent>,
    mut clock: ResMut<ClientClock>,
    config: Res<DriverClientConfig>,
    profile: Res<DriverProfile>,
    guard: Res<SessionGuard>,
    store: Res<RideStoreResource>,
    sink: Res<NotificationSinkResource>,
    mut status: ResMut<OnlineStatus>,
    mut feeds: ResMut<RealtimeFeeds>,
    mut reconcile: ResMut<ReconcileLoop>,
    mut telemetry: ResMut<DashboardTelemetry>,
) {
    if event.0.kind != EventKind::GoOnline || status.online {
        return;
    }

    let refusal = if guard.signed_out {
        Some("signed out")
    } else if profile.account_status == AccountStatus::Suspended {
        Some("account suspended")
    } else {
        None
    };
    if let Some(reason) = refusal {
        tracing::warn!(driver_id = %profile.driver_id, reason, "go-online refused");
        sink.0.notify(Notification::OnlineRefused {
            reason: reason.to_string(),
        });
        return;
    }

    match store.0.subscribe() {
        Ok(feed) => feeds.rides = Some(feed),
        Err(err) => {
            // The backstop poll still runs; realtime is best effort.
            tracing::warn!(error = %err, "realtime subscription failed");
            telemetry.store_errors = telemetry.store_errors.saturating_add(1);
            sink.0.notify(Notification::StoreFailure {
                operation: "subscribe",
                message: err.to_string(),
            });
        }
    }

    status.online = true;
    status.since_ms = Some(clock.now());
    tracing::info!(driver_id = %profile.driver_id, "driver online");

    clock.schedule_in(0, EventKind::SnapshotDue);
    let generation = reconcile.start();
    clock.schedule_in_secs(
        config.dispatch.reconcile_interval_secs,
        EventKind::ReconcileTick { generation },
    );
}

#[allow(clippy::too_many_arguments)]
pub fn go_offline_system(
    event: Res<CurrentEvent>,
    profile: Res<DriverProfile>,
    sink: Res<NotificationSinkResource>,
    mut status: ResMut<OnlineStatus>,
    mut feeds: ResMut<RealtimeFeeds>,
    mut board: ResMut<RequestBoard>,
    mut alert: ResMut<AlertController>,
    mut reconcile: ResMut<ReconcileLoop>,
) {
    if event.0.kind != EventKind::GoOffline || !status.online {
        return;
    }
    status.online = false;
    status.since_ms = None;
    feeds.rides = None;
    board.clear();
    reconcile.cancel();
    stop_alert(&mut alert, sink.0.as_ref());
    tracing::info!(driver_id = %profile.driver_id, "driver offline");
}
