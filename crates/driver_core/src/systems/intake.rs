//! Shared intake path for snapshots, re-polls and realtime pushes.

use crate::alert::{new_request_notification, AlertController, NotificationSink};
use crate::clock::{ClientClock, EventKind};
use crate::config::DriverClientConfig;
use crate::dispatch::{DriverContext, IntakeFilter, IntakeOutcome, MergeMode, RideRequest};
use crate::state::{DeclinedRequests, DriverLocation, DriverProfile, RequestBoard};
use crate::telemetry::DashboardTelemetry;

use super::alert_loop::{start_alert, stop_alert};

pub(crate) struct Intake<'a> {
    pub config: &'a DriverClientConfig,
    pub profile: &'a DriverProfile,
    pub location: &'a DriverLocation,
    pub declined: &'a DeclinedRequests,
    pub board: &'a mut RequestBoard,
    pub clock: &'a mut ClientClock,
    pub alert: &'a mut AlertController,
    pub sink: &'a dyn NotificationSink,
    pub telemetry: &'a mut DashboardTelemetry,
}

impl Intake<'_> {
    /// Runs `batch` through the intake filter and applies the outcome to the board:
    /// offer windows for new entries, one notification for the batch, alert loop.
    pub fn ingest(&mut self, batch: &[RideRequest], mode: MergeMode) -> IntakeOutcome {
        let dispatch = &self.config.dispatch;
        let driver = DriverContext {
            vehicle: self.profile.vehicle_class(),
            location: self
                .location
                .fresh_position(self.clock.now_wall_ms(), dispatch.presence_stale_secs),
            declined: &self.declined.ids,
        };
        let outcome = IntakeFilter::new(dispatch).apply(&driver, self.board.requests(), batch, mode);
        self.board.replace(outcome.requests.clone());

        self.telemetry.batches_filtered = self.telemetry.batches_filtered.saturating_add(1);
        self.telemetry.requests_shown = self
            .telemetry
            .requests_shown
            .saturating_add(outcome.newly_shown.len() as u64);

        let now = self.clock.now();
        for ride_id in &outcome.newly_shown {
            self.board.mark_shown(ride_id, now);
            if let Some(timeout_secs) = dispatch.offer_timeout_secs {
                self.clock.schedule_in_secs(
                    timeout_secs,
                    EventKind::OfferExpired {
                        ride_id: ride_id.clone(),
                        shown_at: now,
                    },
                );
            }
        }

        if let Some(primary) = &outcome.alert {
            let extra = outcome.newly_shown.len().saturating_sub(1);
            self.sink.notify(new_request_notification(primary, extra));
            self.telemetry.alerts_fired = self.telemetry.alerts_fired.saturating_add(1);
            start_alert(self.alert, self.clock, &self.config.alert);
        }

        if self.board.is_empty() {
            stop_alert(self.alert, self.sink);
        }
        outcome
    }
}
