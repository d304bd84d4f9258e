//! AlertPulse system: keeps the looping new-request alert going while it runs.

use bevy_ecs::prelude::{Res, ResMut};

use crate::alert::{AlertController, Notification, NotificationSink, NotificationSinkResource};
use crate::clock::{ClientClock, CurrentEvent, EventKind};
use crate::config::{AlertConfig, DriverClientConfig};

/// Starts the alert loop if idle and schedules its first pulse.
pub(crate) fn start_alert(alert: &mut AlertController, clock: &mut ClientClock, config: &AlertConfig) {
    if let Some(generation) = alert.start() {
        clock.schedule_in(config.pulse_interval_ms, EventKind::AlertPulse { generation });
    }
}

pub(crate) fn stop_alert(alert: &mut AlertController, sink: &dyn NotificationSink) {
    if alert.stop() {
        sink.notify(Notification::AlertStopped);
    }
}

pub fn alert_pulse_system(
    event: Res<CurrentEvent>,
    mut clock: ResMut<ClientClock>,
    config: Res<DriverClientConfig>,
    sink: Res<NotificationSinkResource>,
    mut alert: ResMut<AlertController>,
) {
    let EventKind::AlertPulse { generation } = event.0.kind else {
        return;
    };
    if !alert.pulse(generation) {
        return;
    }
    sink.0.notify(Notification::AlertPulse);
    clock.schedule_in(
        config.alert.pulse_interval_ms,
        EventKind::AlertPulse { generation },
    );
}
