//! Driver-attention alerts and the notification sink.
//!
//! [`AlertController`] owns the looping "new request" alert. `start`/`stop` are
//! idempotent; each start bumps a generation so pulses scheduled by an earlier
//! run are ignored once the alert was stopped.

use std::sync::{Arc, Mutex};

use bevy_ecs::prelude::Resource;

use crate::dispatch::RideRequest;

/// Signals emitted by the dashboard. Formatting and sound are up to the sink.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    NewRequest {
        ride_id: String,
        title: String,
        body: String,
        /// Further new matches that arrived in the same batch.
        extra_count: usize,
    },
    RequestGone {
        ride_id: String,
        reason: GoneReason,
    },
    RequestAccepted {
        ride_id: String,
    },
    AlertPulse,
    AlertStopped,
    TripCancelled {
        ride_id: String,
    },
    SessionConflict,
    OnlineRefused {
        reason: String,
    },
    /// The store rejected or failed an operation; the dashboard kept running.
    StoreFailure {
        operation: &'static str,
        message: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoneReason {
    /// Another driver accepted it first.
    TakenByAnotherDriver,
    /// The passenger cancelled or the status moved on.
    NoLongerAvailable,
    /// The offer window elapsed.
    Expired,
}

pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);
}

#[derive(Resource, Clone)]
pub struct NotificationSinkResource(pub Arc<dyn NotificationSink>);

/// Sink that only logs.
pub struct TracingNotificationSink;

impl NotificationSink for TracingNotificationSink {
    fn notify(&self, notification: Notification) {
        tracing::info!(?notification, "notification");
    }
}

/// Sink that keeps everything it receives, for tests and replays.
#[derive(Clone, Default)]
pub struct RecordingNotificationSink {
    received: Arc<Mutex<Vec<Notification>>>,
}

impl RecordingNotificationSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Vec<Notification> {
        self.received
            .lock()
            .map(|received| received.clone())
            .unwrap_or_default()
    }

    pub fn count_where<F>(&self, predicate: F) -> usize
    where
        F: Fn(&Notification) -> bool,
    {
        self.received
            .lock()
            .map(|received| received.iter().filter(|n| predicate(n)).count())
            .unwrap_or(0)
    }
}

impl NotificationSink for RecordingNotificationSink {
    fn notify(&self, notification: Notification) {
        if let Ok(mut received) = self.received.lock() {
            received.push(notification);
        }
    }
}

/// Builds the "new request" notification for the newest match of a batch.
pub fn new_request_notification(request: &RideRequest, extra_count: usize) -> Notification {
    let destination = request.dropoff_label.as_deref().unwrap_or("destination");
    Notification::NewRequest {
        ride_id: request.id.clone(),
        title: "New ride request".to_string(),
        body: format!("Trip to {} - ${:.2}", destination, request.price),
        extra_count,
    }
}

#[derive(Debug, Default, Resource)]
pub struct AlertController {
    running: bool,
    generation: u64,
    pulses: u64,
}

impl AlertController {
    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Pulses emitted since the controller was created.
    pub fn pulses(&self) -> u64 {
        self.pulses
    }

    /// Starts the loop. Returns the generation to schedule pulses for, or `None`
    /// when it was already running.
    pub fn start(&mut self) -> Option<u64> {
        if self.running {
            return None;
        }
        self.running = true;
        self.generation += 1;
        Some(self.generation)
    }

    /// Stops the loop. Returns `true` if it was running.
    pub fn stop(&mut self) -> bool {
        if !self.running {
            return false;
        }
        self.running = false;
        self.generation += 1;
        true
    }

    /// Accepts a pulse if it belongs to the current run.
    pub fn pulse(&mut self, generation: u64) -> bool {
        if !self.running || generation != self.generation {
            return false;
        }
        self.pulses += 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::RideStatus;

    #[test]
    fn start_and_stop_are_idempotent() {
        let mut alert = AlertController::default();
        let generation = alert.start().expect("first start");
        assert_eq!(alert.start(), None);
        assert!(alert.pulse(generation));
        assert!(alert.stop());
        assert!(!alert.stop());
        assert!(!alert.pulse(generation));
        assert_eq!(alert.pulses(), 1);
    }

    #[test]
    fn restart_invalidates_old_pulses() {
        let mut alert = AlertController::default();
        let first = alert.start().expect("start");
        alert.stop();
        let second = alert.start().expect("restart");
        assert_ne!(first, second);
        assert!(!alert.pulse(first));
        assert!(alert.pulse(second));
    }

    #[test]
    fn notification_text_names_destination_and_price() {
        let request = RideRequest {
            id: "r-9".to_string(),
            class: None,
            pickup_label: None,
            dropoff_label: Some("Sambil".to_string()),
            pickup: None,
            dropoff: None,
            price: 3.5,
            created_at: 0,
            status: RideStatus::Requested,
            driver_id: None,
            delivery: None,
        };
        let Notification::NewRequest { title, body, extra_count, .. } = new_request_notification(&request, 2) else {
            panic!("expected new request");
        };
        assert_eq!(title, "New ride request");
        assert_eq!(body, "Trip to Sambil - $3.50");
        assert_eq!(extra_count, 2);
    }
}
