//! Dashboard clock: a min-heap of timestamped client events.
//!
//! Time is milliseconds since the dashboard started; [`ClientClock::with_epoch`]
//! anchors it to wall-clock time so store timestamps (ride `created_at`, sample
//! `recorded_at_ms`) can be compared against it. Events sharing a timestamp pop
//! in scheduling order.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use bevy_ecs::prelude::Resource;

use crate::dispatch::RideChange;
use crate::error::RouteError;
use crate::routing::RouteSnapshot;
use crate::state::LocationSample;

pub const ONE_SEC_MS: u64 = 1000;

#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    GoOnline,
    GoOffline,
    /// Load the full open-request snapshot after subscribing.
    SnapshotDue,
    LocationSample(LocationSample),
    /// The location source stopped producing fixes.
    LocationLost,
    /// Event-driven re-poll of nearby requests.
    NearbyPollDue,
    RealtimeChanges(Vec<RideChange>),
    AcceptRequested(String),
    DeclineRequested(String),
    /// Offer window for `ride_id` elapsed; `shown_at` identifies which showing.
    OfferExpired { ride_id: String, shown_at: u64 },
    /// Driver confirms arrival at pickup or at dropoff.
    CompleteStep,
    /// Payment handed off; the finished trip is closed.
    CloseRide,
    RouteResolved {
        version: u64,
        result: Result<RouteSnapshot, RouteError>,
    },
    AnimationFrame { generation: u64 },
    UserPan,
    ReconcileTick { generation: u64 },
    AlertPulse { generation: u64 },
    /// The profile's active session id changed remotely.
    SessionChanged(Option<String>),
}

/// Payload-free discriminant of [`EventKind`], used for schedule conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventTag {
    GoOnline,
    GoOffline,
    SnapshotDue,
    LocationSample,
    LocationLost,
    NearbyPollDue,
    RealtimeChanges,
    AcceptRequested,
    DeclineRequested,
    OfferExpired,
    CompleteStep,
    CloseRide,
    RouteResolved,
    AnimationFrame,
    UserPan,
    ReconcileTick,
    AlertPulse,
    SessionChanged,
}

impl EventKind {
    pub fn tag(&self) -> EventTag {
        match self {
            Self::GoOnline => EventTag::GoOnline,
            Self::GoOffline => EventTag::GoOffline,
            Self::SnapshotDue => EventTag::SnapshotDue,
            Self::LocationSample(_) => EventTag::LocationSample,
            Self::LocationLost => EventTag::LocationLost,
            Self::NearbyPollDue => EventTag::NearbyPollDue,
            Self::RealtimeChanges(_) => EventTag::RealtimeChanges,
            Self::AcceptRequested(_) => EventTag::AcceptRequested,
            Self::DeclineRequested(_) => EventTag::DeclineRequested,
            Self::OfferExpired { .. } => EventTag::OfferExpired,
            Self::CompleteStep => EventTag::CompleteStep,
            Self::CloseRide => EventTag::CloseRide,
            Self::RouteResolved { .. } => EventTag::RouteResolved,
            Self::AnimationFrame { .. } => EventTag::AnimationFrame,
            Self::UserPan => EventTag::UserPan,
            Self::ReconcileTick { .. } => EventTag::ReconcileTick,
            Self::AlertPulse { .. } => EventTag::AlertPulse,
            Self::SessionChanged(_) => EventTag::SessionChanged,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClientEvent {
    pub timestamp: u64,
    seq: u64,
    pub kind: EventKind,
}

impl ClientEvent {
    pub fn tag(&self) -> EventTag {
        self.kind.tag()
    }
}

impl Eq for ClientEvent {}

impl Ord for ClientEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering to make BinaryHeap a min-heap by (timestamp, seq).
        other
            .timestamp
            .cmp(&self.timestamp)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for ClientEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// The event currently being processed by the schedule.
#[derive(Debug, Clone, Resource)]
pub struct CurrentEvent(pub ClientEvent);

#[derive(Debug, Default, Resource)]
pub struct ClientClock {
    now: u64,
    epoch_ms: u64,
    next_seq: u64,
    events: BinaryHeap<ClientEvent>,
}

impl ClientClock {
    /// Clock whose time zero corresponds to `epoch_ms` wall-clock milliseconds.
    pub fn with_epoch(epoch_ms: u64) -> Self {
        Self {
            epoch_ms,
            ..Self::default()
        }
    }

    pub fn now(&self) -> u64 {
        self.now
    }

    pub fn epoch_ms(&self) -> u64 {
        self.epoch_ms
    }

    /// Current wall-clock time in milliseconds.
    pub fn now_wall_ms(&self) -> u64 {
        self.epoch_ms.saturating_add(self.now)
    }

    /// Schedules at an absolute dashboard time. Past timestamps run at `now`.
    pub fn schedule_at(&mut self, timestamp: u64, kind: EventKind) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.events.push(ClientEvent {
            timestamp: timestamp.max(self.now),
            seq,
            kind,
        });
    }

    pub fn schedule_in(&mut self, delay_ms: u64, kind: EventKind) {
        self.schedule_at(self.now.saturating_add(delay_ms), kind);
    }

    pub fn schedule_in_secs(&mut self, secs: u64, kind: EventKind) {
        self.schedule_in(secs.saturating_mul(ONE_SEC_MS), kind);
    }

    pub fn pop_next(&mut self) -> Option<ClientEvent> {
        let event = self.events.pop()?;
        self.now = event.timestamp;
        Some(event)
    }

    /// Moves time forward to `timestamp` without popping anything.
    pub fn advance_to(&mut self, timestamp: u64) {
        let limit = self.next_event_time().unwrap_or(u64::MAX);
        self.now = self.now.max(timestamp.min(limit));
    }

    pub fn next_event_time(&self) -> Option<u64> {
        self.events.peek().map(|e| e.timestamp)
    }

    pub fn pending(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Number of queued events with the given tag.
    pub fn pending_with_tag(&self, tag: EventTag) -> usize {
        self.events.iter().filter(|e| e.tag() == tag).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_pops_events_in_time_order() {
        let mut clock = ClientClock::default();
        clock.schedule_at(20, EventKind::GoOffline);
        clock.schedule_at(5, EventKind::GoOnline);
        clock.schedule_at(20, EventKind::UserPan);
        clock.schedule_at(10, EventKind::SnapshotDue);

        let first = clock.pop_next().expect("first event");
        assert_eq!(first.timestamp, 5);
        assert_eq!(clock.now(), 5);

        let second = clock.pop_next().expect("second event");
        assert_eq!(second.tag(), EventTag::SnapshotDue);

        // Same timestamp: scheduling order wins.
        let third = clock.pop_next().expect("third event");
        assert_eq!(third.kind, EventKind::GoOffline);
        let fourth = clock.pop_next().expect("fourth event");
        assert_eq!(fourth.kind, EventKind::UserPan);

        assert!(clock.pop_next().is_none());
        assert!(clock.is_empty());
    }

    #[test]
    fn relative_scheduling_and_wall_time() {
        let mut clock = ClientClock::with_epoch(1_700_000_000_000);
        clock.schedule_in_secs(1, EventKind::NearbyPollDue);
        assert_eq!(clock.next_event_time(), Some(ONE_SEC_MS));
        let event = clock.pop_next().expect("event");
        assert_eq!(event.timestamp, ONE_SEC_MS);
        assert_eq!(clock.now_wall_ms(), 1_700_000_001_000);

        // Past timestamps are clamped to now.
        clock.schedule_at(0, EventKind::UserPan);
        assert_eq!(clock.next_event_time(), Some(ONE_SEC_MS));
        assert_eq!(clock.pending_with_tag(EventTag::UserPan), 1);
    }
}
