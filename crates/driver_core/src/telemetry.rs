//! Dashboard counters, for replays and assertions.

use bevy_ecs::prelude::Resource;

#[derive(Debug, Clone, Default, PartialEq, Eq, Resource)]
pub struct DashboardTelemetry {
    pub batches_filtered: u64,
    pub requests_shown: u64,
    pub alerts_fired: u64,
    pub requests_expired: u64,
    pub requests_declined: u64,
    pub requests_gone: u64,
    pub accepts_won: u64,
    pub accepts_lost: u64,
    pub store_errors: u64,
    pub routes_requested: u64,
    pub routes_applied: u64,
    pub routes_stale: u64,
    pub routes_failed: u64,
    pub trips_completed: u64,
    pub trips_cancelled: u64,
}
