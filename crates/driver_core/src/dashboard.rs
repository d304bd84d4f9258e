//! Dashboard assembly and reset.
//!
//! [`DashboardBuilder`] inserts every resource the schedule reads, with the
//! in-memory store, the tracing sink and the straight-line router as defaults.
//! [`reset_dashboard_state`] is the only place state is torn down wholesale.

use std::sync::Arc;

use bevy_ecs::prelude::World;

use crate::alert::{
    AlertController, Notification, NotificationSink, NotificationSinkResource,
    TracingNotificationSink,
};
use crate::clock::{ClientClock, EventKind};
use crate::config::DriverClientConfig;
use crate::dispatch::{InMemoryRideStore, RideStore, RideStoreResource};
use crate::follow::{FollowCamera, ForceFollowReason};
use crate::routing::{
    build_route_provider, RouteProvider, RouteProviderKind, RouteProviderResource, RouteTracker,
};
use crate::state::{
    ActiveTrip, DeclinedRequests, DriverLocation, DriverProfile, FrameLoop, MarkerState,
    OnlineStatus, PendingReset, RealtimeFeeds, ReconcileLoop, RequestBoard, ResetScope,
    RouteOutbox, SessionGuard,
};
use crate::telemetry::DashboardTelemetry;

/// Default local session id when none is supplied.
const DEFAULT_SESSION_ID: &str = "local";

/// Builds a dashboard [`World`] for one driver.
pub struct DashboardBuilder {
    profile: DriverProfile,
    config: DriverClientConfig,
    session_id: String,
    epoch_ms: u64,
    store: Option<Arc<dyn RideStore>>,
    route_provider: Option<Box<dyn RouteProvider>>,
    route_provider_kind: RouteProviderKind,
    sink: Option<Arc<dyn NotificationSink>>,
}

impl DashboardBuilder {
    pub fn new(profile: DriverProfile) -> Self {
        Self {
            profile,
            config: DriverClientConfig::default(),
            session_id: DEFAULT_SESSION_ID.to_string(),
            epoch_ms: 0,
            store: None,
            route_provider: None,
            route_provider_kind: RouteProviderKind::default(),
            sink: None,
        }
    }

    pub fn with_config(mut self, config: DriverClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Session id this device registered on the profile.
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    /// Wall-clock time (ms) that dashboard time zero corresponds to.
    pub fn with_epoch_ms(mut self, epoch_ms: u64) -> Self {
        self.epoch_ms = epoch_ms;
        self
    }

    pub fn with_store(mut self, store: Arc<dyn RideStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Use this provider as is, bypassing the LRU cache.
    pub fn with_route_provider(mut self, provider: Box<dyn RouteProvider>) -> Self {
        self.route_provider = Some(provider);
        self
    }

    /// Build a cached provider of this kind. Ignored when an explicit provider is set.
    pub fn with_route_provider_kind(mut self, kind: RouteProviderKind) -> Self {
        self.route_provider_kind = kind;
        self
    }

    pub fn with_notification_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn build(self) -> World {
        let mut world = World::new();

        let store = self
            .store
            .unwrap_or_else(|| Arc::new(InMemoryRideStore::new()));
        let provider = self.route_provider.unwrap_or_else(|| {
            build_route_provider(&self.route_provider_kind, self.config.routing.cache_capacity)
        });
        let sink = self
            .sink
            .unwrap_or_else(|| Arc::new(TracingNotificationSink));

        world.insert_resource(ClientClock::with_epoch(self.epoch_ms));
        world.insert_resource(MarkerState::new(&self.config.smoothing));
        world.insert_resource(self.config);
        world.insert_resource(SessionGuard {
            local_session_id: self.session_id,
            signed_out: false,
        });
        world.insert_resource(self.profile);
        world.insert_resource(RideStoreResource(store));
        world.insert_resource(RouteProviderResource(provider));
        world.insert_resource(NotificationSinkResource(sink));

        world.insert_resource(OnlineStatus::default());
        world.insert_resource(DriverLocation::default());
        world.insert_resource(RequestBoard::default());
        world.insert_resource(DeclinedRequests::default());
        world.insert_resource(ActiveTrip::default());
        world.insert_resource(RouteTracker::default());
        world.insert_resource(RouteOutbox::default());
        world.insert_resource(FollowCamera::default());
        world.insert_resource(FrameLoop::default());
        world.insert_resource(ReconcileLoop::default());
        world.insert_resource(RealtimeFeeds::default());
        world.insert_resource(AlertController::default());
        world.insert_resource(PendingReset::default());
        world.insert_resource(DashboardTelemetry::default());

        world
    }
}

/// Tears dashboard state down to `scope`.
///
/// `Trip` drops the trip and its route; the board refills from a fresh snapshot
/// if the driver is still online. `Full` returns to a freshly opened, offline
/// dashboard. Configuration, collaborators, the profile and telemetry survive
/// both.
pub fn reset_dashboard_state(world: &mut World, scope: ResetScope) {
    world.resource_mut::<ActiveTrip>().clear();
    world.resource_mut::<RouteTracker>().clear();
    world.resource_mut::<RouteOutbox>().requests.clear();

    if scope == ResetScope::Full {
        {
            let mut status = world.resource_mut::<OnlineStatus>();
            status.online = false;
            status.since_ms = None;
        }
        world.resource_mut::<RealtimeFeeds>().rides = None;
        world.resource_mut::<RequestBoard>().clear();
        world.resource_mut::<DeclinedRequests>().ids.clear();
        world.resource_mut::<DriverLocation>().clear();
        world.resource_mut::<MarkerState>().clear();
        world.resource_mut::<FrameLoop>().cancel();
        world.insert_resource(FollowCamera::default());
        world.resource_mut::<ReconcileLoop>().cancel();

        let stopped = world.resource_mut::<AlertController>().stop();
        if stopped {
            world
                .resource::<NotificationSinkResource>()
                .0
                .notify(Notification::AlertStopped);
        }
        tracing::info!("dashboard reset to signed-out state");
        return;
    }

    let now = world.resource::<ClientClock>().now();
    let follow = world.resource::<DriverClientConfig>().follow.clone();
    world
        .resource_mut::<FollowCamera>()
        .force_follow(now, ForceFollowReason::TripChanged, &follow);

    let online = world.resource::<OnlineStatus>().online;
    if online {
        world
            .resource_mut::<ClientClock>()
            .schedule_in(0, EventKind::SnapshotDue);
    }
    tracing::info!(online, "trip state reset");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::EventTag;
    use crate::dispatch::{RideRecord, RideRequest, RideStatus};
    use crate::geo::GeoPoint;
    use crate::state::{AccountStatus, LocationSample};

    fn profile() -> DriverProfile {
        DriverProfile {
            driver_id: "driver-1".to_string(),
            vehicle_type: Some("carro".to_string()),
            account_status: AccountStatus::Active,
        }
    }

    fn ride() -> RideRecord {
        RideRecord {
            id: "ride-1".to_string(),
            ride_type: Some("carro".to_string()),
            pickup: None,
            dropoff: None,
            pickup_lat: Some(10.48),
            pickup_lng: Some(-66.1),
            dropoff_lat: Some(10.5),
            dropoff_lng: Some(-66.9),
            price: 4.0,
            created_at: 0,
            status: RideStatus::Accepted,
            driver_id: Some("driver-1".to_string()),
            delivery_info: None,
        }
    }

    #[test]
    fn trip_reset_keeps_session_and_requests_snapshot_when_online() {
        let mut world = DashboardBuilder::new(profile()).build();
        world
            .resource_mut::<ActiveTrip>()
            .start(RideRequest::from_record(&ride()));
        world.resource_mut::<OnlineStatus>().online = true;

        reset_dashboard_state(&mut world, ResetScope::Trip);

        assert!(!world.resource::<ActiveTrip>().is_active());
        assert!(world.resource::<OnlineStatus>().online);
        assert_eq!(
            world
                .resource::<ClientClock>()
                .pending_with_tag(EventTag::SnapshotDue),
            1
        );
        assert_eq!(
            world.resource::<FollowCamera>().last_reason(),
            Some(ForceFollowReason::TripChanged)
        );
    }

    #[test]
    fn full_reset_goes_offline_and_forgets_location() {
        let mut world = DashboardBuilder::new(profile()).build();
        world.resource_mut::<OnlineStatus>().online = true;
        world.resource_mut::<DeclinedRequests>().ids.insert("x".into());
        world.resource_mut::<DriverLocation>().record(
            LocationSample {
                position: GeoPoint::new(10.48, -66.1),
                heading: None,
                recorded_at_ms: 0,
            },
            2.0,
        );

        reset_dashboard_state(&mut world, ResetScope::Full);

        assert!(!world.resource::<OnlineStatus>().online);
        assert!(world.resource::<DeclinedRequests>().ids.is_empty());
        assert!(world.resource::<DriverLocation>().position().is_none());
        assert_eq!(world.resource::<DriverProfile>().driver_id, "driver-1");
        assert!(world.resource::<ClientClock>().is_empty());
    }
}
