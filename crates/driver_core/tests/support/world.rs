#![allow(dead_code)]

use std::sync::Arc;

use bevy_ecs::prelude::World;
use driver_core::alert::{Notification, RecordingNotificationSink};
use driver_core::clock::{ClientClock, EventKind};
use driver_core::config::DriverClientConfig;
use driver_core::dashboard::DashboardBuilder;
use driver_core::dispatch::InMemoryRideStore;
use driver_core::geo::GeoPoint;
use driver_core::state::{DriverProfile, RequestBoard};
use driver_core::test_helpers::{sample_at, test_profile, ScriptedRouteProvider, TEST_EPOCH_MS};

/// A dashboard world plus handles on the collaborators it was built with.
pub struct TestDashboard {
    pub world: World,
    pub store: InMemoryRideStore,
    pub sink: RecordingNotificationSink,
    pub routes: ScriptedRouteProvider,
}

impl TestDashboard {
    /// Default dashboard backed by a fresh in-memory store.
    pub fn new() -> Self {
        TestDashboardBuilder::new().build()
    }

    /// Schedule `kind` at absolute dashboard time `at_ms`.
    pub fn schedule(&mut self, at_ms: u64, kind: EventKind) {
        self.world
            .resource_mut::<ClientClock>()
            .schedule_at(at_ms, kind);
    }

    /// Schedule a location fix taken at `at_ms`.
    pub fn fix(&mut self, at_ms: u64, position: GeoPoint) {
        self.schedule(at_ms, EventKind::LocationSample(sample_at(position, at_ms)));
    }

    pub fn board_ids(&self) -> Vec<String> {
        self.world.resource::<RequestBoard>().ids()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.sink.snapshot()
    }

    pub fn count_notifications<F>(&self, predicate: F) -> usize
    where
        F: Fn(&Notification) -> bool,
    {
        self.sink.count_where(predicate)
    }
}

/// Builder for reproducible dashboard worlds.
pub struct TestDashboardBuilder {
    config: DriverClientConfig,
    profile: DriverProfile,
    session_id: String,
    store: InMemoryRideStore,
}

impl Default for TestDashboardBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestDashboardBuilder {
    pub fn new() -> Self {
        Self {
            config: DriverClientConfig::default(),
            profile: test_profile(),
            session_id: "session-a".to_string(),
            store: InMemoryRideStore::new(),
        }
    }

    pub fn with_config(mut self, config: DriverClientConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_profile(mut self, profile: DriverProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn with_session_id(mut self, session_id: &str) -> Self {
        self.session_id = session_id.to_string();
        self
    }

    /// Share a store with another dashboard (clones share the same rows).
    pub fn with_store(mut self, store: InMemoryRideStore) -> Self {
        self.store = store;
        self
    }

    pub fn build(self) -> TestDashboard {
        let sink = RecordingNotificationSink::new();
        let routes = ScriptedRouteProvider::new();
        let world = DashboardBuilder::new(self.profile)
            .with_config(self.config)
            .with_session_id(self.session_id)
            .with_epoch_ms(TEST_EPOCH_MS)
            .with_store(Arc::new(self.store.clone()))
            .with_route_provider(Box::new(routes.clone()))
            .with_notification_sink(Arc::new(sink.clone()))
            .build();
        TestDashboard {
            world,
            store: self.store,
            sink,
            routes,
        }
    }
}
