//! Pluggable route providers: trait abstraction for routing backends.
//!
//! Implementations, selectable via [`RouteProviderKind`]:
//!
//! - **`StraightLineRouteProvider`**: Two-vertex path + Haversine estimate. Zero dependencies.
//! - **`OsrmRouteProvider`** (feature `osrm`): Calls a local/remote OSRM HTTP endpoint.
//!
//! The provider is stored as a `Box<dyn RouteProvider>` ECS resource. Requests
//! are never issued from inside systems; the route planner queues a
//! [`tracker::RouteRequest`] and the runner resolves it, so a slow or stale
//! answer cannot overwrite a newer route (see [`tracker::RouteTracker`]).

use std::num::NonZeroUsize;
use std::sync::Mutex;

use bevy_ecs::prelude::Resource;
use lru::LruCache;
use serde::{Deserialize, Serialize};

use crate::error::RouteError;
use crate::geo::{bearing_degrees, distance_m, GeoPoint};

pub mod tracker;

#[cfg(feature = "osrm")]
pub mod osrm;

pub use tracker::{RouteApply, RoutePhase, RouteRequest, RouteTracker};

// ---------------------------------------------------------------------------
// Core types
// ---------------------------------------------------------------------------

/// One navigation step of a route.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RouteStep {
    pub instruction: String,
    /// Compass bearing (degrees) the vehicle should hold after the maneuver.
    pub bearing_deg: f64,
    pub distance_m: f64,
}

/// Result of a route query between origin and destination.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RouteSnapshot {
    /// Overview path as ordered (lat, lng) vertices.
    pub path: Vec<GeoPoint>,
    pub steps: Vec<RouteStep>,
    pub distance_m: f64,
    pub duration_secs: f64,
}

impl RouteSnapshot {
    pub fn next_step(&self) -> Option<&RouteStep> {
        self.steps.first()
    }

    /// Rough ETA in whole minutes, rounded up.
    pub fn eta_minutes(&self) -> u64 {
        (self.duration_secs / 60.0).ceil().max(0.0) as u64
    }
}

/// Which routing backend to use.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub enum RouteProviderKind {
    /// Straight line between the endpoints, zero external dependencies.
    #[default]
    StraightLine,
    /// OSRM HTTP endpoint (e.g. `"http://localhost:5000"`).
    #[cfg(feature = "osrm")]
    Osrm { endpoint: String },
}

/// Trait for routing backends. Implementations must be `Send + Sync` so the
/// provider can be stored as a shared ECS resource.
pub trait RouteProvider: Send + Sync {
    fn route(&self, origin: GeoPoint, destination: GeoPoint) -> Result<RouteSnapshot, RouteError>;
}

/// ECS resource wrapping a boxed route provider.
#[derive(Resource)]
pub struct RouteProviderResource(pub Box<dyn RouteProvider>);

// ---------------------------------------------------------------------------
// Straight-line provider (always available)
// ---------------------------------------------------------------------------

/// Average city speed used to estimate straight-line durations.
const STRAIGHT_LINE_SPEED_KMH: f64 = 40.0;

pub struct StraightLineRouteProvider;

impl RouteProvider for StraightLineRouteProvider {
    fn route(&self, origin: GeoPoint, destination: GeoPoint) -> Result<RouteSnapshot, RouteError> {
        let distance = distance_m(origin, destination);
        let duration_secs = if distance > 0.0 {
            (distance / 1000.0 / STRAIGHT_LINE_SPEED_KMH) * 3600.0
        } else {
            0.0
        };
        Ok(RouteSnapshot {
            path: vec![origin, destination],
            steps: vec![RouteStep {
                instruction: "Head to destination".to_string(),
                bearing_deg: bearing_degrees(origin, destination),
                distance_m: distance,
            }],
            distance_m: distance,
            duration_secs,
        })
    }
}

// ---------------------------------------------------------------------------
// Caching wrapper
// ---------------------------------------------------------------------------

/// Endpoints are rounded to ~1 m before keying the cache.
fn cache_key(origin: GeoPoint, destination: GeoPoint) -> (i64, i64, i64, i64) {
    let q = |v: f64| (v * 1e5).round() as i64;
    (q(origin.lat), q(origin.lng), q(destination.lat), q(destination.lng))
}

/// LRU-cached wrapper around any [`RouteProvider`].
///
/// On inner failure the optional straight-line fallback is tried before the
/// error is returned. Failures are never cached.
pub struct CachedRouteProvider {
    inner: Box<dyn RouteProvider>,
    cache: Mutex<LruCache<(i64, i64, i64, i64), RouteSnapshot>>,
    fallback_to_straight_line: bool,
}

impl CachedRouteProvider {
    pub fn new(inner: Box<dyn RouteProvider>, capacity: usize, fallback_to_straight_line: bool) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner,
            cache: Mutex::new(LruCache::new(capacity)),
            fallback_to_straight_line,
        }
    }
}

impl RouteProvider for CachedRouteProvider {
    fn route(&self, origin: GeoPoint, destination: GeoPoint) -> Result<RouteSnapshot, RouteError> {
        let key = cache_key(origin, destination);

        if let Ok(mut cache) = self.cache.lock() {
            if let Some(cached) = cache.get(&key) {
                return Ok(cached.clone());
            }
        }

        let result = match self.inner.route(origin, destination) {
            Ok(route) => Ok(route),
            Err(err) if self.fallback_to_straight_line => {
                tracing::warn!(error = %err, "route provider failed, using straight line");
                StraightLineRouteProvider.route(origin, destination)
            }
            Err(err) => Err(err),
        };

        if let Ok(route) = &result {
            if let Ok(mut cache) = self.cache.lock() {
                cache.put(key, route.clone());
            }
        }

        result
    }
}

// ---------------------------------------------------------------------------
// Factory: build a provider from RouteProviderKind
// ---------------------------------------------------------------------------

/// Construct a boxed [`RouteProvider`] from a [`RouteProviderKind`] descriptor.
///
/// `StraightLine` is returned bare; `Osrm` is wrapped in a [`CachedRouteProvider`]
/// with straight-line fallback.
#[cfg_attr(not(feature = "osrm"), allow(unused_variables))]
pub fn build_route_provider(kind: &RouteProviderKind, cache_capacity: usize) -> Box<dyn RouteProvider> {
    match kind {
        RouteProviderKind::StraightLine => Box::new(StraightLineRouteProvider),

        #[cfg(feature = "osrm")]
        RouteProviderKind::Osrm { endpoint } => match osrm::OsrmRouteProvider::new(endpoint) {
            Ok(inner) => Box::new(CachedRouteProvider::new(Box::new(inner), cache_capacity, true)),
            Err(err) => {
                tracing::warn!(error = %err, endpoint = %endpoint, "failed to build OSRM client, falling back to straight line");
                Box::new(StraightLineRouteProvider)
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingProvider {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    impl RouteProvider for CountingProvider {
        fn route(&self, origin: GeoPoint, destination: GeoPoint) -> Result<RouteSnapshot, RouteError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(RouteError::Provider("down".to_string()));
            }
            StraightLineRouteProvider.route(origin, destination)
        }
    }

    #[test]
    fn straight_line_route_has_two_vertices_and_eta() {
        let origin = GeoPoint::new(10.48, -66.10);
        let destination = GeoPoint::new(10.50, -66.10);
        let route = StraightLineRouteProvider
            .route(origin, destination)
            .expect("route");
        assert_eq!(route.path, vec![origin, destination]);
        assert!((route.distance_m - 2_224.0).abs() < 5.0);
        // 2.2 km at 40 km/h is a little over 3 minutes.
        assert_eq!(route.eta_minutes(), 4);
        let step = route.next_step().expect("step");
        assert!(step.bearing_deg.abs() < 1e-9);
    }

    #[test]
    fn cached_provider_hits_cache_on_repeat() {
        let calls = Arc::new(AtomicUsize::new(0));
        let provider = CachedRouteProvider::new(
            Box::new(CountingProvider {
                calls: calls.clone(),
                fail: false,
            }),
            8,
            false,
        );
        let a = GeoPoint::new(1.0, 1.0);
        let b = GeoPoint::new(1.01, 1.0);
        provider.route(a, b).expect("first");
        provider.route(a, b).expect("second");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn cached_provider_falls_back_and_does_not_cache_errors() {
        let calls = Arc::new(AtomicUsize::new(0));
        let strict = CachedRouteProvider::new(
            Box::new(CountingProvider {
                calls: calls.clone(),
                fail: true,
            }),
            8,
            false,
        );
        let a = GeoPoint::new(1.0, 1.0);
        let b = GeoPoint::new(1.01, 1.0);
        assert!(strict.route(a, b).is_err());
        assert!(strict.route(a, b).is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        let lenient = CachedRouteProvider::new(
            Box::new(CountingProvider {
                calls: Arc::new(AtomicUsize::new(0)),
                fail: true,
            }),
            8,
            true,
        );
        let route = lenient.route(a, b).expect("fallback");
        assert_eq!(route.path.len(), 2);
    }
}
