//! Realtime ride store: the seam to the managed database.
//!
//! [`RideStore`] covers what the dashboard needs from the backend: open-request
//! snapshots, the proximity query used by re-polls, the compare-and-swap accept,
//! status writes, driver presence and a change feed. [`InMemoryRideStore`] is a
//! complete implementation used by tests, benches and the replay example.

use std::collections::{HashMap, HashSet};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use bevy_ecs::prelude::Resource;
use h3o::{CellIndex, Resolution};

use crate::error::StoreError;
use crate::geo::{distance_km, GeoPoint};
use crate::subscription::Subscription;

use super::request::{RideChange, RideRecord, RideStatus};
use super::vehicle::VehicleClass;

/// H3 resolution of the pickup index (~1.2 km edge).
pub const PICKUP_INDEX_RESOLUTION: Resolution = Resolution::Seven;

/// Server-side proximity query for open requests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearbyQuery {
    pub center: GeoPoint,
    pub radius_km: f64,
    pub class: VehicleClass,
}

/// Result of the conditional accept update.
#[derive(Debug, Clone, PartialEq)]
pub enum AcceptOutcome {
    /// The row was still open and now belongs to this driver.
    Accepted(RideRecord),
    /// Another driver won the race (or the request was withdrawn).
    AlreadyTaken,
    Error(StoreError),
}

/// Driver presence row, upserted on every location sample while online.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriverPresence {
    pub position: GeoPoint,
    pub heading: Option<f64>,
    pub recorded_at_ms: u64,
}

pub trait RideStore: Send + Sync {
    /// Every request currently `requested` and unassigned.
    fn fetch_open_requests(&self) -> Result<Vec<RideRecord>, StoreError>;

    /// Open requests of `query.class` near `query.center`. Rows without pickup
    /// coordinates are always included.
    fn fetch_nearby(&self, query: &NearbyQuery) -> Result<Vec<RideRecord>, StoreError>;

    /// `SET status = accepted, driver_id = ? WHERE status = requested AND driver_id IS NULL`.
    fn try_accept(&self, ride_id: &str, driver_id: &str) -> AcceptOutcome;

    fn update_status(&self, ride_id: &str, status: RideStatus) -> Result<RideRecord, StoreError>;

    /// Current status of each known id; unknown ids are omitted.
    fn fetch_statuses(&self, ride_ids: &[String]) -> Result<Vec<(String, RideStatus)>, StoreError>;

    fn publish_presence(&self, driver_id: &str, presence: DriverPresence) -> Result<(), StoreError>;

    /// Opens a change feed over the requests table.
    fn subscribe(&self) -> Result<RideFeed, StoreError>;
}

/// ECS resource wrapping the shared store.
#[derive(Resource, Clone)]
pub struct RideStoreResource(pub Arc<dyn RideStore>);

/// Live change feed. Dropping it unsubscribes.
#[derive(Debug)]
pub struct RideFeed {
    receiver: Mutex<Receiver<RideChange>>,
    _subscription: Subscription,
}

impl RideFeed {
    pub fn new(receiver: Receiver<RideChange>, subscription: Subscription) -> Self {
        Self {
            receiver: Mutex::new(receiver),
            _subscription: subscription,
        }
    }

    /// Everything delivered since the last drain, in arrival order.
    pub fn drain(&self) -> Vec<RideChange> {
        match self.receiver.lock() {
            Ok(receiver) => receiver.try_iter().collect(),
            Err(_) => Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

#[derive(Default)]
struct StoreInner {
    rides: HashMap<String, RideRecord>,
    pickup_index: HashMap<CellIndex, HashSet<String>>,
    unlocated: HashSet<String>,
    presence: HashMap<String, DriverPresence>,
    next_subscriber: u64,
    subscribers: HashMap<u64, Sender<RideChange>>,
    unavailable: bool,
}

impl StoreInner {
    fn index(&mut self, record: &RideRecord) {
        match record
            .pickup_point()
            .and_then(|p| p.to_cell(PICKUP_INDEX_RESOLUTION))
        {
            Some(cell) => {
                self.pickup_index
                    .entry(cell)
                    .or_default()
                    .insert(record.id.clone());
            }
            None => {
                self.unlocated.insert(record.id.clone());
            }
        }
    }

    fn unindex(&mut self, record: &RideRecord) {
        if let Some(cell) = record
            .pickup_point()
            .and_then(|p| p.to_cell(PICKUP_INDEX_RESOLUTION))
        {
            if let Some(ids) = self.pickup_index.get_mut(&cell) {
                ids.remove(&record.id);
                if ids.is_empty() {
                    self.pickup_index.remove(&cell);
                }
            }
        }
        self.unlocated.remove(&record.id);
    }

    fn broadcast(&mut self, change: RideChange) {
        // Senders whose feed was dropped fail here and are pruned.
        self.subscribers
            .retain(|_, sender| sender.send(change.clone()).is_ok());
    }
}

/// Thread-safe in-memory implementation of [`RideStore`].
#[derive(Clone, Default)]
pub struct InMemoryRideStore {
    inner: Arc<Mutex<StoreInner>>,
}

fn is_open(record: &RideRecord) -> bool {
    record.status == RideStatus::Requested && record.driver_id.is_none()
}

impl InMemoryRideStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreInner>, StoreError> {
        let inner = self
            .inner
            .lock()
            .map_err(|_| StoreError::Unavailable("store mutex poisoned".to_string()))?;
        if inner.unavailable {
            return Err(StoreError::Unavailable("store offline".to_string()));
        }
        Ok(inner)
    }

    /// Inserts a new ride (a passenger request) and notifies subscribers.
    pub fn insert(&self, record: RideRecord) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        if let Some(previous) = inner.rides.remove(&record.id) {
            inner.unindex(&previous);
        }
        inner.index(&record);
        inner.rides.insert(record.id.clone(), record.clone());
        inner.broadcast(RideChange::Inserted(record));
        Ok(())
    }

    /// Applies a status change made by someone else (passenger cancel, other driver).
    pub fn set_status(&self, ride_id: &str, status: RideStatus, driver_id: Option<&str>) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let record = inner
            .rides
            .get_mut(ride_id)
            .ok_or_else(|| StoreError::NotFound(ride_id.to_string()))?;
        record.status = status;
        if let Some(driver_id) = driver_id {
            record.driver_id = Some(driver_id.to_string());
        }
        let updated = record.clone();
        inner.broadcast(RideChange::Updated(updated));
        Ok(())
    }

    pub fn get(&self, ride_id: &str) -> Option<RideRecord> {
        self.inner
            .lock()
            .ok()
            .and_then(|inner| inner.rides.get(ride_id).cloned())
    }

    pub fn presence_of(&self, driver_id: &str) -> Option<DriverPresence> {
        self.inner
            .lock()
            .ok()
            .and_then(|inner| inner.presence.get(driver_id).copied())
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner
            .lock()
            .map(|inner| inner.subscribers.len())
            .unwrap_or(0)
    }

    /// Simulates a backend outage: every call fails with `Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.unavailable = unavailable;
        }
    }
}

impl RideStore for InMemoryRideStore {
    fn fetch_open_requests(&self) -> Result<Vec<RideRecord>, StoreError> {
        let inner = self.lock()?;
        Ok(inner.rides.values().filter(|r| is_open(r)).cloned().collect())
    }

    fn fetch_nearby(&self, query: &NearbyQuery) -> Result<Vec<RideRecord>, StoreError> {
        let inner = self.lock()?;
        let mut candidates: Vec<&String> = inner.unlocated.iter().collect();

        if let Some(center) = query.center.to_cell(PICKUP_INDEX_RESOLUTION) {
            // Ring count errs on the large side; the exact distance check follows.
            let k = (query.radius_km / PICKUP_INDEX_RESOLUTION.edge_length_km()).ceil() as u32 + 1;
            for cell in center.grid_disk::<Vec<_>>(k) {
                if let Some(ids) = inner.pickup_index.get(&cell) {
                    candidates.extend(ids.iter());
                }
            }
        }

        let matches = candidates
            .into_iter()
            .filter_map(|id| inner.rides.get(id))
            .filter(|r| is_open(r))
            .filter(|r| VehicleClass::for_ride(r.ride_type.as_deref()) == Some(query.class))
            .filter(|r| match r.pickup_point() {
                Some(pickup) => distance_km(query.center, pickup) <= query.radius_km,
                None => true,
            })
            .cloned()
            .collect();
        Ok(matches)
    }

    fn try_accept(&self, ride_id: &str, driver_id: &str) -> AcceptOutcome {
        let mut inner = match self.lock() {
            Ok(inner) => inner,
            Err(err) => return AcceptOutcome::Error(err),
        };
        let Some(record) = inner.rides.get_mut(ride_id) else {
            return AcceptOutcome::AlreadyTaken;
        };
        if !is_open(record) {
            return AcceptOutcome::AlreadyTaken;
        }
        record.status = RideStatus::Accepted;
        record.driver_id = Some(driver_id.to_string());
        let accepted = record.clone();
        inner.broadcast(RideChange::Updated(accepted.clone()));
        AcceptOutcome::Accepted(accepted)
    }

    fn update_status(&self, ride_id: &str, status: RideStatus) -> Result<RideRecord, StoreError> {
        let mut inner = self.lock()?;
        let record = inner
            .rides
            .get_mut(ride_id)
            .ok_or_else(|| StoreError::NotFound(ride_id.to_string()))?;
        if !record.status.can_advance_to(status) {
            return Err(StoreError::Rejected(format!(
                "{ride_id}: {:?} -> {:?}",
                record.status, status
            )));
        }
        record.status = status;
        let updated = record.clone();
        inner.broadcast(RideChange::Updated(updated.clone()));
        Ok(updated)
    }

    fn fetch_statuses(&self, ride_ids: &[String]) -> Result<Vec<(String, RideStatus)>, StoreError> {
        let inner = self.lock()?;
        Ok(ride_ids
            .iter()
            .filter_map(|id| inner.rides.get(id).map(|r| (id.clone(), r.status)))
            .collect())
    }

    fn publish_presence(&self, driver_id: &str, presence: DriverPresence) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        inner.presence.insert(driver_id.to_string(), presence);
        Ok(())
    }

    fn subscribe(&self) -> Result<RideFeed, StoreError> {
        let (sender, receiver) = channel();
        let id = {
            let mut inner = self.lock()?;
            let id = inner.next_subscriber;
            inner.next_subscriber += 1;
            inner.subscribers.insert(id, sender);
            id
        };
        let registry: Weak<Mutex<StoreInner>> = Arc::downgrade(&self.inner);
        let subscription = Subscription::new("ride-changes", move || {
            if let Some(inner) = registry.upgrade() {
                if let Ok(mut inner) = inner.lock() {
                    inner.subscribers.remove(&id);
                }
            }
        });
        Ok(RideFeed::new(receiver, subscription))
    }
}
