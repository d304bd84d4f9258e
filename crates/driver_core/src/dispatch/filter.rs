//! Dispatch intake filter.
//!
//! Decides which open requests a driver sees. Per batch:
//!
//! 1. Drop anything not `requested`/unassigned or previously declined
//! 2. Vehicle-class gate: the ride class must equal the driver's class
//! 3. Distance gate (inclusive radius), fail-open when either side lacks coordinates
//! 4. Merge with the held list (prepend, or replace on a full snapshot)
//! 5. Deduplicate by id (last write wins), newest first
//! 6. At most one alert per incremental batch, for the most recent new match
//!
//! [`IntakeFilter::apply`] is idempotent: re-applying the same batch yields the
//! same list and no second alert. Realtime pushes, snapshot loads and re-polls
//! all go through it.

use std::collections::{HashMap, HashSet};

use crate::config::DispatchPolicy;
use crate::geo::{distance_km, GeoPoint};

use super::request::RideRequest;
use super::vehicle::VehicleClass;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeMode {
    /// Prepend matches to the held list (realtime inserts, re-polls).
    Incremental,
    /// Replace the held list outright (initial snapshot after subscribing).
    Replace,
}

/// Why a request was admitted or dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    NotOpen,
    Declined,
    VehicleMismatch,
    OutOfRange,
}

/// What the filter knows about the driver for one batch.
#[derive(Debug, Clone, Copy)]
pub struct DriverContext<'a> {
    pub vehicle: VehicleClass,
    /// Last known location, already checked for staleness. `None` fails open.
    pub location: Option<GeoPoint>,
    pub declined: &'a HashSet<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IntakeDrops {
    pub not_open: usize,
    pub declined: usize,
    pub vehicle_mismatch: usize,
    pub out_of_range: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IntakeOutcome {
    /// The driver's new request list, newest first.
    pub requests: Vec<RideRequest>,
    /// Ids present in `requests` that were not held before this batch.
    pub newly_shown: Vec<String>,
    /// Primary payload of the single attention alert for this batch, if any.
    pub alert: Option<RideRequest>,
    pub drops: IntakeDrops,
}

#[derive(Debug, Clone)]
pub struct IntakeFilter {
    radius_km: f64,
}

impl IntakeFilter {
    pub fn new(policy: &DispatchPolicy) -> Self {
        Self {
            radius_km: policy.radius_km,
        }
    }

    pub fn radius_km(&self) -> f64 {
        self.radius_km
    }

    pub fn admit(&self, driver: &DriverContext<'_>, request: &RideRequest) -> Admission {
        if !request.is_open() {
            return Admission::NotOpen;
        }
        if driver.declined.contains(&request.id) {
            return Admission::Declined;
        }
        if request.class != Some(driver.vehicle) {
            return Admission::VehicleMismatch;
        }
        match (driver.location, request.pickup) {
            (Some(here), Some(pickup)) if distance_km(here, pickup) > self.radius_km => {
                Admission::OutOfRange
            }
            // Missing pickup (legacy rows) or unknown driver location: fail open.
            _ => Admission::Admitted,
        }
    }

    pub fn apply(
        &self,
        driver: &DriverContext<'_>,
        held: &[RideRequest],
        batch: &[RideRequest],
        mode: MergeMode,
    ) -> IntakeOutcome {
        let mut drops = IntakeDrops::default();
        let mut admitted = Vec::with_capacity(batch.len());
        for request in batch {
            match self.admit(driver, request) {
                Admission::Admitted => admitted.push(request.clone()),
                Admission::NotOpen => drops.not_open += 1,
                Admission::Declined => drops.declined += 1,
                Admission::VehicleMismatch => drops.vehicle_mismatch += 1,
                Admission::OutOfRange => drops.out_of_range += 1,
            }
        }

        // Merge order: held entries first, batch entries after, so the batch wins.
        let mut by_id: HashMap<String, RideRequest> = HashMap::new();
        if mode == MergeMode::Incremental {
            for request in held {
                by_id.insert(request.id.clone(), request.clone());
            }
        }
        for request in admitted {
            by_id.insert(request.id.clone(), request);
        }

        let mut requests: Vec<RideRequest> = by_id.into_values().collect();
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));

        let held_ids: HashSet<&str> = held.iter().map(|r| r.id.as_str()).collect();
        let newly_shown: Vec<String> = requests
            .iter()
            .filter(|r| !held_ids.contains(r.id.as_str()))
            .map(|r| r.id.clone())
            .collect();

        // `requests` is sorted newest first, so the first new entry is the most recent.
        let alert = match mode {
            MergeMode::Incremental => requests
                .iter()
                .find(|r| !held_ids.contains(r.id.as_str()))
                .cloned(),
            MergeMode::Replace => None,
        };

        tracing::debug!(
            kept = requests.len(),
            new = newly_shown.len(),
            not_open = drops.not_open,
            declined = drops.declined,
            vehicle_mismatch = drops.vehicle_mismatch,
            out_of_range = drops.out_of_range,
            "intake batch filtered"
        );

        IntakeOutcome {
            requests,
            newly_shown,
            alert,
            drops,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::request::RideStatus;

    fn request(id: &str, class: VehicleClass, pickup: Option<GeoPoint>, created_at: u64) -> RideRequest {
        RideRequest {
            id: id.to_string(),
            class: Some(class),
            pickup_label: None,
            dropoff_label: None,
            pickup,
            dropoff: None,
            price: 5.0,
            created_at,
            status: RideStatus::Requested,
            driver_id: None,
            delivery: None,
        }
    }

    fn filter() -> IntakeFilter {
        IntakeFilter::new(&DispatchPolicy::default())
    }

    const DRIVER: GeoPoint = GeoPoint::new(10.480, -66.100);

    #[test]
    fn scenario_type_and_distance_gates() {
        let declined = HashSet::new();
        let driver = DriverContext {
            vehicle: VehicleClass::Standard,
            location: Some(DRIVER),
            declined: &declined,
        };
        let near = GeoPoint::new(10.482, -66.101);
        let batch = vec![
            request("A", VehicleClass::Standard, Some(near), 3),
            request("B", VehicleClass::Moto, Some(near), 2),
            request("C", VehicleClass::Standard, Some(GeoPoint::new(10.60, -66.30)), 1),
        ];
        let outcome = filter().apply(&driver, &[], &batch, MergeMode::Incremental);
        let ids: Vec<&str> = outcome.requests.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["A"]);
        assert_eq!(outcome.drops.vehicle_mismatch, 1);
        assert_eq!(outcome.drops.out_of_range, 1);
        assert_eq!(outcome.alert.map(|r| r.id), Some("A".to_string()));
    }

    #[test]
    fn missing_coordinates_fail_open() {
        let declined = HashSet::new();
        let unknown_driver = DriverContext {
            vehicle: VehicleClass::Van,
            location: None,
            declined: &declined,
        };
        let far = request("far", VehicleClass::Van, Some(GeoPoint::new(40.0, 3.0)), 1);
        assert_eq!(filter().admit(&unknown_driver, &far), Admission::Admitted);

        let located_driver = DriverContext {
            location: Some(DRIVER),
            ..unknown_driver
        };
        let legacy = request("legacy", VehicleClass::Van, None, 1);
        assert_eq!(filter().admit(&located_driver, &legacy), Admission::Admitted);
        assert_eq!(filter().admit(&located_driver, &far), Admission::OutOfRange);
    }

    #[test]
    fn radius_boundary_is_inclusive() {
        let declined = HashSet::new();
        let pickup = GeoPoint::new(10.57, -66.10);
        let exact_km = distance_km(DRIVER, pickup);
        let policy = DispatchPolicy {
            radius_km: exact_km,
            ..DispatchPolicy::default()
        };
        let driver = DriverContext {
            vehicle: VehicleClass::Standard,
            location: Some(DRIVER),
            declined: &declined,
        };
        let at_edge = request("edge", VehicleClass::Standard, Some(pickup), 1);
        assert_eq!(IntakeFilter::new(&policy).admit(&driver, &at_edge), Admission::Admitted);

        let tighter = DispatchPolicy {
            radius_km: exact_km - 1e-6,
            ..DispatchPolicy::default()
        };
        assert_eq!(IntakeFilter::new(&tighter).admit(&driver, &at_edge), Admission::OutOfRange);
    }

    #[test]
    fn reapplying_a_batch_is_idempotent() {
        let declined = HashSet::new();
        let driver = DriverContext {
            vehicle: VehicleClass::Standard,
            location: Some(DRIVER),
            declined: &declined,
        };
        let batch = vec![
            request("x", VehicleClass::Standard, None, 10),
            request("y", VehicleClass::Standard, None, 30),
            request("z", VehicleClass::Standard, None, 20),
        ];
        let first = filter().apply(&driver, &[], &batch, MergeMode::Incremental);
        let second = filter().apply(&driver, &first.requests, &batch, MergeMode::Incremental);
        assert_eq!(first.requests, second.requests);
        assert!(second.alert.is_none());
        assert!(second.newly_shown.is_empty());

        let ids: Vec<&str> = first.requests.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["y", "z", "x"]);
        // One alert per batch, carrying the newest match.
        assert_eq!(first.alert.map(|r| r.id), Some("y".to_string()));
        assert_eq!(first.newly_shown.len(), 3);
    }

    #[test]
    fn duplicate_ids_keep_the_later_merged_record() {
        let declined = HashSet::new();
        let driver = DriverContext {
            vehicle: VehicleClass::Standard,
            location: None,
            declined: &declined,
        };
        let held = vec![request("dup", VehicleClass::Standard, None, 50)];
        let mut newer = request("dup", VehicleClass::Standard, None, 10);
        newer.price = 9.0;
        let outcome = filter().apply(&driver, &held, &[newer.clone()], MergeMode::Incremental);
        assert_eq!(outcome.requests, vec![newer]);
        assert!(outcome.alert.is_none());
    }

    #[test]
    fn replace_mode_drops_held_entries_and_never_alerts() {
        let declined = HashSet::new();
        let driver = DriverContext {
            vehicle: VehicleClass::Standard,
            location: None,
            declined: &declined,
        };
        let held = vec![request("old", VehicleClass::Standard, None, 1)];
        let snapshot = vec![request("fresh", VehicleClass::Standard, None, 2)];
        let outcome = filter().apply(&driver, &held, &snapshot, MergeMode::Replace);
        assert_eq!(outcome.requests.len(), 1);
        assert_eq!(outcome.requests[0].id, "fresh");
        assert_eq!(outcome.newly_shown, vec!["fresh".to_string()]);
        assert!(outcome.alert.is_none());
    }

    #[test]
    fn declined_and_taken_requests_are_dropped() {
        let mut declined = HashSet::new();
        declined.insert("no".to_string());
        let driver = DriverContext {
            vehicle: VehicleClass::Moto,
            location: None,
            declined: &declined,
        };
        let mut taken = request("taken", VehicleClass::Moto, None, 1);
        taken.status = RideStatus::Accepted;
        let batch = vec![request("no", VehicleClass::Moto, None, 2), taken];
        let outcome = filter().apply(&driver, &[], &batch, MergeMode::Incremental);
        assert!(outcome.requests.is_empty());
        assert_eq!(outcome.drops.declined, 1);
        assert_eq!(outcome.drops.not_open, 1);
    }
}
