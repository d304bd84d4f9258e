//! Dispatch intake: ride records, vehicle matching, the intake filter and the store seam.

pub mod delivery;
pub mod filter;
pub mod request;
pub mod store;
pub mod vehicle;

pub use delivery::{parse_delivery_info, DeliveryInfo, DeliveryParse, Payer};
pub use filter::{Admission, DriverContext, IntakeDrops, IntakeFilter, IntakeOutcome, MergeMode};
pub use request::{RideChange, RideRecord, RideRequest, RideStatus};
pub use store::{
    AcceptOutcome, DriverPresence, InMemoryRideStore, NearbyQuery, RideFeed, RideStore,
    RideStoreResource,
};
pub use vehicle::VehicleClass;
