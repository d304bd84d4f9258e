use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::delivery::{parse_delivery_info, DeliveryInfo, DeliveryParse};
use super::vehicle::VehicleClass;
use crate::geo::GeoPoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RideStatus {
    Requested,
    Accepted,
    InProgress,
    Completed,
    Cancelled,
}

impl RideStatus {
    fn rank(self) -> u8 {
        match self {
            Self::Requested => 0,
            Self::Accepted => 1,
            Self::InProgress => 2,
            Self::Completed | Self::Cancelled => 3,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Status only moves forward; `Cancelled` is reachable from any non-terminal state.
    pub fn can_advance_to(self, next: RideStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        next == Self::Cancelled || next.rank() > self.rank()
    }
}

/// A ride row as the realtime store delivers it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RideRecord {
    pub id: String,
    #[serde(rename = "type", alias = "ride_type", default)]
    pub ride_type: Option<String>,
    #[serde(default)]
    pub pickup: Option<String>,
    #[serde(default)]
    pub dropoff: Option<String>,
    #[serde(default)]
    pub pickup_lat: Option<f64>,
    #[serde(default)]
    pub pickup_lng: Option<f64>,
    #[serde(default)]
    pub dropoff_lat: Option<f64>,
    #[serde(default)]
    pub dropoff_lng: Option<f64>,
    #[serde(default)]
    pub price: f64,
    /// Creation time, milliseconds since the epoch.
    pub created_at: u64,
    pub status: RideStatus,
    #[serde(default)]
    pub driver_id: Option<String>,
    #[serde(default)]
    pub delivery_info: Option<Value>,
}

impl RideRecord {
    pub fn pickup_point(&self) -> Option<GeoPoint> {
        match (self.pickup_lat, self.pickup_lng) {
            (Some(lat), Some(lng)) => Some(GeoPoint::new(lat, lng)),
            _ => None,
        }
    }

    pub fn dropoff_point(&self) -> Option<GeoPoint> {
        match (self.dropoff_lat, self.dropoff_lng) {
            (Some(lat), Some(lng)) => Some(GeoPoint::new(lat, lng)),
            _ => None,
        }
    }
}

/// A normalized ride request as the dashboard holds it.
#[derive(Debug, Clone, PartialEq)]
pub struct RideRequest {
    pub id: String,
    /// `None` when the raw ride type is unrecognized; such requests match no driver.
    pub class: Option<VehicleClass>,
    pub pickup_label: Option<String>,
    pub dropoff_label: Option<String>,
    pub pickup: Option<GeoPoint>,
    pub dropoff: Option<GeoPoint>,
    pub price: f64,
    pub created_at: u64,
    pub status: RideStatus,
    pub driver_id: Option<String>,
    pub delivery: Option<DeliveryInfo>,
}

impl RideRequest {
    pub fn from_record(record: &RideRecord) -> Self {
        let delivery = match &record.delivery_info {
            None | Some(Value::Null) => None,
            Some(raw) => match parse_delivery_info(raw) {
                DeliveryParse::Parsed(info) => Some(info),
                DeliveryParse::Invalid => {
                    tracing::warn!(ride_id = %record.id, "dropping malformed delivery metadata");
                    None
                }
            },
        };
        Self {
            id: record.id.clone(),
            class: VehicleClass::for_ride(record.ride_type.as_deref()),
            pickup_label: record.pickup.clone(),
            dropoff_label: record.dropoff.clone(),
            pickup: record.pickup_point(),
            dropoff: record.dropoff_point(),
            price: record.price,
            created_at: record.created_at,
            status: record.status,
            driver_id: record.driver_id.clone(),
            delivery,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == RideStatus::Requested && self.driver_id.is_none()
    }
}

/// Row-level change pushed by the realtime store.
#[derive(Debug, Clone, PartialEq)]
pub enum RideChange {
    Inserted(RideRecord),
    Updated(RideRecord),
}

impl RideChange {
    pub fn record(&self) -> &RideRecord {
        match self {
            Self::Inserted(record) | Self::Updated(record) => record,
        }
    }
}
