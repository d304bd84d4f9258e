use serde::{Deserialize, Serialize};

/// Normalized vehicle class shared by ride types and driver vehicles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleClass {
    Moto,
    Standard,
    Van,
}

impl VehicleClass {
    /// Maps a raw vehicle/ride-type string onto a class. Unknown words map to `None`.
    pub fn from_raw(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "moto" | "motorcycle" | "motocicleta" | "bike" => Some(Self::Moto),
            "standard" | "car" | "carro" | "auto" | "sedan" => Some(Self::Standard),
            "van" | "camioneta" | "truck" => Some(Self::Van),
            _ => None,
        }
    }

    /// Class of a driver's vehicle. Missing or unrecognized vehicles default to `Standard`.
    pub fn for_driver(raw: Option<&str>) -> Self {
        raw.and_then(Self::from_raw).unwrap_or(Self::Standard)
    }

    /// Class of a ride request. A missing type is a standard ride; an unknown
    /// type matches no driver.
    pub fn for_ride(raw: Option<&str>) -> Option<Self> {
        match raw {
            None => Some(Self::Standard),
            Some(raw) if raw.trim().is_empty() => Some(Self::Standard),
            Some(raw) => Self::from_raw(raw),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Moto => "moto",
            Self::Standard => "standard",
            Self::Van => "van",
        }
    }
}
