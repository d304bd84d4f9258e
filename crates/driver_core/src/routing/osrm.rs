//! OSRM-backed route provider (feature `osrm`).

use std::time::Duration;

use reqwest::blocking::Client;
use serde::Deserialize;

use super::{RouteProvider, RouteSnapshot, RouteStep};
use crate::error::RouteError;
use crate::geo::GeoPoint;

/// Routes via an OSRM HTTP endpoint.
pub struct OsrmRouteProvider {
    client: Client,
    endpoint: String,
}

impl OsrmRouteProvider {
    pub fn new(endpoint: &str) -> Result<Self, RouteError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .map_err(|err| RouteError::Provider(err.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }
}

/// Minimal OSRM JSON response structures.
#[derive(Deserialize)]
struct OsrmResponse {
    code: String,
    routes: Option<Vec<OsrmRoute>>,
}

#[derive(Deserialize)]
struct OsrmRoute {
    distance: f64, // metres
    duration: f64, // seconds
    geometry: OsrmGeometry,
    #[serde(default)]
    legs: Vec<OsrmLeg>,
}

#[derive(Deserialize)]
struct OsrmGeometry {
    coordinates: Vec<Vec<f64>>, // [lng, lat]
}

#[derive(Deserialize)]
struct OsrmLeg {
    #[serde(default)]
    steps: Vec<OsrmStep>,
}

#[derive(Deserialize)]
struct OsrmStep {
    distance: f64,
    #[serde(default)]
    name: String,
    maneuver: OsrmManeuver,
}

#[derive(Deserialize)]
struct OsrmManeuver {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    modifier: Option<String>,
    #[serde(default)]
    bearing_after: f64,
}

fn instruction_text(step: &OsrmStep) -> String {
    let action = match step.maneuver.modifier.as_deref() {
        Some(modifier) => format!("{} {}", step.maneuver.kind, modifier),
        None => step.maneuver.kind.clone(),
    };
    if step.name.is_empty() {
        action
    } else {
        format!("{action} onto {}", step.name)
    }
}

impl RouteProvider for OsrmRouteProvider {
    fn route(&self, origin: GeoPoint, destination: GeoPoint) -> Result<RouteSnapshot, RouteError> {
        let url = format!(
            "{}/route/v1/driving/{},{};{},{}?overview=full&geometries=geojson&steps=true",
            self.endpoint, origin.lng, origin.lat, destination.lng, destination.lat,
        );

        let resp: OsrmResponse = self
            .client
            .get(&url)
            .send()
            .map_err(|err| RouteError::Provider(err.to_string()))?
            .json()
            .map_err(|err| RouteError::Decode(err.to_string()))?;

        if resp.code != "Ok" {
            return Err(RouteError::Provider(resp.code));
        }

        let route = resp
            .routes
            .and_then(|routes| routes.into_iter().next())
            .ok_or(RouteError::NoRoute)?;

        let path = route
            .geometry
            .coordinates
            .iter()
            .filter(|c| c.len() >= 2)
            .map(|c| GeoPoint::new(c[1], c[0])) // OSRM returns [lng, lat]
            .collect::<Vec<_>>();
        if path.len() < 2 {
            return Err(RouteError::NoRoute);
        }

        let steps = route
            .legs
            .iter()
            .flat_map(|leg| leg.steps.iter())
            .map(|step| RouteStep {
                instruction: instruction_text(step),
                bearing_deg: step.maneuver.bearing_after,
                distance_m: step.distance,
            })
            .collect();

        Ok(RouteSnapshot {
            path,
            steps,
            distance_m: route.distance,
            duration_secs: route.duration,
        })
    }
}
