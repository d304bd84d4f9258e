//! Geo-math primitives: haversine distance, bearings and polyline snapping.
//!
//! This module provides:
//!
//! - **GeoPoint**: a plain (lat, lng) coordinate in degrees
//! - **Distance**: great-circle distance in metres ([`distance_m`]) and kilometres ([`distance_km`])
//! - **Bearing**: initial compass bearing normalized to [0, 360)
//! - **Snapping**: projection onto a segment and onto a route polyline
//!
//! Units are fixed per function name; callers never mix metres and kilometres
//! through the same call site. Haversine error grows with distance but is
//! negligible for sub-100 km urban routing.

use h3o::{CellIndex, LatLng, Resolution};
use serde::{Deserialize, Serialize};

/// Mean Earth radius in metres.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;
/// Mean Earth radius in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6_371.0;
/// Default maximum distance (metres) a fix may be pulled onto the route.
pub const DEFAULT_SNAP_THRESHOLD_M: f64 = 45.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// True when both axes differ by less than `epsilon_deg`.
    pub fn approx_eq(&self, other: &GeoPoint, epsilon_deg: f64) -> bool {
        (self.lat - other.lat).abs() < epsilon_deg && (self.lng - other.lng).abs() < epsilon_deg
    }

    /// H3 cell containing this point, or `None` for out-of-range coordinates.
    pub fn to_cell(&self, resolution: Resolution) -> Option<CellIndex> {
        LatLng::new(self.lat, self.lng)
            .ok()
            .map(|ll| ll.to_cell(resolution))
    }
}

fn central_angle(a: GeoPoint, b: GeoPoint) -> f64 {
    let (lat1, lon1) = (a.lat.to_radians(), a.lng.to_radians());
    let (lat2, lon2) = (b.lat.to_radians(), b.lng.to_radians());
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let sin_dlat = (dlat * 0.5).sin();
    let sin_dlon = (dlon * 0.5).sin();
    let h = sin_dlat * sin_dlat + lat1.cos() * lat2.cos() * sin_dlon * sin_dlon;
    2.0 * h.sqrt().atan2((1.0 - h).sqrt())
}

/// Haversine distance in metres.
pub fn distance_m(a: GeoPoint, b: GeoPoint) -> f64 {
    EARTH_RADIUS_M * central_angle(a, b)
}

/// Haversine distance in kilometres.
pub fn distance_km(a: GeoPoint, b: GeoPoint) -> f64 {
    EARTH_RADIUS_KM * central_angle(a, b)
}

/// Initial compass bearing from `from` to `to`, in [0, 360).
pub fn bearing_degrees(from: GeoPoint, to: GeoPoint) -> f64 {
    let lat1 = from.lat.to_radians();
    let lat2 = to.lat.to_radians();
    let dlon = (to.lng - from.lng).to_radians();
    let y = dlon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();
    normalize_degrees(y.atan2(x).to_degrees())
}

/// Wraps any angle into [0, 360).
pub fn normalize_degrees(deg: f64) -> f64 {
    let wrapped = deg.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs.
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// Orthogonal projection of `point` onto the segment `[start, end]`, clamped to the segment.
///
/// Works in a local equirectangular frame (longitude scaled by `cos(lat)`), which is
/// accurate at route-segment scale. A degenerate segment returns `start`.
pub fn closest_point_on_segment(point: GeoPoint, start: GeoPoint, end: GeoPoint) -> GeoPoint {
    let scale = start.lat.to_radians().cos();
    let dx = (end.lng - start.lng) * scale;
    let dy = end.lat - start.lat;
    let len_sq = dx * dx + dy * dy;
    if len_sq == 0.0 {
        return start;
    }
    let px = (point.lng - start.lng) * scale;
    let py = point.lat - start.lat;
    let t = ((px * dx + py * dy) / len_sq).clamp(0.0, 1.0);
    GeoPoint {
        lat: start.lat + (end.lat - start.lat) * t,
        lng: start.lng + (end.lng - start.lng) * t,
    }
}

/// Pulls `point` onto the closest point of `path` if that point lies within `threshold_m`.
///
/// Sequential scan over every consecutive vertex pair; `path` is a single route,
/// so O(n) is fine. Returns `point` unchanged when the path has fewer than two
/// vertices or the vehicle has genuinely left the route.
pub fn snap_to_polyline(point: GeoPoint, path: &[GeoPoint], threshold_m: f64) -> GeoPoint {
    let mut best: Option<(GeoPoint, f64)> = None;
    for pair in path.windows(2) {
        let candidate = closest_point_on_segment(point, pair[0], pair[1]);
        let dist = distance_m(point, candidate);
        if best.map(|(_, d)| dist < d).unwrap_or(true) {
            best = Some((candidate, dist));
        }
    }
    match best {
        Some((snapped, dist)) if dist <= threshold_m => snapped,
        _ => point,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_units_agree() {
        let a = GeoPoint::new(10.480, -66.100);
        let b = GeoPoint::new(10.600, -66.300);
        let km = distance_km(a, b);
        let m = distance_m(a, b);
        assert!((km * 1000.0 - m).abs() < 1e-6);
        assert!(km > 23.0 && km < 26.0, "got {km}");
    }

    #[test]
    fn distance_to_self_is_zero() {
        let a = GeoPoint::new(52.52, 13.405);
        assert_eq!(distance_m(a, a), 0.0);
    }

    #[test]
    fn bearing_cardinal_directions() {
        let origin = GeoPoint::new(0.0, 0.0);
        assert!((bearing_degrees(origin, GeoPoint::new(1.0, 0.0)) - 0.0).abs() < 1e-9);
        assert!((bearing_degrees(origin, GeoPoint::new(0.0, 1.0)) - 90.0).abs() < 1e-9);
        assert!((bearing_degrees(origin, GeoPoint::new(-1.0, 0.0)) - 180.0).abs() < 1e-9);
        assert!((bearing_degrees(origin, GeoPoint::new(0.0, -1.0)) - 270.0).abs() < 1e-9);
    }

    #[test]
    fn normalize_wraps_negative_and_overflow() {
        assert_eq!(normalize_degrees(-90.0), 270.0);
        assert_eq!(normalize_degrees(720.0), 0.0);
        assert_eq!(normalize_degrees(365.0), 5.0);
    }

    #[test]
    fn projection_clamps_to_segment_ends() {
        let start = GeoPoint::new(0.0, 0.0);
        let end = GeoPoint::new(0.0, 0.01);
        let before = closest_point_on_segment(GeoPoint::new(0.001, -0.005), start, end);
        assert_eq!(before, start);
        let after = closest_point_on_segment(GeoPoint::new(0.001, 0.02), start, end);
        assert_eq!(after, end);
        let mid = closest_point_on_segment(GeoPoint::new(0.001, 0.005), start, end);
        assert!((mid.lng - 0.005).abs() < 1e-12);
        assert_eq!(mid.lat, 0.0);
    }

    #[test]
    fn degenerate_segment_returns_start() {
        let start = GeoPoint::new(10.0, -66.0);
        let snapped = closest_point_on_segment(GeoPoint::new(10.1, -66.1), start, start);
        assert_eq!(snapped, start);
    }

    #[test]
    fn snap_pulls_near_points_and_ignores_far_ones() {
        let path = [
            GeoPoint::new(10.0, -66.0),
            GeoPoint::new(10.0, -65.99),
            GeoPoint::new(10.01, -65.99),
        ];
        // ~22 m north of the first segment.
        let near = GeoPoint::new(10.0002, -65.995);
        let snapped = snap_to_polyline(near, &path, DEFAULT_SNAP_THRESHOLD_M);
        assert!((snapped.lat - 10.0).abs() < 1e-9);
        assert!((snapped.lng - -65.995).abs() < 1e-9);

        // ~110 m away: a real detour, left alone.
        let far = GeoPoint::new(10.001, -65.995);
        assert_eq!(snap_to_polyline(far, &path, DEFAULT_SNAP_THRESHOLD_M), far);
    }

    #[test]
    fn snap_picks_globally_closest_segment() {
        let path = [
            GeoPoint::new(10.0, -66.0),
            GeoPoint::new(10.0, -65.99),
            GeoPoint::new(10.01, -65.99),
        ];
        // Next to the second (vertical) segment.
        let point = GeoPoint::new(10.005, -65.9901);
        let snapped = snap_to_polyline(point, &path, DEFAULT_SNAP_THRESHOLD_M);
        assert!((snapped.lng - -65.99).abs() < 1e-9);
        assert!((snapped.lat - 10.005).abs() < 1e-9);
    }

    #[test]
    fn snap_without_path_is_identity() {
        let point = GeoPoint::new(1.0, 2.0);
        assert_eq!(snap_to_polyline(point, &[], 45.0), point);
        assert_eq!(snap_to_polyline(point, &[point], 45.0), point);
    }
}
