//! Position and heading smoothing for the live vehicle marker.
//!
//! Two independent smoothers, advanced by the animation-frame loop:
//!
//! - [`PositionSmoother`]: first-order lag towards the latest fix, per axis,
//!   with a snap-to-target once the remaining delta is below an epsilon.
//! - [`HeadingSmoother`]: single-step correction along the *shortest* rotation,
//!   so 350° → 10° turns +20° instead of -340°.

use serde::{Deserialize, Serialize};

use crate::geo::{normalize_degrees, GeoPoint};

/// Default interpolation factor for vehicle markers.
pub const DEFAULT_POSITION_FACTOR: f64 = 0.12;
/// Remaining per-axis delta (degrees, ~0.5 m) below which the marker snaps to target.
pub const DEFAULT_SNAP_EPSILON_DEG: f64 = 5e-6;

/// Interpolated marker state, recomputed on every animation tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SmoothedVehicleState {
    pub position: GeoPoint,
    /// Degrees in [0, 360).
    pub heading: f64,
}

/// Signed shortest angular delta from `current` to `target`, in [-180, 180).
pub fn shortest_angle_delta(current: f64, target: f64) -> f64 {
    (target - current + 540.0).rem_euclid(360.0) - 180.0
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SmoothingStep {
    /// The marker moved towards the target and is still short of it.
    Moving,
    /// The marker reached the target on this tick (or already sat on it).
    Settled,
    /// No target; nothing to animate.
    Idle,
}

#[derive(Debug, Clone)]
pub struct PositionSmoother {
    current: Option<GeoPoint>,
    target: Option<GeoPoint>,
    factor: f64,
    epsilon_deg: f64,
}

impl Default for PositionSmoother {
    fn default() -> Self {
        Self::new(DEFAULT_POSITION_FACTOR, DEFAULT_SNAP_EPSILON_DEG)
    }
}

impl PositionSmoother {
    pub fn new(factor: f64, epsilon_deg: f64) -> Self {
        Self {
            current: None,
            target: None,
            factor,
            epsilon_deg,
        }
    }

    pub fn current(&self) -> Option<GeoPoint> {
        self.current
    }

    pub fn target(&self) -> Option<GeoPoint> {
        self.target
    }

    pub fn has_target(&self) -> bool {
        self.target.is_some()
    }

    /// Sets a new target. The very first fix places the marker directly on it.
    pub fn set_target(&mut self, target: GeoPoint) {
        if self.current.is_none() {
            self.current = Some(target);
        }
        self.target = Some(target);
    }

    /// Forgets both target and current position.
    pub fn clear(&mut self) {
        self.current = None;
        self.target = None;
    }

    /// Advances one animation tick.
    pub fn step(&mut self) -> SmoothingStep {
        let (Some(current), Some(target)) = (self.current, self.target) else {
            return SmoothingStep::Idle;
        };
        let dlat = target.lat - current.lat;
        let dlng = target.lng - current.lng;
        if dlat.abs() < self.epsilon_deg && dlng.abs() < self.epsilon_deg {
            self.current = Some(target);
            return SmoothingStep::Settled;
        }
        self.current = Some(GeoPoint {
            lat: current.lat + dlat * self.factor,
            lng: current.lng + dlng * self.factor,
        });
        SmoothingStep::Moving
    }

    pub fn is_settled(&self) -> bool {
        match (self.current, self.target) {
            (Some(current), Some(target)) => current == target,
            _ => true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct HeadingSmoother {
    current: Option<f64>,
}

impl HeadingSmoother {
    pub fn current(&self) -> Option<f64> {
        self.current
    }

    /// Applies the shortest rotation towards `target` in one step and returns the new heading.
    ///
    /// The result is intentionally *not* wrapped: a renderer transitioning the
    /// rotation value must see 350 → 370, not 350 → 10.
    pub fn set_target(&mut self, target: f64) -> f64 {
        let next = match self.current {
            None => normalize_degrees(target),
            Some(current) => current + shortest_angle_delta(current, target),
        };
        self.current = Some(next);
        next
    }

    /// Current heading wrapped into [0, 360).
    pub fn normalized(&self) -> Option<f64> {
        self.current.map(normalize_degrees)
    }

    pub fn clear(&mut self) {
        self.current = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shortest_delta_prefers_short_way() {
        assert_eq!(shortest_angle_delta(350.0, 10.0), 20.0);
        assert_eq!(shortest_angle_delta(10.0, 350.0), -20.0);
        assert_eq!(shortest_angle_delta(90.0, 90.0), 0.0);
        assert_eq!(shortest_angle_delta(0.0, 180.0), -180.0);
    }

    #[test]
    fn heading_turns_the_short_way_across_north() {
        let mut heading = HeadingSmoother::default();
        heading.set_target(350.0);
        let next = heading.set_target(10.0);
        assert_eq!(next - 350.0, 20.0);
        assert_eq!(heading.normalized(), Some(10.0));
    }

    #[test]
    fn position_tick_moves_by_factor_of_delta() {
        let mut smoother = PositionSmoother::new(0.12, 5e-6);
        smoother.set_target(GeoPoint::new(10.0, -66.0));
        smoother.set_target(GeoPoint::new(10.001, -66.001));

        assert_eq!(smoother.step(), SmoothingStep::Moving);
        let current = smoother.current().expect("current");
        let expected_lat = 10.0 + (10.001 - 10.0) * 0.12;
        let expected_lng = -66.0 + (-66.001 - -66.0) * 0.12;
        assert_eq!(current.lat, expected_lat);
        assert_eq!(current.lng, expected_lng);
    }

    #[test]
    fn position_snaps_exactly_onto_target() {
        let target = GeoPoint::new(10.001, -66.001);
        let mut smoother = PositionSmoother::new(0.12, 5e-6);
        smoother.set_target(GeoPoint::new(10.0, -66.0));
        smoother.set_target(target);

        let mut ticks = 0;
        while smoother.step() != SmoothingStep::Settled {
            ticks += 1;
            assert!(ticks < 1_000, "smoother never settled");
        }
        assert_eq!(smoother.current(), Some(target));
        assert!(smoother.is_settled());
        assert_eq!(smoother.step(), SmoothingStep::Settled);
    }

    #[test]
    fn first_fix_places_marker_directly() {
        let mut smoother = PositionSmoother::default();
        assert_eq!(smoother.step(), SmoothingStep::Idle);
        smoother.set_target(GeoPoint::new(1.0, 2.0));
        assert_eq!(smoother.current(), Some(GeoPoint::new(1.0, 2.0)));
        smoother.clear();
        assert!(!smoother.has_target());
        assert_eq!(smoother.step(), SmoothingStep::Idle);
    }
}
