use std::path::Path;

use bevy_ecs::prelude::Resource;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::geo::DEFAULT_SNAP_THRESHOLD_M;
use crate::smoothing::{DEFAULT_POSITION_FACTOR, DEFAULT_SNAP_EPSILON_DEG};

/// Default dispatch radius (km), inclusive.
const DEFAULT_DISPATCH_RADIUS_KM: f64 = 10.0;

/// Default window after which a driver fix no longer counts as a known location.
const DEFAULT_PRESENCE_STALE_SECS: u64 = 90;

/// Dispatch intake policy. Radius and staleness are policy values, not protocol invariants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchPolicy {
    /// Maximum driver → pickup distance in kilometres (inclusive).
    pub radius_km: f64,
    /// Driver fixes older than this are treated as unknown (fail-open).
    pub presence_stale_secs: u64,
    /// Seconds an offer stays on the board before it is auto-declined. `None` disables.
    pub offer_timeout_secs: Option<u64>,
    /// Interval of the reconciliation backstop poll while online.
    pub reconcile_interval_secs: u64,
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self {
            radius_km: DEFAULT_DISPATCH_RADIUS_KM,
            presence_stale_secs: DEFAULT_PRESENCE_STALE_SECS,
            offer_timeout_secs: Some(15),
            reconcile_interval_secs: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    /// Fraction of the remaining delta covered per animation tick.
    pub position_factor: f64,
    /// Per-axis delta (degrees) below which the marker snaps onto the target.
    pub snap_epsilon_deg: f64,
    pub frame_interval_ms: u64,
    /// Minimum displacement before a heading is derived from consecutive fixes.
    pub bearing_min_move_m: f64,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            position_factor: DEFAULT_POSITION_FACTOR,
            snap_epsilon_deg: DEFAULT_SNAP_EPSILON_DEG,
            frame_interval_ms: 16,
            bearing_min_move_m: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FollowConfig {
    /// User pans within this window after a forced follow are ignored.
    pub force_follow_debounce_ms: u64,
    /// Camera tilt applied on every forced follow.
    pub follow_tilt_deg: f64,
    /// Resume following after this long without user interaction. `None` stays manual.
    pub resume_after_ms: Option<u64>,
}

impl Default for FollowConfig {
    fn default() -> Self {
        Self {
            force_follow_debounce_ms: 2_000,
            follow_tilt_deg: 45.0,
            resume_after_ms: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteConfig {
    /// Origin and destination closer than this (degrees, per axis) are not routed.
    pub same_point_epsilon_deg: f64,
    /// Origin movement (metres) below which the current route is kept.
    pub min_origin_shift_m: f64,
    pub snap_threshold_m: f64,
    pub cache_capacity: usize,
    /// Simulated provider latency used when scheduling `RouteResolved`.
    pub resolve_latency_ms: u64,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            same_point_epsilon_deg: 1e-4,
            min_origin_shift_m: 10.0,
            snap_threshold_m: DEFAULT_SNAP_THRESHOLD_M,
            cache_capacity: 256,
            resolve_latency_ms: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Interval between beeps/vibrations of the looping request alert.
    pub pulse_interval_ms: u64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            pulse_interval_ms: 2_000,
        }
    }
}

/// Full client configuration, stored as an ECS resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Resource)]
#[serde(default)]
pub struct DriverClientConfig {
    pub dispatch: DispatchPolicy,
    pub smoothing: SmoothingConfig,
    pub follow: FollowConfig,
    pub routing: RouteConfig,
    pub alert: AlertConfig,
}

impl DriverClientConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dispatch.radius_km.is_nan() || self.dispatch.radius_km <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "dispatch.radius_km must be positive, got {}",
                self.dispatch.radius_km
            )));
        }
        let factor = self.smoothing.position_factor;
        if factor.is_nan() || factor <= 0.0 || factor > 1.0 {
            return Err(ConfigError::Invalid(format!(
                "smoothing.position_factor must be in (0, 1], got {factor}"
            )));
        }
        if self.smoothing.frame_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "smoothing.frame_interval_ms must be > 0".to_string(),
            ));
        }
        if self.smoothing.snap_epsilon_deg < 0.0
            || self.smoothing.bearing_min_move_m < 0.0
            || self.routing.same_point_epsilon_deg < 0.0
            || self.routing.min_origin_shift_m < 0.0
            || self.routing.snap_threshold_m < 0.0
        {
            return Err(ConfigError::Invalid(
                "distance and epsilon thresholds must not be negative".to_string(),
            ));
        }
        if self.alert.pulse_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "alert.pulse_interval_ms must be > 0".to_string(),
            ));
        }
        if self.dispatch.reconcile_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "dispatch.reconcile_interval_secs must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = DriverClientConfig::default();
        config.validate().expect("defaults validate");
        assert_eq!(config.dispatch.radius_km, 10.0);
        assert_eq!(config.dispatch.presence_stale_secs, 90);
        assert_eq!(config.follow.force_follow_debounce_ms, 2_000);
        assert_eq!(config.routing.snap_threshold_m, 45.0);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config =
            DriverClientConfig::from_json_str(r#"{ "dispatch": { "radius_km": 5.0 } }"#)
                .expect("parse");
        assert_eq!(config.dispatch.radius_km, 5.0);
        assert_eq!(config.dispatch.offer_timeout_secs, Some(15));
        assert_eq!(config.smoothing.position_factor, 0.12);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = DriverClientConfig::from_json_str(r#"{ "dispatch": { "radius_km": 0 } }"#)
            .expect_err("zero radius");
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err =
            DriverClientConfig::from_json_str(r#"{ "smoothing": { "position_factor": 1.5 } }"#)
                .expect_err("factor > 1");
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = DriverClientConfig::from_json_str("{ not json").expect_err("garbage");
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
