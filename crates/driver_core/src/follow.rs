//! Follow-camera state machine.
//!
//! `Following` tracks the vehicle (center + heading on every tick); `Manual`
//! leaves the camera where the user put it. A user pan only counts once the
//! force-follow debounce window has elapsed, because re-centering the map
//! programmatically emits drag events of its own.

use bevy_ecs::prelude::Resource;

use crate::config::FollowConfig;
use crate::geo::GeoPoint;
use crate::smoothing::SmoothedVehicleState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowMode {
    Following,
    Manual,
}

/// Why the camera was forced back into `Following`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForceFollowReason {
    DestinationChanged,
    TripChanged,
    NavStepChanged,
    /// The vehicle position went from absent to present (e.g. going online).
    VehicleAppeared,
}

#[derive(Debug, Clone, Resource)]
pub struct FollowCamera {
    mode: FollowMode,
    tilt_deg: f64,
    heading_deg: f64,
    center: Option<GeoPoint>,
    last_user_interaction_ms: Option<u64>,
    last_forced_follow_ms: Option<u64>,
    last_reason: Option<ForceFollowReason>,
}

impl Default for FollowCamera {
    fn default() -> Self {
        Self {
            mode: FollowMode::Following,
            tilt_deg: 0.0,
            heading_deg: 0.0,
            center: None,
            last_user_interaction_ms: None,
            last_forced_follow_ms: None,
            last_reason: None,
        }
    }
}

impl FollowCamera {
    pub fn mode(&self) -> FollowMode {
        self.mode
    }

    pub fn is_following(&self) -> bool {
        self.mode == FollowMode::Following
    }

    pub fn tilt_deg(&self) -> f64 {
        self.tilt_deg
    }

    pub fn heading_deg(&self) -> f64 {
        self.heading_deg
    }

    pub fn center(&self) -> Option<GeoPoint> {
        self.center
    }

    pub fn last_user_interaction_ms(&self) -> Option<u64> {
        self.last_user_interaction_ms
    }

    pub fn last_forced_follow_ms(&self) -> Option<u64> {
        self.last_forced_follow_ms
    }

    pub fn last_reason(&self) -> Option<ForceFollowReason> {
        self.last_reason
    }

    /// Re-enables tracking regardless of any manual override and resets the 3D tilt.
    pub fn force_follow(&mut self, now_ms: u64, reason: ForceFollowReason, config: &FollowConfig) {
        self.mode = FollowMode::Following;
        self.tilt_deg = config.follow_tilt_deg;
        self.last_forced_follow_ms = Some(now_ms);
        self.last_reason = Some(reason);
    }

    /// Handles a user pan/rotate gesture. Returns `true` if the camera switched to `Manual`.
    ///
    /// Gestures inside the debounce window after a forced follow are ignored.
    pub fn on_user_pan(&mut self, now_ms: u64, config: &FollowConfig) -> bool {
        if let Some(forced_at) = self.last_forced_follow_ms {
            if now_ms.saturating_sub(forced_at) <= config.force_follow_debounce_ms {
                return false;
            }
        }
        self.last_user_interaction_ms = Some(now_ms);
        let switched = self.mode == FollowMode::Following;
        self.mode = FollowMode::Manual;
        switched
    }

    /// Applies the optional auto-resume window. Returns `true` if tracking resumed.
    pub fn maybe_resume(&mut self, now_ms: u64, config: &FollowConfig) -> bool {
        let (FollowMode::Manual, Some(resume_after), Some(touched)) = (
            self.mode,
            config.resume_after_ms,
            self.last_user_interaction_ms,
        ) else {
            return false;
        };
        if now_ms.saturating_sub(touched) >= resume_after {
            self.mode = FollowMode::Following;
            return true;
        }
        false
    }

    /// Per-tick side effect: while following, center on the vehicle and match its heading.
    pub fn on_tick(&mut self, vehicle: &SmoothedVehicleState) {
        if self.mode != FollowMode::Following {
            return;
        }
        self.center = Some(vehicle.position);
        self.heading_deg = vehicle.heading;
    }

    /// True when a tick would change the camera (used to keep the frame loop alive).
    pub fn needs_tick(&self, vehicle: &SmoothedVehicleState) -> bool {
        self.mode == FollowMode::Following
            && (self.center != Some(vehicle.position) || self.heading_deg != vehicle.heading)
    }
}
