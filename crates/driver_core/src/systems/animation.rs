//! AnimationFrame system: one smoothing tick for the vehicle marker and the camera.
//!
//! The loop only runs while there is something to animate. It is kicked by new
//! fixes, force-follow and route changes, settles once the marker reaches its
//! target, and is cancelled (generation bump) when the target disappears.

use bevy_ecs::prelude::{Res, ResMut};

use crate::clock::{ClientClock, CurrentEvent, EventKind};
use crate::config::{DriverClientConfig, SmoothingConfig};
use crate::follow::FollowCamera;
use crate::smoothing::SmoothingStep;
use crate::state::{FrameLoop, MarkerState};

/// Starts the frame loop unless it is already running.
pub(crate) fn kick_frame_loop(frames: &mut FrameLoop, clock: &mut ClientClock, config: &SmoothingConfig) {
    if let Some(generation) = frames.start() {
        clock.schedule_in(config.frame_interval_ms, EventKind::AnimationFrame { generation });
    }
}

pub fn animation_frame_system(
    event: Res<CurrentEvent>,
    mut clock: ResMut<ClientClock>,
    config: Res<DriverClientConfig>,
    mut frames: ResMut<FrameLoop>,
    mut marker: ResMut<MarkerState>,
    mut camera: ResMut<FollowCamera>,
) {
    let EventKind::AnimationFrame { generation } = event.0.kind else {
        return;
    };
    if !frames.accept(generation) {
        return;
    }

    let step = marker.position.step();
    let Some(vehicle) = marker.vehicle_state() else {
        frames.cancel();
        return;
    };

    camera.maybe_resume(clock.now(), &config.follow);
    if camera.needs_tick(&vehicle) {
        camera.on_tick(&vehicle);
    }

    if step == SmoothingStep::Moving {
        clock.schedule_in(
            config.smoothing.frame_interval_ms,
            EventKind::AnimationFrame { generation },
        );
    } else {
        frames.settle();
    }
}
