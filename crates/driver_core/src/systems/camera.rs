use bevy_ecs::prelude::{Res, ResMut};

use crate::clock::{ClientClock, CurrentEvent, EventKind};
use crate::config::DriverClientConfig;
use crate::follow::FollowCamera;

/// UserPan system: a drag/rotate gesture on the map.
pub fn user_pan_system(
    event: Res<CurrentEvent>,
    clock: Res<ClientClock>,
    config: Res<DriverClientConfig>,
    mut camera: ResMut<FollowCamera>,
) {
    if event.0.kind != EventKind::UserPan {
        return;
    }
    if camera.on_user_pan(clock.now(), &config.follow) {
        tracing::debug!(at_ms = clock.now(), "camera switched to manual");
    }
}
