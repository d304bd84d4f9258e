use bevy_ecs::prelude::{Res, ResMut};

use crate::alert::{Notification, NotificationSinkResource};
use crate::clock::{CurrentEvent, EventKind};
use crate::state::{PendingReset, ResetScope, SessionGuard};

/// SessionChanged system: another device took over the account.
pub fn session_changed_system(
    event: Res<CurrentEvent>,
    sink: Res<NotificationSinkResource>,
    mut guard: ResMut<SessionGuard>,
    mut pending_reset: ResMut<PendingReset>,
) {
    let EventKind::SessionChanged(Some(remote)) = &event.0.kind else {
        return;
    };
    if guard.signed_out || *remote == guard.local_session_id {
        return;
    }
    tracing::warn!(local = %guard.local_session_id, %remote, "session conflict, signing out");
    guard.signed_out = true;
    sink.0.notify(Notification::SessionConflict);
    pending_reset.request(ResetScope::Full);
}
