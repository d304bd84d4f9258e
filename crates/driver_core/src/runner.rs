//! Dashboard runner: advances the clock and routes events into the ECS.
//!
//! Each step pops the next event from [ClientClock], inserts it as
//! [CurrentEvent] and runs the schedule. Afterwards the runner does the I/O
//! systems are not allowed to do: it applies a requested reset, resolves queued
//! route requests against the provider and turns pending realtime pushes into
//! `RealtimeChanges` events.

use bevy_ecs::prelude::{Res, Schedule, World};
use bevy_ecs::schedule::IntoSystemConfigs;

use crate::clock::{ClientClock, CurrentEvent, EventKind, EventTag};
use crate::config::DriverClientConfig;
use crate::dashboard::reset_dashboard_state;
use crate::routing::RouteProviderResource;
use crate::state::{PendingReset, RealtimeFeeds, RouteOutbox};
use crate::systems::{
    alert_loop::alert_pulse_system,
    animation::animation_frame_system,
    camera::user_pan_system,
    location::{location_lost_system, location_sample_system},
    offers::{accept_request_system, decline_request_system, offer_expired_system},
    online::{go_offline_system, go_online_system},
    realtime::realtime_changes_system,
    reconcile::reconcile_system,
    route::{route_planning_system, route_resolved_system},
    session::session_changed_system,
    snapshot::{nearby_poll_system, snapshot_system},
    trip::{close_ride_system, complete_step_system},
};

fn current_tag(event: &Option<Res<CurrentEvent>>) -> Option<EventTag> {
    event.as_ref().map(|e| e.0.tag())
}

// Condition functions for each event kind
fn is_go_online(event: Option<Res<CurrentEvent>>) -> bool {
    current_tag(&event) == Some(EventTag::GoOnline)
}

fn is_go_offline(event: Option<Res<CurrentEvent>>) -> bool {
    current_tag(&event) == Some(EventTag::GoOffline)
}

fn is_snapshot_due(event: Option<Res<CurrentEvent>>) -> bool {
    current_tag(&event) == Some(EventTag::SnapshotDue)
}

fn is_location_sample(event: Option<Res<CurrentEvent>>) -> bool {
    current_tag(&event) == Some(EventTag::LocationSample)
}

fn is_location_lost(event: Option<Res<CurrentEvent>>) -> bool {
    current_tag(&event) == Some(EventTag::LocationLost)
}

fn is_nearby_poll_due(event: Option<Res<CurrentEvent>>) -> bool {
    current_tag(&event) == Some(EventTag::NearbyPollDue)
}

fn is_realtime_changes(event: Option<Res<CurrentEvent>>) -> bool {
    current_tag(&event) == Some(EventTag::RealtimeChanges)
}

fn is_accept_requested(event: Option<Res<CurrentEvent>>) -> bool {
    current_tag(&event) == Some(EventTag::AcceptRequested)
}

fn is_decline_requested(event: Option<Res<CurrentEvent>>) -> bool {
    current_tag(&event) == Some(EventTag::DeclineRequested)
}

fn is_offer_expired(event: Option<Res<CurrentEvent>>) -> bool {
    current_tag(&event) == Some(EventTag::OfferExpired)
}

fn is_complete_step(event: Option<Res<CurrentEvent>>) -> bool {
    current_tag(&event) == Some(EventTag::CompleteStep)
}

fn is_close_ride(event: Option<Res<CurrentEvent>>) -> bool {
    current_tag(&event) == Some(EventTag::CloseRide)
}

fn is_route_resolved(event: Option<Res<CurrentEvent>>) -> bool {
    current_tag(&event) == Some(EventTag::RouteResolved)
}

fn is_animation_frame(event: Option<Res<CurrentEvent>>) -> bool {
    current_tag(&event) == Some(EventTag::AnimationFrame)
}

fn is_user_pan(event: Option<Res<CurrentEvent>>) -> bool {
    current_tag(&event) == Some(EventTag::UserPan)
}

fn is_reconcile_tick(event: Option<Res<CurrentEvent>>) -> bool {
    current_tag(&event) == Some(EventTag::ReconcileTick)
}

fn is_alert_pulse(event: Option<Res<CurrentEvent>>) -> bool {
    current_tag(&event) == Some(EventTag::AlertPulse)
}

fn is_session_changed(event: Option<Res<CurrentEvent>>) -> bool {
    current_tag(&event) == Some(EventTag::SessionChanged)
}

/// Condition: the event can move the route endpoints. Rendering ticks and route
/// answers never do.
fn may_move_route_endpoints(event: Option<Res<CurrentEvent>>) -> bool {
    !matches!(
        current_tag(&event),
        None | Some(EventTag::AnimationFrame)
            | Some(EventTag::AlertPulse)
            | Some(EventTag::UserPan)
            | Some(EventTag::RouteResolved)
    )
}

/// Builds the dashboard schedule.
///
/// Systems are gated on the current event kind and chained, so a given event
/// always runs its systems in the same order. Route planning runs last so it
/// sees the state every other system left behind.
pub fn dashboard_schedule() -> Schedule {
    let mut schedule = Schedule::default();

    schedule.add_systems(
        (
            // SessionChanged
            session_changed_system.run_if(is_session_changed),
            // GoOnline / GoOffline
            go_online_system.run_if(is_go_online),
            go_offline_system.run_if(is_go_offline),
            // SnapshotDue / NearbyPollDue
            snapshot_system.run_if(is_snapshot_due),
            nearby_poll_system.run_if(is_nearby_poll_due),
            // RealtimeChanges
            realtime_changes_system.run_if(is_realtime_changes),
            // LocationSample / LocationLost
            location_sample_system.run_if(is_location_sample),
            location_lost_system.run_if(is_location_lost),
            // Offers
            accept_request_system.run_if(is_accept_requested),
            decline_request_system.run_if(is_decline_requested),
            offer_expired_system.run_if(is_offer_expired),
            // Trip progression
            complete_step_system.run_if(is_complete_step),
            close_ride_system.run_if(is_close_ride),
            // Backstop poll
            reconcile_system.run_if(is_reconcile_tick),
            // Rendering
            route_resolved_system.run_if(is_route_resolved),
            user_pan_system.run_if(is_user_pan),
            animation_frame_system.run_if(is_animation_frame),
            alert_pulse_system.run_if(is_alert_pulse),
            // Endpoints may have moved
            route_planning_system.run_if(may_move_route_endpoints),
        )
            .chain(),
    );

    schedule
}

/// Turns realtime pushes received since the last call into a `RealtimeChanges` event.
pub fn pump_realtime(world: &mut World) -> usize {
    let changes = world
        .get_resource::<RealtimeFeeds>()
        .and_then(|feeds| feeds.rides.as_ref().map(|feed| feed.drain()))
        .unwrap_or_default();
    let count = changes.len();
    if count > 0 {
        world
            .resource_mut::<ClientClock>()
            .schedule_in(0, EventKind::RealtimeChanges(changes));
    }
    count
}

/// Hands queued route requests to the provider and schedules their answers.
fn resolve_routes(world: &mut World) {
    let requests = match world.get_resource_mut::<RouteOutbox>() {
        Some(mut outbox) => std::mem::take(&mut outbox.requests),
        None => return,
    };
    if requests.is_empty() {
        return;
    }
    let latency_ms = world
        .get_resource::<DriverClientConfig>()
        .map(|c| c.routing.resolve_latency_ms)
        .unwrap_or(0);
    let resolved: Vec<_> = {
        let provider = world.resource::<RouteProviderResource>();
        requests
            .iter()
            .map(|r| (r.version, provider.0.route(r.origin, r.destination)))
            .collect()
    };
    let mut clock = world.resource_mut::<ClientClock>();
    for (version, result) in resolved {
        clock.schedule_in(latency_ms, EventKind::RouteResolved { version, result });
    }
}

fn apply_pending_reset(world: &mut World) {
    let scope = world
        .get_resource_mut::<PendingReset>()
        .and_then(|mut pending| pending.take());
    if let Some(scope) = scope {
        reset_dashboard_state(world, scope);
    }
}

/// Runs one dashboard step: pops the next event, inserts it as [CurrentEvent], then runs the schedule.
/// Returns `true` if an event was processed, `false` if the clock was empty.
pub fn run_next_event(world: &mut World, schedule: &mut Schedule) -> bool {
    pump_realtime(world);

    let event = match world.resource_mut::<ClientClock>().pop_next() {
        Some(e) => e,
        None => return false,
    };
    world.insert_resource(CurrentEvent(event));

    schedule.run(world);

    apply_pending_reset(world);
    resolve_routes(world);
    pump_realtime(world);
    true
}

/// Runs dashboard steps until the event queue is empty or `max_steps` is reached.
/// Returns the number of steps executed.
///
/// While online the backstop poll reschedules itself, so the queue never drains;
/// prefer [run_until] for online sessions.
pub fn run_until_empty(world: &mut World, schedule: &mut Schedule, max_steps: usize) -> usize {
    let mut steps = 0;
    while steps < max_steps && run_next_event(world, schedule) {
        steps += 1;
    }
    steps
}

/// Processes every event scheduled at or before `until_ms`, then moves the clock to `until_ms`.
/// Returns the number of steps executed.
pub fn run_until(world: &mut World, schedule: &mut Schedule, until_ms: u64) -> usize {
    let mut steps = 0;
    loop {
        pump_realtime(world);
        let due = world
            .resource::<ClientClock>()
            .next_event_time()
            .is_some_and(|ts| ts <= until_ms);
        if !due || !run_next_event(world, schedule) {
            break;
        }
        steps += 1;
    }
    world.resource_mut::<ClientClock>().advance_to(until_ms);
    steps
}
