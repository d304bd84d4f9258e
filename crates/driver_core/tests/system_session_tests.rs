mod support;

use driver_core::alert::Notification;
use driver_core::clock::EventKind;
use driver_core::state::{AccountStatus, DriverLocation, DriverProfile, OnlineStatus, SessionGuard};
use driver_core::test_helpers::{
    point_km_north, ride_record, test_profile, DRIVER_POINT, TEST_EPOCH_MS,
};

use support::schedule::ScheduleRunner;
use support::world::{TestDashboard, TestDashboardBuilder};

fn bring_online(dash: &mut TestDashboard, runner: &mut ScheduleRunner) {
    dash.fix(0, DRIVER_POINT);
    dash.schedule(0, EventKind::GoOnline);
    runner.run_until(&mut dash.world, 100);
}

#[test]
fn session_taken_over_elsewhere_signs_out() {
    let mut runner = ScheduleRunner::new();
    let mut dash = TestDashboard::new();
    bring_online(&mut dash, &mut runner);
    dash.store
        .insert(ride_record("r1", point_km_north(DRIVER_POINT, 1.0), TEST_EPOCH_MS + 100))
        .expect("insert");
    runner.run_until(&mut dash.world, 150);
    assert_eq!(dash.store.subscriber_count(), 1);
    assert_eq!(dash.board_ids().len(), 1);

    dash.schedule(200, EventKind::SessionChanged(Some("session-b".to_string())));
    runner.run_until(&mut dash.world, 200);

    assert_eq!(
        dash.count_notifications(|n| matches!(n, Notification::SessionConflict)),
        1
    );
    assert!(dash.world.resource::<SessionGuard>().signed_out);
    assert!(!dash.world.resource::<OnlineStatus>().online);
    assert_eq!(dash.store.subscriber_count(), 0);
    assert!(dash.board_ids().is_empty());
    assert!(dash.world.resource::<DriverLocation>().position().is_none());
    assert_eq!(dash.world.resource::<DriverProfile>().driver_id, "driver-1");

    dash.schedule(300, EventKind::GoOnline);
    runner.run_until(&mut dash.world, 300);
    assert!(!dash.world.resource::<OnlineStatus>().online);
    assert_eq!(
        dash.count_notifications(|n| matches!(n, Notification::OnlineRefused { .. })),
        1
    );
}

#[test]
fn own_or_cleared_session_is_not_a_conflict() {
    let mut runner = ScheduleRunner::new();
    let mut dash = TestDashboard::new();
    bring_online(&mut dash, &mut runner);

    dash.schedule(200, EventKind::SessionChanged(Some("session-a".to_string())));
    dash.schedule(300, EventKind::SessionChanged(None));
    runner.run_until(&mut dash.world, 300);

    assert!(dash.world.resource::<OnlineStatus>().online);
    assert!(!dash.world.resource::<SessionGuard>().signed_out);
    assert_eq!(
        dash.count_notifications(|n| matches!(n, Notification::SessionConflict)),
        0
    );
}

#[test]
fn suspended_account_cannot_go_online() {
    let mut runner = ScheduleRunner::new();
    let mut dash = TestDashboardBuilder::new()
        .with_profile(DriverProfile {
            account_status: AccountStatus::Suspended,
            ..test_profile()
        })
        .build();

    dash.schedule(0, EventKind::GoOnline);
    runner.run_until(&mut dash.world, 100);

    assert!(!dash.world.resource::<OnlineStatus>().online);
    assert_eq!(dash.store.subscriber_count(), 0);
    assert_eq!(
        dash.count_notifications(|n| matches!(
            n,
            Notification::OnlineRefused { reason } if reason == "account suspended"
        )),
        1
    );
}
