pub mod alert;
pub mod clock;
pub mod config;
pub mod dashboard;
pub mod dispatch;
pub mod error;
pub mod follow;
pub mod geo;
pub mod routing;
pub mod runner;
pub mod smoothing;
pub mod state;
pub mod subscription;
pub mod systems;
pub mod telemetry;

#[cfg(feature = "test-helpers")]
pub mod test_helpers;
