pub mod alert_loop;
pub mod animation;
pub mod camera;
pub(crate) mod intake;
pub mod location;
pub mod offers;
pub mod online;
pub mod realtime;
pub mod reconcile;
pub mod route;
pub mod session;
pub mod snapshot;
pub mod trip;
