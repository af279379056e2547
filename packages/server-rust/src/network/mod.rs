//! HTTP gateway: configuration, route table, handlers, and shutdown control.

pub mod config;
pub mod handlers;
pub mod middleware;
pub mod module;
pub mod routes;
pub mod shutdown;

pub use config::NetworkConfig;
pub use handlers::AppState;
pub use module::NetworkModule;
pub use routes::{route_table, Route};
pub use shutdown::{HealthState, InFlightGuard, ShutdownController};
