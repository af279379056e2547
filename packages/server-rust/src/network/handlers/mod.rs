//! HTTP handler definitions for the gateway.
//!
//! This module defines `AppState` (the shared state carried through axum
//! extractors) and re-exports the handler functions used by the router.

pub mod api;
pub mod health;

pub use api::{call_topic, method_not_allowed, route_not_found, ApiReply};
pub use health::{health_handler, liveness_handler, readiness_handler};

use std::sync::Arc;
use std::time::Instant;

use super::{NetworkConfig, ShutdownController};
use crate::correlation::CorrelationClient;
use crate::service::DispatchRouter;

/// Shared application state passed to all axum handlers via `State` extraction.
///
/// Holds `Arc` references to shared resources so cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    /// Issues one correlated request per API call.
    pub client: Arc<CorrelationClient>,
    /// Worker side, consulted by the readiness probe.
    pub router: Arc<DispatchRouter>,
    /// Gateway lifecycle and in-flight HTTP request tracking.
    pub shutdown: Arc<ShutdownController>,
    pub config: Arc<NetworkConfig>,
    /// Process start time, used for uptime calculation.
    pub start_time: Instant,
}
