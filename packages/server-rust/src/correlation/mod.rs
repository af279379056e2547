//! Client side of the request/response correlation layer.
//!
//! A [`CorrelationClient`] turns one-way topic publishes into awaited calls:
//! each request carries a fresh correlation id and a reply topic, and the
//! first reply bearing that id resolves the call.

pub mod client;
pub mod config;
pub mod pending;

pub use client::CorrelationClient;
pub use config::{CorrelationConfig, DEFAULT_REQUEST_TIMEOUT};
pub use pending::{Completion, PendingGuard, PendingTable};
