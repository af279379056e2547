//! Tower middleware layers for the handler pipeline.
//!
//! - [`timeout`]: Deadline enforcement from the caller's `timeout_ms`
//! - [`metrics`]: Handler timing and outcome via `tracing` spans
//! - [`load_shed`]: Semaphore-based concurrency limiting
//! - [`pipeline`]: Composes all layers into a single service stack

pub mod load_shed;
pub mod metrics;
pub mod pipeline;
pub mod timeout;

pub use load_shed::LoadShedLayer;
pub use metrics::MetricsLayer;
pub use pipeline::build_handler_pipeline;
pub use timeout::DeadlineLayer;
