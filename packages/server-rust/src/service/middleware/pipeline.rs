//! Pipeline composition: combines all middleware layers into a single service stack.

use dossier_core::HandlerError;
use serde_json::Value;
use tower::ServiceBuilder;

use super::load_shed::LoadShedLayer;
use super::metrics::MetricsLayer;
use super::timeout::DeadlineLayer;
use crate::service::config::DispatchConfig;
use crate::service::handler::{HandlerFuture, HandlerRequest};
use crate::service::router::TopicRouter;

/// Build the handler pipeline by wrapping the `TopicRouter` with middleware layers.
///
/// Layer order (outermost to innermost):
/// 1. `LoadShedLayer` -- reject when overloaded (fail fast before doing any work)
/// 2. `DeadlineLayer` -- abandon handlers past the caller's deadline
/// 3. `MetricsLayer` -- record timing and outcome (closest to the actual handler)
#[must_use]
pub fn build_handler_pipeline(
    router: TopicRouter,
    config: &DispatchConfig,
) -> impl tower::Service<
    HandlerRequest,
    Response = Value,
    Error = HandlerError,
    Future = HandlerFuture,
> + Clone
       + Send
       + 'static {
    ServiceBuilder::new()
        .layer(LoadShedLayer::new(config.max_concurrent_handlers))
        .layer(DeadlineLayer)
        .layer(MetricsLayer)
        .service(router)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
