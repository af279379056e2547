//! Tracing middleware for topic handlers.
//!
//! Records handler duration and outcome on a `tracing` span per invocation.

use std::task::{Context, Poll};
use std::time::Instant;

use dossier_core::HandlerError;
use serde_json::Value;
use tower::{Layer, Service};
use tracing::{info_span, Instrument};

use crate::service::handler::{HandlerFuture, HandlerRequest};

// ---------------------------------------------------------------------------
// MetricsLayer
// ---------------------------------------------------------------------------

/// Tower layer that instruments handlers with timing and outcome.
#[derive(Debug, Clone)]
pub struct MetricsLayer;

impl<S> Layer<S> for MetricsLayer {
    type Service = MetricsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MetricsService { inner }
    }
}

// ---------------------------------------------------------------------------
// MetricsService
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct MetricsService<S> {
    inner: S,
}

impl<S> Service<HandlerRequest> for MetricsService<S>
where
    S: Service<HandlerRequest, Response = Value, Error = HandlerError> + Send,
    S::Future: Send + 'static,
{
    type Response = Value;
    type Error = HandlerError;
    type Future = HandlerFuture;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: HandlerRequest) -> Self::Future {
        let span = info_span!(
            "handler",
            topic = %req.topic,
            correlation_id = %req.correlation_id,
            duration_ms = tracing::field::Empty,
            outcome = tracing::field::Empty,
        );

        let fut = self.inner.call(req);

        Box::pin(
            async move {
                let start = Instant::now();
                let result = fut.await;
                let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

                let outcome = match &result {
                    Ok(_) => "ok",
                    Err(e) => e.kind.as_str(),
                };

                tracing::Span::current().record("duration_ms", duration_ms);
                tracing::Span::current().record("outcome", outcome);
                tracing::debug!(duration_ms, outcome, "handler complete");

                result
            }
            .instrument(span),
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use dossier_core::{CorrelationId, TopicName};
    use tower::ServiceExt;

    use super::*;

    /// Immediately-completing service that echoes the body.
    struct ImmediateService;

    impl Service<HandlerRequest> for ImmediateService {
        type Response = Value;
        type Error = HandlerError;
        type Future = HandlerFuture;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, req: HandlerRequest) -> Self::Future {
            Box::pin(async move { Ok(req.body) })
        }
    }

    #[tokio::test]
    async fn metrics_layer_passes_through_response() {
        let svc = MetricsLayer.layer(ImmediateService);
        let req = HandlerRequest {
            topic: TopicName::parse("entities.find-by-id").unwrap(),
            correlation_id: CorrelationId::generate(),
            timeout_ms: Some(5000),
            body: serde_json::json!({"id": 42}),
        };
        let resp = svc.oneshot(req).await.unwrap();
        assert_eq!(resp["id"], 42);
    }
}
