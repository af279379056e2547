//! Deadline middleware for topic handlers.
//!
//! Abandons a handler once the caller's `timeout_ms` budget has elapsed. By
//! then the caller has given up, so the reply would be discarded anyway.

use std::task::{Context, Poll};
use std::time::Duration;

use dossier_core::HandlerError;
use serde_json::Value;
use tower::{Layer, Service};

use crate::service::handler::{HandlerFuture, HandlerRequest};

// ---------------------------------------------------------------------------
// DeadlineLayer
// ---------------------------------------------------------------------------

/// Tower layer enforcing the deadline carried in each request.
///
/// Requests without a `timeout_ms` run unbounded.
#[derive(Debug, Clone)]
pub struct DeadlineLayer;

impl<S> Layer<S> for DeadlineLayer {
    type Service = DeadlineService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        DeadlineService { inner }
    }
}

// ---------------------------------------------------------------------------
// DeadlineService
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct DeadlineService<S> {
    inner: S,
}

impl<S> Service<HandlerRequest> for DeadlineService<S>
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
        let deadline = req.timeout_ms;
        let topic = req.topic.clone();
        let fut = self.inner.call(req);
        Box::pin(async move {
            let Some(timeout_ms) = deadline else {
                return fut.await;
            };
            match tokio::time::timeout(Duration::from_millis(timeout_ms), fut).await {
                Ok(result) => result,
                Err(_elapsed) => Err(HandlerError::unavailable(format!(
                    "'{topic}' exceeded the caller's {timeout_ms}ms deadline"
                ))),
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use dossier_core::{CorrelationId, ErrorKind, TopicName};
    use tower::ServiceExt;

    use super::*;

    /// Service that takes a configurable delay before responding.
    struct SlowService {
        delay_ms: u64,
    }

    impl Service<HandlerRequest> for SlowService {
        type Response = Value;
        type Error = HandlerError;
        type Future = HandlerFuture;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, _req: HandlerRequest) -> Self::Future {
            let delay = self.delay_ms;
            Box::pin(async move {
                tokio::time::sleep(Duration::from_millis(delay)).await;
                Ok(Value::Bool(true))
            })
        }
    }

    fn make_req(timeout_ms: Option<u64>) -> HandlerRequest {
        HandlerRequest {
            topic: TopicName::parse("invoices.find-all").unwrap(),
            correlation_id: CorrelationId::generate(),
            timeout_ms,
            body: Value::Null,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn completes_within_deadline() {
        let svc = DeadlineLayer.layer(SlowService { delay_ms: 10 });
        let resp = svc.oneshot(make_req(Some(1000))).await.unwrap();
        assert_eq!(resp, Value::Bool(true));
    }

    #[tokio::test(start_paused = true)]
    async fn exceeding_deadline_is_unavailable() {
        let svc = DeadlineLayer.layer(SlowService { delay_ms: 200 });
        let err = svc.oneshot(make_req(Some(50))).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Unavailable);
        assert!(err.message.contains("50ms"));
    }

    #[tokio::test(start_paused = true)]
    async fn missing_deadline_runs_unbounded() {
        let svc = DeadlineLayer.layer(SlowService { delay_ms: 60_000 });
        let resp = svc.oneshot(make_req(None)).await.unwrap();
        assert_eq!(resp, Value::Bool(true));
    }
}
