//! Load-shedding middleware for topic handlers.
//!
//! Rejects requests when `max_concurrent_handlers` handlers are already
//! running, with an `Unavailable` handler error.

use std::sync::Arc;
use std::task::{Context, Poll};

use dossier_core::HandlerError;
use serde_json::Value;
use tokio::sync::Semaphore;
use tower::{Layer, Service};

use crate::service::handler::{HandlerFuture, HandlerRequest};

// ---------------------------------------------------------------------------
// LoadShedLayer
// ---------------------------------------------------------------------------

/// Tower layer that limits concurrent handlers via a semaphore.
///
/// When all permits are taken, incoming requests are rejected immediately
/// rather than queued.
#[derive(Debug, Clone)]
pub struct LoadShedLayer {
    semaphore: Arc<Semaphore>,
}

impl LoadShedLayer {
    /// Create a new `LoadShedLayer` with the given concurrency limit.
    #[must_use]
    pub fn new(max_concurrent: u32) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent as usize)),
        }
    }
}

impl<S> Layer<S> for LoadShedLayer {
    type Service = LoadShedService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        LoadShedService {
            inner,
            semaphore: self.semaphore.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// LoadShedService
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct LoadShedService<S> {
    inner: S,
    semaphore: Arc<Semaphore>,
}

impl<S> Service<HandlerRequest> for LoadShedService<S>
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
        let Ok(permit) = self.semaphore.clone().try_acquire_owned() else {
            let topic = req.topic;
            return Box::pin(async move {
                Err(HandlerError::unavailable(format!(
                    "too many concurrent requests, '{topic}' rejected"
                )))
            });
        };

        let fut = self.inner.call(req);
        Box::pin(async move {
            // Hold the permit for the duration of the handler.
            let result = fut.await;
            drop(permit);
            result
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use dossier_core::{CorrelationId, ErrorKind, TopicName};
    use tower::ServiceExt;

    use super::*;

    /// Service that holds for a configurable duration.
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
                Ok(Value::Null)
            })
        }
    }

    fn make_req() -> HandlerRequest {
        HandlerRequest {
            topic: TopicName::parse("documents.create").unwrap(),
            correlation_id: CorrelationId::generate(),
            timeout_ms: None,
            body: Value::Null,
        }
    }

    #[tokio::test]
    async fn allows_requests_under_limit() {
        let layer = LoadShedLayer::new(10);
        let svc = layer.layer(SlowService { delay_ms: 1 });
        assert_eq!(svc.oneshot(make_req()).await.unwrap(), Value::Null);
    }

    #[tokio::test]
    async fn rejects_when_overloaded() {
        let layer = LoadShedLayer::new(1);
        let mut svc = layer.layer(SlowService { delay_ms: 500 });

        // First request takes the single permit.
        let _ = ServiceExt::ready(&mut svc).await.unwrap();
        let _in_flight = tokio::spawn({
            let fut = svc.call(make_req());
            async move { fut.await }
        });

        tokio::time::sleep(Duration::from_millis(10)).await;

        let err = svc.call(make_req()).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Unavailable);
        assert_eq!(err.status_code(), 503);
    }
}
