//! Topic handlers and the request type flowing through the handler pipeline.

use std::future::Future;
use std::pin::Pin;

use async_trait::async_trait;
use dossier_core::{CorrelationId, HandlerError, TopicName};
use serde_json::Value;

/// Boxed future returned by every service in the handler pipeline.
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<Value, HandlerError>> + Send>>;

/// One decoded request, as seen by the handler pipeline.
#[derive(Debug, Clone)]
pub struct HandlerRequest {
    pub topic: TopicName,
    pub correlation_id: CorrelationId,
    /// The caller's deadline budget, if it sent one.
    pub timeout_ms: Option<u64>,
    pub body: Value,
}

/// Business logic bound to one topic.
///
/// Failures are returned as [`HandlerError`] values; the router turns them
/// into error replies with the mapped status code.
#[async_trait]
pub trait TopicHandler: Send + Sync + 'static {
    async fn handle(&self, body: Value) -> Result<Value, HandlerError>;
}

/// Adapter turning an async closure into a [`TopicHandler`].
pub struct FnHandler<F>(F);

/// Wraps `f` as a [`TopicHandler`].
#[must_use]
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, HandlerError>> + Send + 'static,
{
    FnHandler(f)
}

#[async_trait]
impl<F, Fut> TopicHandler for FnHandler<F>
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, HandlerError>> + Send + 'static,
{
    async fn handle(&self, body: Value) -> Result<Value, HandlerError> {
        (self.0)(body).await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn handler_fn_forwards_body() {
        let handler = handler_fn(|body: Value| async move { Ok(json!({ "echo": body })) });
        let out = handler.handle(json!(1)).await.unwrap();
        assert_eq!(out, json!({ "echo": 1 }));
    }

    #[tokio::test]
    async fn handler_fn_propagates_errors() {
        let handler = handler_fn(|_| async { Err(HandlerError::validation("bad input")) });
        let err = handler.handle(Value::Null).await.unwrap_err();
        assert_eq!(err.status_code(), 400);
    }
}
