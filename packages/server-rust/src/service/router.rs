//! Topic routing: dispatches a `HandlerRequest` to the handler bound to its topic.

use std::collections::HashMap;
use std::sync::Arc;
use std::task::{Context, Poll};

use dossier_core::{HandlerError, TopicName};
use serde_json::Value;
use tower::Service;

use super::handler::{HandlerFuture, HandlerRequest, TopicHandler};

// ---------------------------------------------------------------------------
// TopicRouter
// ---------------------------------------------------------------------------

/// Routes requests to the [`TopicHandler`] bound to `request.topic`.
///
/// The table is frozen when the router is built, so clones share it and every
/// clone is always ready. A request for an unbound topic fails with a
/// `NotFound` handler error.
#[derive(Clone, Default)]
pub struct TopicRouter {
    handlers: Arc<HashMap<TopicName, Arc<dyn TopicHandler>>>,
}

impl TopicRouter {
    #[must_use]
    pub fn new(handlers: HashMap<TopicName, Arc<dyn TopicHandler>>) -> Self {
        Self {
            handlers: Arc::new(handlers),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl Service<HandlerRequest> for TopicRouter {
    type Response = Value;
    type Error = HandlerError;
    type Future = HandlerFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: HandlerRequest) -> Self::Future {
        match self.handlers.get(&req.topic) {
            Some(handler) => {
                let handler = Arc::clone(handler);
                Box::pin(async move { handler.handle(req.body).await })
            }
            None => {
                let topic = req.topic;
                Box::pin(async move {
                    Err(HandlerError::not_found(format!(
                        "no handler bound to '{topic}'"
                    )))
                })
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
