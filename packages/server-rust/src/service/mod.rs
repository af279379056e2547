//! Worker side of the correlation layer.
//!
//! Requests flow through four stages:
//!
//! 1. **Dispatch** (`dispatch`): subscribes every bound topic and turns
//!    incoming envelopes into [`HandlerRequest`]s
//! 2. **Middleware** (`middleware`): Tower layers (load shedding, caller
//!    deadline, metrics)
//! 3. **Routing** (`router`): looks up the handler bound to the topic
//! 4. **Domain services** (`domain`): one facade per entity, CRUD plus
//!    relational lookups
//!
//! Every outcome, success or failure, is published back on the reply topic
//! with the request's correlation id.

pub mod config;
pub mod dispatch;
pub mod domain;
pub mod handler;
pub mod middleware;
pub mod registry;
pub mod router;
pub mod validate;

// Re-export key types for convenient access.
pub use config::DispatchConfig;
pub use dispatch::{DispatchError, DispatchRouter, DispatchState};
pub use domain::{register_facades, Facade};
pub use handler::{handler_fn, FnHandler, HandlerFuture, HandlerRequest, TopicHandler};
pub use registry::{ManagedService, ServiceContext, ServiceRegistry};
pub use router::TopicRouter;
