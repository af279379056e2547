//! Startup sequencing for the worker-side services.
//!
//! Services register in dependency order and bind their topics on the
//! dispatch router in that same order. Binding happens once: the router is
//! sealed by `start()`, so there is no per-service teardown; draining the
//! router retires every topic at once.

use std::sync::Arc;

use anyhow::Context as _;
use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, info};

use super::dispatch::DispatchRouter;

/// Context provided to services during initialization.
#[derive(Clone)]
pub struct ServiceContext {
    /// Router the services bind their topics on.
    pub router: Arc<DispatchRouter>,
}

/// A service that serves some topics on the dispatch router.
#[async_trait]
pub trait ManagedService: Send + Sync + 'static {
    /// Unique name, e.g. `"documents"`.
    fn name(&self) -> &'static str;

    /// Binds this service's topics on `ctx.router` and returns how many it
    /// bound.
    async fn init(&self, ctx: &ServiceContext) -> anyhow::Result<usize>;
}

/// Services in registration order.
#[derive(Default)]
pub struct ServiceRegistry {
    services: RwLock<Vec<Arc<dyn ManagedService>>>,
}

impl ServiceRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `service`; registration order is init order.
    ///
    /// # Errors
    ///
    /// Fails if a service with the same name is already registered.
    pub fn register(&self, service: impl ManagedService) -> anyhow::Result<()> {
        let mut services = self.services.write();
        let name = service.name();
        if services.iter().any(|s| s.name() == name) {
            anyhow::bail!("service '{name}' is already registered");
        }
        services.push(Arc::new(service));
        Ok(())
    }

    /// Service names in registration order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.services.read().iter().map(|s| s.name()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.services.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.services.read().is_empty()
    }

    /// Initializes every service in registration order and returns the
    /// total number of topics bound.
    ///
    /// # Errors
    ///
    /// Stops at the first failing service and names it in the error.
    pub async fn init_all(&self, ctx: &ServiceContext) -> anyhow::Result<usize> {
        let services = self.services.read().clone();
        let mut total = 0;
        for service in &services {
            let name = service.name();
            let bound = service
                .init(ctx)
                .await
                .with_context(|| format!("failed to initialize service '{name}'"))?;
            debug!(service = name, topics = bound, "service initialized");
            total += bound;
        }
        info!(services = services.len(), topics = total, "services initialized");
        Ok(total)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
