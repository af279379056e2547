//! Per-entity service facades.
//!
//! Each facade implements both [`Facade`] (existence checks and relational
//! lookups) and `ManagedService` (lifecycle). On `init` it binds the five CRUD
//! topics of its resource, plus any relational lookups, on the dispatch
//! router. Every handler works on opaque JSON and answers with JSON or a
//! [`HandlerError`].

pub mod catalog;
pub mod documents;
pub mod invoices;
pub mod processes;

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use dossier_core::{HandlerError, Record, TopicName};
use serde::Serialize;
use serde_json::Value;

use crate::service::dispatch::{DispatchError, DispatchRouter};
use crate::service::handler::handler_fn;
use crate::service::registry::ServiceRegistry;
use crate::service::validate::{parse_record, require_id};
use crate::storage::{Catalog, Repository, StoreError};

pub use catalog::{EntityService, StatusService, TypeDocumentService};
pub use documents::DocumentService;
pub use invoices::InvoiceService;
pub use processes::{ProcessDocumentService, ProcessService};

/// Operations every resource exposes, as `<resource>.<operation>` topics.
pub const CRUD_OPERATIONS: [&str; 5] = ["create", "find-all", "find-by-id", "update", "delete"];

// ---------------------------------------------------------------------------
// Facade trait
// ---------------------------------------------------------------------------

/// Orchestration in front of one entity's repository.
#[async_trait]
pub trait Facade: Clone + Send + Sync + 'static {
    type Model: Record;

    /// Resource segment of this facade's topics (camelCase).
    const RESOURCE: &'static str;

    fn repository(&self) -> &Arc<dyn Repository<Self::Model>>;

    fn catalog(&self) -> &Catalog;

    /// Verifies every foreign key of `record` points at an existing row.
    async fn check_references(&self, _record: &Self::Model) -> Result<(), HandlerError> {
        Ok(())
    }

    /// Refuses to delete a row other records still point at.
    async fn check_delete(&self, _id: u64) -> Result<(), HandlerError> {
        Ok(())
    }

    /// Binds relational lookups beyond the CRUD set.
    fn bind_lookups(&self, _router: &DispatchRouter) -> Result<(), DispatchError> {
        Ok(())
    }
}

/// Generates the `ManagedService` impl for a facade.
macro_rules! managed_facade {
    ($name:ident) => {
        #[async_trait::async_trait]
        impl $crate::service::registry::ManagedService for $name {
            fn name(&self) -> &'static str {
                <$name as $crate::service::domain::Facade>::RESOURCE
            }

            async fn init(
                &self,
                ctx: &$crate::service::registry::ServiceContext,
            ) -> anyhow::Result<usize> {
                let before = ctx.router.registry().len();
                $crate::service::domain::bind_crud(self, &ctx.router)?;
                $crate::service::domain::Facade::bind_lookups(self, &ctx.router)?;
                Ok(ctx.router.registry().len().saturating_sub(before))
            }
        }
    };
}
pub(crate) use managed_facade;

/// Registers one facade per entity, reference data first.
///
/// # Errors
///
/// Fails if a facade name is registered twice.
pub fn register_facades(registry: &ServiceRegistry, catalog: &Arc<Catalog>) -> anyhow::Result<()> {
    registry.register(StatusService::new(Arc::clone(catalog)))?;
    registry.register(TypeDocumentService::new(Arc::clone(catalog)))?;
    registry.register(EntityService::new(Arc::clone(catalog)))?;
    registry.register(ProcessService::new(Arc::clone(catalog)))?;
    registry.register(DocumentService::new(Arc::clone(catalog)))?;
    registry.register(ProcessDocumentService::new(Arc::clone(catalog)))?;
    registry.register(InvoiceService::new(Arc::clone(catalog)))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Binding
// ---------------------------------------------------------------------------

/// Binds `<resource>.{create,find-all,find-by-id,update,delete}`.
///
/// # Errors
///
/// Propagates the router's binding errors.
pub fn bind_crud<F: Facade>(facade: &F, router: &DispatchRouter) -> Result<(), DispatchError> {
    bind_op(facade, router, "create", create::<F>)?;
    bind_op(facade, router, "find-all", find_all::<F>)?;
    bind_op(facade, router, "find-by-id", find_by_id::<F>)?;
    bind_op(facade, router, "update", update::<F>)?;
    bind_op(facade, router, "delete", delete::<F>)?;
    Ok(())
}

fn bind_op<F, Op, Fut>(
    facade: &F,
    router: &DispatchRouter,
    operation: &str,
    op: Op,
) -> Result<(), DispatchError>
where
    F: Facade,
    Op: Fn(F, Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, HandlerError>> + Send + 'static,
{
    let topic = TopicName::from_parts(F::RESOURCE, operation)?;
    let facade = facade.clone();
    router.bind(topic, handler_fn(move |body| op(facade.clone(), body)))
}

/// Binds `<resource>.<operation>`, answering with every record whose `field`
/// equals the id in the request, after checking that id exists in `parent`.
///
/// # Errors
///
/// Propagates the router's binding errors.
pub fn bind_lookup<F, P>(
    facade: &F,
    router: &DispatchRouter,
    operation: &str,
    field: &'static str,
    parent: Arc<dyn Repository<P>>,
) -> Result<(), DispatchError>
where
    F: Facade,
    P: Record,
{
    let topic = TopicName::from_parts(F::RESOURCE, operation)?;
    let facade = facade.clone();
    router.bind(
        topic,
        handler_fn(move |body| {
            let facade = facade.clone();
            let parent = Arc::clone(&parent);
            async move {
                let id = require_id(&body, field)?;
                require_exists(parent.as_ref(), id).await?;
                to_json(&facade.repository().find_by(field, &Value::from(id)).await)
            }
        }),
    )
}

// ---------------------------------------------------------------------------
// CRUD operations
// ---------------------------------------------------------------------------

async fn create<F: Facade>(facade: F, body: Value) -> Result<Value, HandlerError> {
    let record: F::Model = parse_record(body)?;
    let _writes = facade.catalog().write_guard().await;
    facade.check_references(&record).await?;
    let created = facade.repository().create(record).await?;
    to_json(&created)
}

async fn find_all<F: Facade>(facade: F, _body: Value) -> Result<Value, HandlerError> {
    to_json(&facade.repository().find_all().await)
}

async fn find_by_id<F: Facade>(facade: F, body: Value) -> Result<Value, HandlerError> {
    let id = require_id(&body, "id")?;
    let record = facade
        .repository()
        .find_by_id(id)
        .await
        .ok_or_else(|| not_found::<F::Model>(id))?;
    to_json(&record)
}

/// Applies the fields present in `body` on top of the stored record.
async fn update<F: Facade>(facade: F, body: Value) -> Result<Value, HandlerError> {
    let id = require_id(&body, "id")?;
    let _writes = facade.catalog().write_guard().await;
    let existing = facade
        .repository()
        .find_by_id(id)
        .await
        .ok_or_else(|| not_found::<F::Model>(id))?;

    let mut merged = to_json(&existing)?;
    if let (Some(target), Some(patch)) = (merged.as_object_mut(), body.as_object()) {
        for (field, value) in patch {
            if field != "id" {
                target.insert(field.clone(), value.clone());
            }
        }
    }
    let mut record: F::Model = parse_record(merged)?;
    record.set_id(id);

    facade.check_references(&record).await?;
    let updated = facade.repository().update(record).await?;
    to_json(&updated)
}

async fn delete<F: Facade>(facade: F, body: Value) -> Result<Value, HandlerError> {
    let id = require_id(&body, "id")?;
    let _writes = facade.catalog().write_guard().await;
    facade.check_delete(id).await?;
    let removed = facade.repository().delete(id).await?;
    to_json(&removed)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub(crate) fn not_found<T: Record>(id: u64) -> HandlerError {
    StoreError::NotFound {
        entity: T::ENTITY,
        id,
    }
    .into()
}

/// Fails with `NotFound` ("<Entity> with ID <id> not found") if `id` is absent.
pub(crate) async fn require_exists<T: Record>(
    repo: &dyn Repository<T>,
    id: u64,
) -> Result<(), HandlerError> {
    if repo.exists_by_id(id).await {
        Ok(())
    } else {
        Err(not_found::<T>(id))
    }
}

/// Fails with `Conflict` if any `C` record still has `field == id`.
pub(crate) async fn ensure_unreferenced<P: Record, C: Record>(
    children: &dyn Repository<C>,
    field: &str,
    id: u64,
) -> Result<(), HandlerError> {
    let count = children.find_by(field, &Value::from(id)).await.len();
    if count == 0 {
        Ok(())
    } else {
        Err(HandlerError::conflict(format!(
            "{} with ID {id} is still referenced by {count} {} record(s)",
            P::ENTITY,
            C::ENTITY
        )))
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<Value, HandlerError> {
    serde_json::to_value(value).map_err(|e| HandlerError::internal(e.to_string()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
