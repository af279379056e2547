//! Invoice facade.

use std::sync::Arc;

use async_trait::async_trait;
use dossier_core::models::{Entity, Invoice, Process};
use dossier_core::HandlerError;

use super::{bind_lookup, managed_facade, not_found, require_exists, Facade};
use crate::service::dispatch::{DispatchError, DispatchRouter};
use crate::storage::{Catalog, Repository};

/// Invoices are billed to an entity, optionally against one of its processes.
#[derive(Clone)]
pub struct InvoiceService {
    catalog: Arc<Catalog>,
}

impl InvoiceService {
    #[must_use]
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl Facade for InvoiceService {
    type Model = Invoice;
    const RESOURCE: &'static str = "invoices";

    fn repository(&self) -> &Arc<dyn Repository<Invoice>> {
        &self.catalog.invoices
    }

    fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    async fn check_references(&self, record: &Invoice) -> Result<(), HandlerError> {
        let c = &self.catalog;
        require_exists(c.entities.as_ref(), record.entity_id).await?;
        require_exists(c.statuses.as_ref(), record.status_id).await?;
        if let Some(process_id) = record.process_id {
            let process = c
                .processes
                .find_by_id(process_id)
                .await
                .ok_or_else(|| not_found::<Process>(process_id))?;
            if process.entity_id != record.entity_id {
                return Err(HandlerError::validation(format!(
                    "Process with ID {process_id} does not belong to Entity with ID {}",
                    record.entity_id
                )));
            }
        }
        Ok(())
    }

    fn bind_lookups(&self, router: &DispatchRouter) -> Result<(), DispatchError> {
        bind_lookup::<_, Entity>(
            self,
            router,
            "find-by-entity",
            "entity_id",
            Arc::clone(&self.catalog.entities),
        )
    }
}

managed_facade!(InvoiceService);
