//! Process and process-document facades.

use std::sync::Arc;

use async_trait::async_trait;
use dossier_core::models::{Entity, Process, ProcessDocument};
use dossier_core::HandlerError;

use super::{bind_lookup, ensure_unreferenced, managed_facade, require_exists, Facade};
use crate::service::dispatch::{DispatchError, DispatchRouter};
use crate::storage::{Catalog, Repository};

// ---------------------------------------------------------------------------
// ProcessService
// ---------------------------------------------------------------------------

/// Processes belong to an entity and carry a status.
#[derive(Clone)]
pub struct ProcessService {
    catalog: Arc<Catalog>,
}

impl ProcessService {
    #[must_use]
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl Facade for ProcessService {
    type Model = Process;
    const RESOURCE: &'static str = "processes";

    fn repository(&self) -> &Arc<dyn Repository<Process>> {
        &self.catalog.processes
    }

    fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    async fn check_references(&self, record: &Process) -> Result<(), HandlerError> {
        require_exists(self.catalog.entities.as_ref(), record.entity_id).await?;
        require_exists(self.catalog.statuses.as_ref(), record.status_id).await
    }

    async fn check_delete(&self, id: u64) -> Result<(), HandlerError> {
        let c = &self.catalog;
        ensure_unreferenced::<Process, _>(c.documents.as_ref(), "process_id", id).await?;
        ensure_unreferenced::<Process, _>(c.process_documents.as_ref(), "process_id", id).await?;
        ensure_unreferenced::<Process, _>(c.invoices.as_ref(), "process_id", id).await
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

managed_facade!(ProcessService);

// ---------------------------------------------------------------------------
// ProcessDocumentService
// ---------------------------------------------------------------------------

/// Links between processes and the documents attached to them.
#[derive(Clone)]
pub struct ProcessDocumentService {
    catalog: Arc<Catalog>,
}

impl ProcessDocumentService {
    #[must_use]
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl Facade for ProcessDocumentService {
    type Model = ProcessDocument;
    const RESOURCE: &'static str = "processDocuments";

    fn repository(&self) -> &Arc<dyn Repository<ProcessDocument>> {
        &self.catalog.process_documents
    }

    fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    async fn check_references(&self, record: &ProcessDocument) -> Result<(), HandlerError> {
        require_exists(self.catalog.processes.as_ref(), record.process_id).await?;
        require_exists(self.catalog.documents.as_ref(), record.document_id).await
    }

    fn bind_lookups(&self, router: &DispatchRouter) -> Result<(), DispatchError> {
        bind_lookup::<_, Process>(
            self,
            router,
            "find-by-process",
            "process_id",
            Arc::clone(&self.catalog.processes),
        )
    }
}

managed_facade!(ProcessDocumentService);
