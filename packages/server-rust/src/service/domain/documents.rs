//! Document facade.

use std::sync::Arc;

use async_trait::async_trait;
use dossier_core::models::{Document, Process};
use dossier_core::HandlerError;

use super::{bind_lookup, ensure_unreferenced, managed_facade, require_exists, Facade};
use crate::service::dispatch::{DispatchError, DispatchRouter};
use crate::storage::{Catalog, Repository};

/// Documents are typed, carry a status, and belong to a process.
#[derive(Clone)]
pub struct DocumentService {
    catalog: Arc<Catalog>,
}

impl DocumentService {
    #[must_use]
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl Facade for DocumentService {
    type Model = Document;
    const RESOURCE: &'static str = "documents";

    fn repository(&self) -> &Arc<dyn Repository<Document>> {
        &self.catalog.documents
    }

    fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    async fn check_references(&self, record: &Document) -> Result<(), HandlerError> {
        let c = &self.catalog;
        require_exists(c.type_documents.as_ref(), record.type_document_id).await?;
        require_exists(c.processes.as_ref(), record.process_id).await?;
        require_exists(c.statuses.as_ref(), record.status_id).await
    }

    async fn check_delete(&self, id: u64) -> Result<(), HandlerError> {
        ensure_unreferenced::<Document, _>(
            self.catalog.process_documents.as_ref(),
            "document_id",
            id,
        )
        .await
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

managed_facade!(DocumentService);
