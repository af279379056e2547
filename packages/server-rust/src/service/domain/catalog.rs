//! Reference-data facades: document types, statuses, and entities.

use std::sync::Arc;

use async_trait::async_trait;
use dossier_core::models::{Entity, Status, TypeDocument};
use dossier_core::HandlerError;

use super::{ensure_unreferenced, managed_facade, Facade};
use crate::storage::{Catalog, Repository};

// ---------------------------------------------------------------------------
// TypeDocumentService
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct TypeDocumentService {
    catalog: Arc<Catalog>,
}

impl TypeDocumentService {
    #[must_use]
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl Facade for TypeDocumentService {
    type Model = TypeDocument;
    const RESOURCE: &'static str = "typeDocuments";

    fn repository(&self) -> &Arc<dyn Repository<TypeDocument>> {
        &self.catalog.type_documents
    }

    fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    async fn check_delete(&self, id: u64) -> Result<(), HandlerError> {
        ensure_unreferenced::<TypeDocument, _>(
            self.catalog.documents.as_ref(),
            "type_document_id",
            id,
        )
        .await
    }
}

managed_facade!(TypeDocumentService);

// ---------------------------------------------------------------------------
// StatusService
// ---------------------------------------------------------------------------

/// Statuses are shared by processes, documents and invoices.
#[derive(Clone)]
pub struct StatusService {
    catalog: Arc<Catalog>,
}

impl StatusService {
    #[must_use]
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl Facade for StatusService {
    type Model = Status;
    const RESOURCE: &'static str = "statuses";

    fn repository(&self) -> &Arc<dyn Repository<Status>> {
        &self.catalog.statuses
    }

    fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    async fn check_delete(&self, id: u64) -> Result<(), HandlerError> {
        let c = &self.catalog;
        ensure_unreferenced::<Status, _>(c.processes.as_ref(), "status_id", id).await?;
        ensure_unreferenced::<Status, _>(c.documents.as_ref(), "status_id", id).await?;
        ensure_unreferenced::<Status, _>(c.invoices.as_ref(), "status_id", id).await
    }
}

managed_facade!(StatusService);

// ---------------------------------------------------------------------------
// EntityService
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct EntityService {
    catalog: Arc<Catalog>,
}

impl EntityService {
    #[must_use]
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl Facade for EntityService {
    type Model = Entity;
    const RESOURCE: &'static str = "entities";

    fn repository(&self) -> &Arc<dyn Repository<Entity>> {
        &self.catalog.entities
    }

    fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    async fn check_delete(&self, id: u64) -> Result<(), HandlerError> {
        let c = &self.catalog;
        ensure_unreferenced::<Entity, _>(c.processes.as_ref(), "entity_id", id).await?;
        ensure_unreferenced::<Entity, _>(c.invoices.as_ref(), "entity_id", id).await
    }
}

managed_facade!(EntityService);

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::service::domain::tests::Harness;

    #[tokio::test]
    async fn status_names_are_unique_ignoring_case() {
        let h = Harness::start().await;
        h.call("statuses.create", json!({"name": "Open"})).await.unwrap();
        let err = h.call("statuses.create", json!({"name": "open"})).await.unwrap_err();
        assert_eq!(err.status_code(), 409);
    }

    #[tokio::test]
    async fn find_all_lists_in_creation_order() {
        let h = Harness::start().await;
        for name in ["invoice", "contract", "receipt"] {
            h.call("typeDocuments.create", json!({"name": name})).await.unwrap();
        }
        let all = h.call("typeDocuments.find-all", json!({})).await.unwrap();
        let names: Vec<&str> = all
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["invoice", "contract", "receipt"]);
    }

    #[tokio::test]
    async fn type_document_in_use_cannot_be_deleted() {
        let h = Harness::start().await;
        h.seed_reference_data().await;
        h.call(
            "processes.create",
            json!({"name": "Onboarding", "entity_id": 1, "status_id": 1}),
        )
        .await
        .unwrap();
        h.call(
            "documents.create",
            json!({
                "title": "Master agreement",
                "number": "DOC-1",
                "type_document_id": 1,
                "process_id": 1,
                "status_id": 1
            }),
        )
        .await
        .unwrap();

        let err = h.call("typeDocuments.delete", json!({"id": 1})).await.unwrap_err();
        assert_eq!(err.status_code(), 409);
        let err = h.call("statuses.delete", json!({"id": 1})).await.unwrap_err();
        assert_eq!(err.status_code(), 409);
    }

    #[tokio::test]
    async fn unreferenced_entity_deletes_and_disappears() {
        let h = Harness::start().await;
        h.seed_reference_data().await;
        h.call("entities.delete", json!({"id": 1})).await.unwrap();
        let err = h.call("entities.find-by-id", json!({"id": 1})).await.unwrap_err();
        assert_eq!(err.status_code(), 404);
    }
}
