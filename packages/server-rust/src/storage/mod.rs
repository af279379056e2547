//! Persistence store behind the service façades.
//!
//! [`Repository`] is the narrow interface the façades talk to; [`Catalog`]
//! bundles one repository per entity. [`MemoryRepository`] keeps everything
//! in process and is what the `dossier` binary runs with.

pub mod memory;
pub mod repository;

use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};

use dossier_core::models::{Document, Entity, Invoice, Process, ProcessDocument, Status, TypeDocument};

pub use memory::MemoryRepository;
pub use repository::{Repository, StoreError};

/// One repository per entity type.
///
/// Mutations that check one repository and write another hold
/// [`Catalog::write_guard`] across both steps, so a delete guard and a
/// child insert never interleave.
pub struct Catalog {
    pub documents: Arc<dyn Repository<Document>>,
    pub type_documents: Arc<dyn Repository<TypeDocument>>,
    pub processes: Arc<dyn Repository<Process>>,
    pub process_documents: Arc<dyn Repository<ProcessDocument>>,
    pub statuses: Arc<dyn Repository<Status>>,
    pub entities: Arc<dyn Repository<Entity>>,
    pub invoices: Arc<dyn Repository<Invoice>>,
    writes: Mutex<()>,
}

impl Catalog {
    /// Catalog backed entirely by [`MemoryRepository`] instances.
    #[must_use]
    pub fn in_memory() -> Arc<Self> {
        Arc::new(Self {
            documents: Arc::new(MemoryRepository::new()),
            type_documents: Arc::new(MemoryRepository::new()),
            processes: Arc::new(MemoryRepository::new()),
            process_documents: Arc::new(MemoryRepository::new()),
            statuses: Arc::new(MemoryRepository::new()),
            entities: Arc::new(MemoryRepository::new()),
            invoices: Arc::new(MemoryRepository::new()),
            writes: Mutex::new(()),
        })
    }

    /// Serializes check-then-write sequences across every repository.
    pub async fn write_guard(&self) -> MutexGuard<'_, ()> {
        self.writes.lock().await
    }
}
