//! Repository trait and store errors.

use async_trait::async_trait;
use dossier_core::{HandlerError, Record};
use serde_json::Value;

/// Failures surfaced by a [`Repository`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("{entity} with ID {id} not found")]
    NotFound { entity: &'static str, id: u64 },
    #[error("{entity} with {key} already exists")]
    Conflict { entity: &'static str, key: String },
    #[error("store failure: {0}")]
    Internal(String),
}

impl From<StoreError> for HandlerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } => HandlerError::not_found(err.to_string()),
            StoreError::Conflict { .. } => HandlerError::conflict(err.to_string()),
            StoreError::Internal(_) => HandlerError::internal(err.to_string()),
        }
    }
}

/// Typed CRUD access to one entity's records.
///
/// Ids are assigned by the store on `create`. Lookups return `Option`;
/// only writes fail with [`StoreError`].
#[async_trait]
pub trait Repository<T: Record>: Send + Sync {
    /// Persists a new record and returns it with its assigned id.
    async fn create(&self, record: T) -> Result<T, StoreError>;

    /// Replaces the record with `record.id()`.
    async fn update(&self, record: T) -> Result<T, StoreError>;

    async fn find_by_id(&self, id: u64) -> Option<T>;

    /// All records ordered by id.
    async fn find_all(&self) -> Vec<T>;

    /// Records whose serialized `field` equals `value`, ordered by id.
    async fn find_by(&self, field: &str, value: &Value) -> Vec<T>;

    /// Removes and returns the record with `id`.
    async fn delete(&self, id: u64) -> Result<T, StoreError>;

    async fn exists_by_id(&self, id: u64) -> bool;
}
