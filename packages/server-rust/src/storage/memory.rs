//! In-memory [`Repository`] backed by [`DashMap`].

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use dossier_core::Record;
use parking_lot::Mutex;
use serde_json::Value;

use super::repository::{Repository, StoreError};

/// Process-local repository for one entity type.
///
/// Reads go straight to the map. Writes are serialized so the uniqueness
/// check and the insert happen atomically.
pub struct MemoryRepository<T: Record> {
    records: DashMap<u64, T>,
    next_id: AtomicU64,
    write_lock: Mutex<()>,
}

impl<T: Record> MemoryRepository<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
            next_id: AtomicU64::new(1),
            write_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Fails if another record (not `own_id`) already holds `record`'s unique key.
    fn check_unique(&self, record: &T, own_id: u64) -> Result<(), StoreError> {
        let Some(key) = record.unique_key() else {
            return Ok(());
        };
        let taken = self
            .records
            .iter()
            .any(|r| r.key() != &own_id && r.value().unique_key().as_deref() == Some(&key));
        if taken {
            return Err(StoreError::Conflict {
                entity: T::ENTITY,
                key: format!("key '{key}'"),
            });
        }
        Ok(())
    }

    fn sorted(mut records: Vec<T>) -> Vec<T> {
        records.sort_by_key(|r| r.id());
        records
    }
}

impl<T: Record> Default for MemoryRepository<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: Record> Repository<T> for MemoryRepository<T> {
    async fn create(&self, mut record: T) -> Result<T, StoreError> {
        let _write = self.write_lock.lock();
        self.check_unique(&record, 0)?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        record.set_id(id);
        self.records.insert(id, record.clone());
        Ok(record)
    }

    async fn update(&self, record: T) -> Result<T, StoreError> {
        let _write = self.write_lock.lock();
        let id = record.id();
        if !self.records.contains_key(&id) {
            return Err(StoreError::NotFound {
                entity: T::ENTITY,
                id,
            });
        }
        self.check_unique(&record, id)?;
        self.records.insert(id, record.clone());
        Ok(record)
    }

    async fn find_by_id(&self, id: u64) -> Option<T> {
        self.records.get(&id).map(|r| r.value().clone())
    }

    async fn find_all(&self) -> Vec<T> {
        Self::sorted(self.records.iter().map(|r| r.value().clone()).collect())
    }

    async fn find_by(&self, field: &str, value: &Value) -> Vec<T> {
        let matches = self
            .records
            .iter()
            .filter(|r| {
                serde_json::to_value(r.value())
                    .ok()
                    .and_then(|v| v.get(field).cloned())
                    .is_some_and(|v| &v == value)
            })
            .map(|r| r.value().clone())
            .collect();
        Self::sorted(matches)
    }

    async fn delete(&self, id: u64) -> Result<T, StoreError> {
        let _write = self.write_lock.lock();
        self.records
            .remove(&id)
            .map(|(_, record)| record)
            .ok_or(StoreError::NotFound {
                entity: T::ENTITY,
                id,
            })
    }

    async fn exists_by_id(&self, id: u64) -> bool {
        self.records.contains_key(&id)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
