//! Content store for animation records.
//!
//! [`ContentStore`] is the seam a real backend (a hosted table, a file,
//! a fixture) plugs into. [`MemoryStore`] keeps records in insertion order
//! and is what the CLI and tests use, loaded from a JSON array of rows.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use serde_json::Value;
use tracing::{debug, info};

use crate::record::AnimationRecord;
use crate::StoreError;

/// Read/write access to stored animation records.
pub trait ContentStore {
    /// Every record, in the store's listing order.
    fn list(&self) -> Result<Vec<AnimationRecord>, StoreError>;

    fn get(&self, id: &str) -> Result<Option<AnimationRecord>, StoreError>;

    /// Insert or replace by id. The record is validated first.
    fn upsert(&self, record: AnimationRecord) -> Result<(), StoreError>;

    /// Returns whether a record was removed.
    fn delete(&self, id: &str) -> Result<bool, StoreError>;

    /// Like [`get`](Self::get), but a missing id is an error.
    fn require(&self, id: &str) -> Result<AnimationRecord, StoreError> {
        self.get(id)?.ok_or_else(|| StoreError::NotFound(id.to_string()))
    }
}

struct Entry {
    seq: u64,
    record: AnimationRecord,
}

/// Thread-safe in-memory store.
#[derive(Default)]
pub struct MemoryStore {
    records: DashMap<String, Entry>,
    next_seq: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON array of content rows. Legacy column names are accepted.
    /// A row that fails to normalize is reported with its index.
    pub fn from_json_str(json: &str) -> Result<Self, StoreError> {
        let rows: Vec<Value> = serde_json::from_str(json)?;
        let store = Self::new();
        for (index, row) in rows.into_iter().enumerate() {
            let record: AnimationRecord = serde_json::from_value(row).map_err(|e| StoreError::InvalidRow {
                index,
                message: e.to_string(),
            })?;
            store.upsert(record)?;
        }
        debug!(records = store.len(), "parsed content rows");
        Ok(store)
    }

    /// Load rows from a JSON file.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let json = tokio::fs::read_to_string(path).await?;
        let store = Self::from_json_str(&json)?;
        info!(path = %path.display(), records = store.len(), "loaded records");
        Ok(store)
    }

    /// Serialize every record back to a JSON array in listing order.
    pub fn to_json_string(&self) -> Result<String, StoreError> {
        Ok(serde_json::to_string_pretty(&self.list()?)?)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl ContentStore for MemoryStore {
    fn list(&self) -> Result<Vec<AnimationRecord>, StoreError> {
        let mut entries: Vec<(u64, AnimationRecord)> = self
            .records
            .iter()
            .map(|e| (e.seq, e.record.clone()))
            .collect();
        entries.sort_by_key(|(seq, _)| *seq);
        Ok(entries.into_iter().map(|(_, r)| r).collect())
    }

    fn get(&self, id: &str) -> Result<Option<AnimationRecord>, StoreError> {
        Ok(self.records.get(id).map(|e| e.record.clone()))
    }

    fn upsert(&self, record: AnimationRecord) -> Result<(), StoreError> {
        record.validate()?;
        let id = record.id.clone();
        match self.records.get_mut(&id) {
            Some(mut existing) => existing.record = record,
            None => {
                let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
                self.records.insert(id, Entry { seq, record });
            }
        }
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.records.remove(id).is_some())
    }
}
