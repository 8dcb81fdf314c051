//! In-memory [`DocumentStore`] used by tests and local runs. Documents live
//! in insertion order per collection; unique and TTL indices are honored,
//! geospatial indices are recorded only.

use crate::store::error::StoreError;
use crate::store::{DocumentStore, IndexSpec, UpsertOp, UpsertOutcome};
use crate::sync::last_known::LastKnownEntry;
use crate::types::feature::{parse_utc_instant, Document};
use crate::types::field_path::FieldPath;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

#[derive(Debug, Default)]
struct MemoryCollection {
    documents: Vec<Document>,
    indices: Vec<IndexSpec>,
}

impl MemoryCollection {
    /// Drops documents whose TTL-indexed instant has expired.
    fn sweep_expired(&mut self, now: DateTime<Utc>) {
        for index in &self.indices {
            let IndexSpec::Ttl { path, expire_after } = index else {
                continue;
            };
            let Ok(expire_after) = chrono::Duration::from_std(*expire_after) else {
                continue;
            };
            self.documents.retain(|document| {
                match path
                    .get(document)
                    .and_then(Value::as_str)
                    .and_then(parse_utc_instant)
                {
                    Some(instant) => instant + expire_after > now,
                    // Documents without a readable instant never expire.
                    None => true,
                }
            });
        }
    }

    fn unique_violation(&self, document: &Document) -> Option<(String, String)> {
        for index in &self.indices {
            let IndexSpec::Fields {
                keys, unique: true, ..
            } = index
            else {
                continue;
            };
            let values: Vec<Option<&Value>> =
                keys.iter().map(|(path, _)| path.get(document)).collect();
            if values.iter().all(Option::is_none) {
                continue;
            }
            let clash = self.documents.iter().any(|existing| {
                keys.iter()
                    .map(|(path, _)| path.get(existing))
                    .collect::<Vec<_>>()
                    == values
            });
            if clash {
                let path = keys
                    .iter()
                    .map(|(path, _)| path.as_str())
                    .collect::<Vec<_>>()
                    .join(",");
                let value = values
                    .iter()
                    .map(|value| match value {
                        Some(value) => value.to_string(),
                        None => "null".to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join(",");
                return Some((path, value));
            }
        }
        None
    }
}

#[derive(Debug, Default)]
struct MemoryInner {
    collections: HashMap<String, MemoryCollection>,
    closed: bool,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn ensure_open(inner: &MemoryInner) -> Result<(), StoreError> {
    if inner.closed {
        return Err(StoreError::Closed);
    }
    Ok(())
}

fn collection_mut<'a>(
    inner: &'a mut MemoryInner,
    name: &str,
) -> Result<&'a mut MemoryCollection, StoreError> {
    inner
        .collections
        .get_mut(name)
        .ok_or_else(|| StoreError::UnknownCollection(name.to_string()))
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn create_collection(
        &self,
        name: &str,
        indices: &[IndexSpec],
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();
        ensure_open(&inner)?;
        let collection = inner.collections.entry(name.to_string()).or_default();
        collection.indices = indices.to_vec();
        Ok(())
    }

    async fn write_many(
        &self,
        collection: &str,
        documents: Vec<Document>,
    ) -> Result<usize, StoreError> {
        let mut inner = self.lock();
        ensure_open(&inner)?;
        let collection = collection_mut(&mut inner, collection)?;
        let mut written = 0;
        for document in documents {
            if let Some((path, value)) = collection.unique_violation(&document) {
                return Err(StoreError::UniqueViolation { path, value });
            }
            collection.documents.push(document);
            written += 1;
        }
        Ok(written)
    }

    async fn upsert_many(
        &self,
        collection: &str,
        operations: Vec<UpsertOp>,
    ) -> Result<UpsertOutcome, StoreError> {
        let mut inner = self.lock();
        ensure_open(&inner)?;
        let collection = collection_mut(&mut inner, collection)?;
        let mut outcome = UpsertOutcome::default();
        for operation in operations {
            let existing = collection
                .documents
                .iter_mut()
                .find(|document| operation.filter.matches(document));
            match existing {
                Some(document) => {
                    *document = operation.document;
                    outcome.updated += 1;
                }
                None => {
                    collection.documents.push(operation.document);
                    outcome.inserted += 1;
                }
            }
        }
        Ok(outcome)
    }

    async fn find_all(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        let mut inner = self.lock();
        ensure_open(&inner)?;
        let collection = collection_mut(&mut inner, collection)?;
        collection.sweep_expired(Utc::now());
        Ok(collection.documents.clone())
    }

    async fn last_time_per_key(
        &self,
        collection: &str,
        key_path: &FieldPath,
        time_path: &FieldPath,
    ) -> Result<Vec<LastKnownEntry>, StoreError> {
        let mut inner = self.lock();
        ensure_open(&inner)?;
        let collection = collection_mut(&mut inner, collection)?;
        collection.sweep_expired(Utc::now());
        // Sort by (key, time) and keep the last entry per key, the same
        // shape as the backend's sort + group-last pipeline.
        let mut rows: Vec<(String, DateTime<Utc>)> = collection
            .documents
            .iter()
            .filter_map(|document| {
                let key = key_path.get(document)?.as_str()?.to_string();
                let time = time_path
                    .get(document)
                    .and_then(Value::as_str)
                    .and_then(parse_utc_instant)?;
                Some((key, time))
            })
            .collect();
        rows.sort_by(|a, b| a.cmp(b));
        let mut last_per_key: Vec<LastKnownEntry> = Vec::new();
        for (key, time) in rows {
            match last_per_key.last_mut() {
                Some(entry) if entry.key == key => entry.last_time = time,
                _ => last_per_key.push(LastKnownEntry {
                    key,
                    last_time: time,
                }),
            }
        }
        Ok(last_per_key)
    }

    async fn close(&self) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.closed = true;
        Ok(())
    }
}
