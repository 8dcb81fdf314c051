//! The persistence collaborator's narrow contract: create indexed
//! collections, write or upsert document batches, and run the one read-side
//! aggregation the sync filter needs. Backends implement [`DocumentStore`];
//! the crate ships [`MemoryStore`](memory::MemoryStore) for tests and local
//! runs.

pub mod error;
pub mod memory;

use crate::sync::last_known::LastKnownEntry;
use crate::types::feature::Document;
use crate::types::field_path::FieldPath;
use async_trait::async_trait;
use error::StoreError;
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// Index definitions handed to `create_collection`. Backends map these onto
/// their native index types; the memory store honors unique and TTL indices
/// and records the rest.
#[derive(Debug, Clone)]
pub enum IndexSpec {
    Fields {
        keys: Vec<(FieldPath, SortOrder)>,
        unique: bool,
        background: bool,
    },
    /// Documents expire `expire_after` past the instant at `path`.
    Ttl {
        path: FieldPath,
        expire_after: Duration,
    },
    /// Geospatial index over a GeoJSON geometry field.
    Geo2dSphere { path: FieldPath },
}

impl IndexSpec {
    pub fn ascending(path: FieldPath) -> Self {
        IndexSpec::Fields {
            keys: vec![(path, SortOrder::Ascending)],
            unique: false,
            background: false,
        }
    }

    pub fn unique(path: FieldPath) -> Self {
        IndexSpec::Fields {
            keys: vec![(path, SortOrder::Ascending)],
            unique: true,
            background: false,
        }
    }

    pub fn compound(keys: Vec<(FieldPath, SortOrder)>, background: bool) -> Self {
        IndexSpec::Fields {
            keys,
            unique: false,
            background,
        }
    }
}

/// A structured equality filter: every clause must match. Built by typed
/// filter-builder functions from a record's own fields, never by string
/// templating.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    clauses: Vec<(FieldPath, Value)>,
}

impl Filter {
    pub fn eq(path: FieldPath, value: impl Into<Value>) -> Self {
        Self {
            clauses: vec![(path, value.into())],
        }
    }

    pub fn and_eq(mut self, path: FieldPath, value: impl Into<Value>) -> Self {
        self.clauses.push((path, value.into()));
        self
    }

    pub fn matches(&self, document: &Document) -> bool {
        self.clauses
            .iter()
            .all(|(path, expected)| path.get(document) == Some(expected))
    }

    pub fn clauses(&self) -> &[(FieldPath, Value)] {
        &self.clauses
    }
}

/// One idempotent update-or-insert: overwrite the first document matching
/// `filter`, or insert `document` when nothing matches.
#[derive(Debug, Clone)]
pub struct UpsertOp {
    pub filter: Filter,
    pub document: Document,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub inserted: usize,
    pub updated: usize,
}

impl UpsertOutcome {
    pub fn absorb(&mut self, other: UpsertOutcome) {
        self.inserted += other.inserted;
        self.updated += other.updated;
    }

    pub fn total(&self) -> usize {
        self.inserted + self.updated
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Creates the collection and its indices; idempotent.
    async fn create_collection(
        &self,
        name: &str,
        indices: &[IndexSpec],
    ) -> Result<(), StoreError>;

    /// Plain inserts; unique indices are enforced.
    async fn write_many(
        &self,
        collection: &str,
        documents: Vec<Document>,
    ) -> Result<usize, StoreError>;

    /// Applies one batch of upserts. Callers chunk; the store must not
    /// reorder operations within a batch.
    async fn upsert_many(
        &self,
        collection: &str,
        operations: Vec<UpsertOp>,
    ) -> Result<UpsertOutcome, StoreError>;

    async fn find_all(&self, collection: &str) -> Result<Vec<Document>, StoreError>;

    /// The read-side aggregation behind the sync filter: group documents by
    /// the value at `key_path`, sort by the instant at `time_path`, and
    /// return the last time per key.
    async fn last_time_per_key(
        &self,
        collection: &str,
        key_path: &FieldPath,
        time_path: &FieldPath,
    ) -> Result<Vec<LastKnownEntry>, StoreError>;

    /// Releases the connection. Further calls fail with
    /// [`StoreError::Closed`].
    async fn close(&self) -> Result<(), StoreError>;
}
