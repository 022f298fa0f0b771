//! In-memory target store.

use anyhow::Result;
use async_trait::async_trait;
use relay_core::{BulkOutcome, DocId, Document, LookupResult, Revision};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::traits::TargetStore;

#[derive(Debug, Clone)]
struct StoredRecord {
    generation: u64,
    rev: Revision,
    deleted: bool,
    body: Value,
}

/// In-process document store with CouchDB-style revision checking.
///
/// - Updating an existing document requires its current `_rev`.
/// - Inserting requires no `_rev`, unless the stored record is a tombstone.
/// - Writing `_deleted: true` leaves a tombstone that still has a revision.
///
/// Revisions are `"{generation}-{uuid}"`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<DocId, StoredRecord>>,
    lookup_calls: AtomicUsize,
    write_calls: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> MutexGuard<'_, HashMap<DocId, StoredRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store a document directly, bypassing revision checks, and return its
    /// new revision.
    pub fn seed(&self, doc: Document) -> Revision {
        let mut records = self.records();
        let generation = records.get(doc.id()).map_or(1, |r| r.generation + 1);
        let record = Self::make_record(doc.clone(), generation);
        let rev = record.rev.clone();
        records.insert(doc.id().clone(), record);
        rev
    }

    /// Stored body of a document, including `_rev`.
    pub fn get(&self, id: &DocId) -> Option<Value> {
        self.records().get(id).map(|r| r.body.clone())
    }

    pub fn revision(&self, id: &DocId) -> Option<Revision> {
        self.records().get(id).map(|r| r.rev.clone())
    }

    /// Number of live (non-deleted) documents.
    pub fn live_count(&self) -> usize {
        self.records().values().filter(|r| !r.deleted).count()
    }

    pub fn lookup_calls(&self) -> usize {
        self.lookup_calls.load(Ordering::SeqCst)
    }

    pub fn write_calls(&self) -> usize {
        self.write_calls.load(Ordering::SeqCst)
    }

    fn make_record(mut doc: Document, generation: u64) -> StoredRecord {
        let rev = Revision::new(format!("{generation}-{}", uuid::Uuid::new_v4().simple()));
        doc.set_revision(&rev);
        StoredRecord {
            generation,
            rev,
            deleted: doc.is_deleted(),
            body: doc.into_value(),
        }
    }

    fn write_one(records: &mut HashMap<DocId, StoredRecord>, doc: &Document) -> BulkOutcome {
        let incoming = doc.revision();
        let generation = match (records.get(doc.id()), incoming.as_ref()) {
            (None, None) => 1,
            (Some(current), Some(rev)) if &current.rev == rev => current.generation + 1,
            (Some(current), None) if current.deleted => current.generation + 1,
            _ => {
                return BulkOutcome::Failed {
                    id: doc.id().clone(),
                    error: "conflict".to_string(),
                    reason: Some("Document update conflict.".to_string()),
                }
            }
        };

        let record = Self::make_record(doc.clone(), generation);
        let outcome = BulkOutcome::written(doc.id().clone(), record.rev.clone());
        records.insert(doc.id().clone(), record);
        outcome
    }
}

#[async_trait]
impl TargetStore for MemoryStore {
    async fn lookup_revisions(&self, ids: &[DocId]) -> Result<Vec<LookupResult>> {
        self.lookup_calls.fetch_add(1, Ordering::SeqCst);
        let records = self.records();
        Ok(ids
            .iter()
            .map(|id| match records.get(id) {
                Some(record) => LookupResult::Found {
                    id: id.clone(),
                    rev: record.rev.clone(),
                    deleted: record.deleted,
                },
                None => LookupResult::absent(id.clone()),
            })
            .collect())
    }

    async fn bulk_write(&self, docs: &[Document]) -> Result<Vec<BulkOutcome>> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        let mut records = self.records();
        Ok(docs
            .iter()
            .map(|doc| Self::write_one(&mut records, doc))
            .collect())
    }
}
