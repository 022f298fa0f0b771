//! Test infrastructure.
//!
//! [`ScriptedStore`] is a [`MemoryStore`] with failure injection, used to
//! drive the pipeline through lookup faults, transport failures and
//! per-document rejections without a real target store.

use anyhow::Result;
use async_trait::async_trait;
use relay_core::{
    BulkOutcome, ChangeBatch, ChangeLine, ChangeRecord, DocId, Document, LookupResult, Revision,
    Sequence,
};
use relay_target::{MemoryStore, TargetStore};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

enum LookupScript {
    Answer(Vec<LookupResult>),
    Fail(String),
}

enum WriteScript {
    Answer(Vec<BulkOutcome>),
    Fail(String),
}

#[derive(Default)]
struct Script {
    lookups: VecDeque<LookupScript>,
    writes: VecDeque<WriteScript>,
    rejections: HashMap<DocId, String>,
    last_lookup_ids: Vec<DocId>,
    written: Vec<Vec<Document>>,
}

/// Target store whose next answers can be scripted.
///
/// Unscripted calls fall through to an inner [`MemoryStore`].
#[derive(Default)]
pub struct ScriptedStore {
    inner: MemoryStore,
    script: Mutex<Script>,
}

impl ScriptedStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Answer the next lookup with `results` instead of consulting the store.
    pub fn script_lookup(&self, results: Vec<LookupResult>) {
        self.script().lookups.push_back(LookupScript::Answer(results));
    }

    /// Fail the next lookup call.
    pub fn fail_lookup(&self, message: impl Into<String>) {
        self.script()
            .lookups
            .push_back(LookupScript::Fail(message.into()));
    }

    /// Answer the next bulk write with `outcomes` without applying it.
    pub fn script_write(&self, outcomes: Vec<BulkOutcome>) {
        self.script().writes.push_back(WriteScript::Answer(outcomes));
    }

    /// Fail the next bulk write call without applying it.
    pub fn fail_write(&self, message: impl Into<String>) {
        self.script()
            .writes
            .push_back(WriteScript::Fail(message.into()));
    }

    /// Reject every write of `id` with `error` until [`clear_rejections`](Self::clear_rejections).
    pub fn reject(&self, id: impl Into<DocId>, error: impl Into<String>) {
        self.script().rejections.insert(id.into(), error.into());
    }

    pub fn clear_rejections(&self) {
        self.script().rejections.clear();
    }

    pub fn seed(&self, doc: Value) -> Revision {
        self.inner.seed(document(doc))
    }

    pub fn get(&self, id: &str) -> Option<Value> {
        self.inner.get(&DocId::from(id))
    }

    pub fn revision(&self, id: &str) -> Option<Revision> {
        self.inner.revision(&DocId::from(id))
    }

    pub fn live_count(&self) -> usize {
        self.inner.live_count()
    }

    pub fn lookup_calls(&self) -> usize {
        self.inner.lookup_calls()
    }

    pub fn write_calls(&self) -> usize {
        self.inner.write_calls()
    }

    pub fn last_lookup_ids(&self) -> Vec<DocId> {
        self.script().last_lookup_ids.clone()
    }

    /// Documents submitted to each bulk write call, in call order.
    pub fn written(&self) -> Vec<Vec<Document>> {
        self.script().written.clone()
    }
}

#[async_trait]
impl TargetStore for ScriptedStore {
    async fn lookup_revisions(&self, ids: &[DocId]) -> Result<Vec<LookupResult>> {
        let next = {
            let mut script = self.script();
            script.last_lookup_ids = ids.to_vec();
            script.lookups.pop_front()
        };

        // Count every call, scripted or not.
        let real = self.inner.lookup_revisions(ids).await?;
        match next {
            Some(LookupScript::Answer(results)) => Ok(results),
            Some(LookupScript::Fail(message)) => Err(anyhow::anyhow!(message)),
            None => Ok(real),
        }
    }

    async fn bulk_write(&self, docs: &[Document]) -> Result<Vec<BulkOutcome>> {
        let (next, rejections) = {
            let mut script = self.script();
            script.written.push(docs.to_vec());
            (script.writes.pop_front(), script.rejections.clone())
        };

        match next {
            Some(WriteScript::Answer(outcomes)) => {
                self.inner.bulk_write(&[]).await?;
                Ok(outcomes)
            }
            Some(WriteScript::Fail(message)) => {
                self.inner.bulk_write(&[]).await?;
                Err(anyhow::anyhow!(message))
            }
            None if rejections.is_empty() => self.inner.bulk_write(docs).await,
            None => {
                let accepted: Vec<Document> = docs
                    .iter()
                    .filter(|doc| !rejections.contains_key(doc.id()))
                    .cloned()
                    .collect();
                let mut applied = self.inner.bulk_write(&accepted).await?.into_iter();
                Ok(docs
                    .iter()
                    .map(|doc| match rejections.get(doc.id()) {
                        Some(error) => BulkOutcome::failed(doc.id().clone(), error.clone()),
                        None => applied
                            .next()
                            .unwrap_or_else(|| BulkOutcome::failed(doc.id().clone(), "missing")),
                    })
                    .collect())
            }
        }
    }
}

/// Build a document, panicking on invalid input.
pub fn document(value: Value) -> Document {
    Document::from_value(value).expect("test document must be an object with a string _id")
}

/// Build a change record at `seq`.
pub fn record(value: Value, seq: u64) -> ChangeRecord {
    ChangeRecord::new(document(value), None, Sequence::from(seq))
}

/// Build a batch from `(document, seq)` pairs.
pub fn batch(entries: Vec<(Value, u64)>) -> ChangeBatch {
    entries
        .into_iter()
        .map(|(value, seq)| record(value, seq))
        .collect()
}

/// Build a change line carrying `doc` at `seq`.
pub fn change_line(seq: u64, doc: Value) -> ChangeLine {
    let id = doc
        .get("_id")
        .and_then(Value::as_str)
        .map(str::to_string);
    ChangeLine {
        seq: Some(Sequence::from(seq)),
        id,
        changes: Some(vec![relay_core::RevisionRef {
            rev: Revision::from(format!("{seq}-source")),
        }]),
        doc: Some(doc),
        deleted: false,
    }
}
