//! Revision reconciliation.
//!
//! Stamps every incoming document with the revision the target store
//! currently holds for it, so the bulk write does not conflict on stale
//! tokens carried over from the source.

use relay_core::{ChangeBatch, DocId, Document, Revision};
use relay_target::TargetStore;
use std::collections::{HashMap, HashSet};

use crate::error::ResolveError;

/// A document ready to be written: its `_rev` is the target store's current
/// revision, or unset when the store has no record of it.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedDocument(Document);

impl ResolvedDocument {
    pub fn document(&self) -> &Document {
        &self.0
    }

    pub fn into_document(self) -> Document {
        self.0
    }

    pub fn id(&self) -> &DocId {
        self.0.id()
    }

    /// Revision the write will present, `None` for an insert.
    pub fn revision(&self) -> Option<Revision> {
        self.0.revision()
    }
}

/// Looks up current revisions for a batch in one call and applies them.
pub struct RevisionResolver<S> {
    store: S,
}

impl<S: TargetStore> RevisionResolver<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Resolve every record of `batch`, preserving order.
    ///
    /// Lookup answers are joined to documents by identifier, never by
    /// position. Documents the store does not know become inserts; any
    /// caller-supplied `_rev` on them is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError`] if the lookup fails or its answer does not
    /// cover exactly the requested identifiers.
    pub async fn resolve(&self, batch: ChangeBatch) -> Result<Vec<ResolvedDocument>, ResolveError> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }

        let mut requested = HashSet::with_capacity(batch.len());
        let ids: Vec<DocId> = batch
            .ids()
            .filter(|id| requested.insert(*id))
            .cloned()
            .collect();

        tracing::debug!("Looking up revisions for {} documents", ids.len());

        let results = self
            .store
            .lookup_revisions(&ids)
            .await
            .map_err(|e| ResolveError::Lookup {
                count: ids.len(),
                source: e.into(),
            })?;

        let mut existing: HashMap<DocId, Option<Revision>> = HashMap::with_capacity(results.len());
        for result in results {
            if !requested.contains(result.id()) {
                return Err(ResolveError::UnexpectedResult(result.id().clone()));
            }
            let rev = result.revision().cloned();
            existing.insert(result.id().clone(), rev);
        }

        batch
            .into_records()
            .into_iter()
            .map(|record| {
                let mut doc = record.document;
                match existing.get(doc.id()) {
                    Some(Some(rev)) => doc.set_revision(rev),
                    Some(None) => doc.clear_revision(),
                    None => return Err(ResolveError::MissingResult(doc.id().clone())),
                }
                Ok(ResolvedDocument(doc))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{batch, ScriptedStore};
    use relay_core::{LookupResult, REV_FIELD};
    use serde_json::json;

    #[tokio::test]
    async fn test_existing_record_rev_is_copied() {
        let store = ScriptedStore::new();
        store.script_lookup(vec![
            LookupResult::found("a", "1-x"),
            LookupResult::absent("b"),
        ]);

        let resolved = RevisionResolver::new(&store)
            .resolve(batch(vec![
                (json!({"_id": "a", "_rev": "9-source", "n": 1}), 10),
                (json!({"_id": "b", "_rev": "4-source"}), 11),
            ]))
            .await
            .unwrap();

        assert_eq!(resolved.len(), 2);
        assert_eq!(
            resolved[0].document().clone().into_value(),
            json!({"_id": "a", "_rev": "1-x", "n": 1})
        );
        assert_eq!(resolved[1].revision(), None);
        assert!(resolved[1].document().get(REV_FIELD).is_none());
        assert_eq!(store.lookup_calls(), 1);
    }

    #[tokio::test]
    async fn test_join_is_by_identifier_not_position() {
        let store = ScriptedStore::new();
        // Answer in reverse order.
        store.script_lookup(vec![
            LookupResult::absent("b"),
            LookupResult::found("a", "3-a"),
        ]);

        let resolved = RevisionResolver::new(&store)
            .resolve(batch(vec![
                (json!({"_id": "a"}), 1),
                (json!({"_id": "b"}), 2),
            ]))
            .await
            .unwrap();

        assert_eq!(resolved[0].id().as_str(), "a");
        assert_eq!(resolved[0].revision(), Some(Revision::from("3-a")));
        assert_eq!(resolved[1].revision(), None);
    }

    #[tokio::test]
    async fn test_lookup_contract_violations() {
        let store = ScriptedStore::new();
        store.script_lookup(vec![LookupResult::found("a", "1-a")]);
        let err = RevisionResolver::new(&store)
            .resolve(batch(vec![(json!({"_id": "a"}), 1), (json!({"_id": "b"}), 2)]))
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::MissingResult(id) if id.as_str() == "b"));

        store.script_lookup(vec![
            LookupResult::found("a", "1-a"),
            LookupResult::absent("zzz"),
        ]);
        let err = RevisionResolver::new(&store)
            .resolve(batch(vec![(json!({"_id": "a"}), 1)]))
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::UnexpectedResult(id) if id.as_str() == "zzz"));
    }

    #[tokio::test]
    async fn test_lookup_failure_is_a_hard_fault() {
        let store = ScriptedStore::new();
        store.fail_lookup("connection refused");

        let err = RevisionResolver::new(&store)
            .resolve(batch(vec![(json!({"_id": "a"}), 1)]))
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::Lookup { count: 1, .. }));
        assert!(err.to_string().contains("connection refused"));
    }

    #[tokio::test]
    async fn test_duplicate_ids_are_looked_up_once() {
        let store = ScriptedStore::new();
        store.seed(json!({"_id": "a"}));

        let resolved = RevisionResolver::new(&store)
            .resolve(batch(vec![(json!({"_id": "a"}), 1), (json!({"_id": "a"}), 2)]))
            .await
            .unwrap();
        assert_eq!(resolved.len(), 2);
        assert_eq!(store.last_lookup_ids(), vec![DocId::from("a")]);
        assert_eq!(resolved[0].revision(), resolved[1].revision());
    }

    #[tokio::test]
    async fn test_empty_batch_skips_lookup() {
        let store = ScriptedStore::new();
        let resolved = RevisionResolver::new(&store)
            .resolve(ChangeBatch::empty())
            .await
            .unwrap();
        assert!(resolved.is_empty());
        assert_eq!(store.lookup_calls(), 0);
    }
}
