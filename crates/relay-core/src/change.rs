//! Change records and batches.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::document::{DocId, Document, Revision};

/// Position on a source change feed.
///
/// Sequences are opaque: numeric feeds and string tokens are both carried
/// as-is and never compared. Only the feed driver interprets them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sequence(Value);

impl Sequence {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

impl From<u64> for Sequence {
    fn from(seq: u64) -> Self {
        Self(Value::from(seq))
    }
}

impl From<&str> for Sequence {
    fn from(seq: &str) -> Self {
        Self(Value::from(seq))
    }
}

impl From<String> for Sequence {
    fn from(seq: String) -> Self {
        Self(Value::String(seq))
    }
}

impl std::fmt::Display for Sequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.0 {
            Value::String(s) => f.write_str(s),
            other => write!(f, "{other}"),
        }
    }
}

/// A document observed on the change feed.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeRecord {
    pub document: Document,
    /// Source-side revision, kept for traceability.
    pub revision_hint: Option<Revision>,
    pub sequence: Sequence,
}

impl ChangeRecord {
    pub fn new(document: Document, revision_hint: Option<Revision>, sequence: Sequence) -> Self {
        Self {
            document,
            revision_hint,
            sequence,
        }
    }

    pub fn id(&self) -> &DocId {
        self.document.id()
    }
}

/// Ordered batch of change records handed to the pipeline in one call.
///
/// A batch also knows the feed position it covers. That is the sequence of
/// the last record unless the producer skipped change lines after it, in
/// which case the position of the last line seen is recorded instead.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChangeBatch {
    records: Vec<ChangeRecord>,
    position: Option<Sequence>,
}

impl ChangeBatch {
    /// Batch covering up to its last record.
    pub fn new(records: Vec<ChangeRecord>) -> Self {
        let position = records.last().map(|r| r.sequence.clone());
        Self { records, position }
    }

    /// Batch covering up to `position`, which may lie past the last record.
    pub fn with_position(records: Vec<ChangeRecord>, position: Option<Sequence>) -> Self {
        let position = position.or_else(|| records.last().map(|r| r.sequence.clone()));
        Self { records, position }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[ChangeRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<ChangeRecord> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Feed position covered by this batch, `None` when nothing was seen.
    pub fn last_sequence(&self) -> Option<&Sequence> {
        self.position.as_ref()
    }

    /// Identifiers in submission order.
    pub fn ids(&self) -> impl Iterator<Item = &DocId> {
        self.records.iter().map(ChangeRecord::id)
    }

    pub fn has_duplicate_ids(&self) -> bool {
        let mut seen = std::collections::HashSet::with_capacity(self.records.len());
        self.ids().any(|id| !seen.insert(id))
    }

    /// Keep only the last record for each identifier.
    ///
    /// Surviving records stay in feed order. The covered position is unchanged.
    pub fn coalesce(self) -> Self {
        let mut last_index: HashMap<DocId, usize> = HashMap::with_capacity(self.records.len());
        for (index, record) in self.records.iter().enumerate() {
            last_index.insert(record.id().clone(), index);
        }

        let records = self
            .records
            .into_iter()
            .enumerate()
            .filter(|(index, record)| last_index.get(record.id()) == Some(index))
            .map(|(_, record)| record)
            .collect();

        Self {
            records,
            position: self.position,
        }
    }
}

impl FromIterator<ChangeRecord> for ChangeBatch {
    fn from_iter<I: IntoIterator<Item = ChangeRecord>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl IntoIterator for ChangeBatch {
    type Item = ChangeRecord;
    type IntoIter = std::vec::IntoIter<ChangeRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}
