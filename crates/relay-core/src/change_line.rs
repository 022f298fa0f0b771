//! Raw change feed lines and their conversion into change records.
//!
//! A change line has the shape emitted by a CouchDB-style `_changes` feed
//! with `include_docs=true`:
//!
//! ```json
//! {"seq": 12, "id": "a", "changes": [{"rev": "2-b"}], "doc": {"_id": "a", "_rev": "2-b"}}
//! ```
//!
//! Lines without a `changes` array (heartbeats, the trailing `last_seq`
//! line) are not changes at all and are filtered out by the feed driver.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::change::{ChangeBatch, ChangeRecord, Sequence};
use crate::document::{DocId, Document, Revision};
use crate::error::RelayError;

/// Default document field the line sequence is copied into.
pub const DEFAULT_SEQ_PROPERTY: &str = "_seq";

/// Revision entry of a change line's `changes` array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionRef {
    pub rev: Revision,
}

/// One line of a change feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeLine {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seq: Option<Sequence>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changes: Option<Vec<RevisionRef>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<Value>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub deleted: bool,
}

impl ChangeLine {
    /// Parse a single JSON line.
    pub fn parse(line: &str) -> Result<Self, RelayError> {
        Ok(serde_json::from_str(line)?)
    }

    /// Whether this line describes a change, as opposed to a heartbeat or
    /// feed trailer.
    pub fn is_change(&self) -> bool {
        self.changes.is_some()
    }
}

/// Converts change lines into change records.
#[derive(Debug, Clone)]
pub struct ChangeLineProcessor {
    seq_property: Option<String>,
}

impl Default for ChangeLineProcessor {
    fn default() -> Self {
        Self {
            seq_property: Some(DEFAULT_SEQ_PROPERTY.to_string()),
        }
    }
}

impl ChangeLineProcessor {
    /// `seq_property` names the document field that receives the line
    /// sequence. `None` leaves documents untouched.
    pub fn new(seq_property: Option<String>) -> Self {
        Self { seq_property }
    }

    pub fn seq_property(&self) -> Option<&str> {
        self.seq_property.as_deref()
    }

    /// Convert one line.
    ///
    /// Returns `Ok(None)` for a line that neither includes a document nor
    /// marks a deletion.
    pub fn process_line(&self, line: &ChangeLine) -> Result<Option<ChangeRecord>, RelayError> {
        let seq = line.seq.clone().ok_or(RelayError::MissingSequence)?;
        let rev = line
            .changes
            .as_ref()
            .and_then(|changes| changes.first())
            .map(|change| change.rev.clone())
            .ok_or_else(|| RelayError::MissingChanges {
                seq: seq.to_string(),
            })?;

        let mut doc = match &line.doc {
            Some(doc) => Document::from_value(doc.clone())?,
            None if line.deleted => {
                let id = line
                    .id
                    .clone()
                    .ok_or_else(|| RelayError::MissingTombstoneId {
                        seq: seq.to_string(),
                    })?;
                Document::tombstone(DocId::new(id), &rev)
            }
            None => {
                tracing::info!(
                    "Skipping change line without document: seq={} id={:?}",
                    seq,
                    line.id
                );
                return Ok(None);
            }
        };

        if let Some(property) = &self.seq_property {
            doc.insert(property.clone(), seq.as_value().clone())?;
        }

        Ok(Some(ChangeRecord::new(doc, Some(rev), seq)))
    }

    /// Convert a buffer of lines into a batch.
    ///
    /// The batch covers the sequence of the last line, including lines that
    /// were skipped.
    pub fn process_lines<'a, I>(&self, lines: I) -> Result<ChangeBatch, RelayError>
    where
        I: IntoIterator<Item = &'a ChangeLine>,
    {
        let mut records = Vec::new();
        let mut position = None;

        for line in lines {
            if let Some(record) = self.process_line(line)? {
                records.push(record);
            }
            position = line.seq.clone();
        }

        Ok(ChangeBatch::with_position(records, position))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn line(value: Value) -> ChangeLine {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_doc_line_injects_seq() {
        let processor = ChangeLineProcessor::default();
        let record = processor
            .process_line(&line(json!({
                "seq": 12,
                "id": "a",
                "changes": [{"rev": "2-b"}],
                "doc": {"_id": "a", "_rev": "2-b", "name": "x"}
            })))
            .unwrap()
            .unwrap();

        assert_eq!(record.sequence, Sequence::from(12));
        assert_eq!(record.revision_hint, Some(Revision::from("2-b")));
        assert_eq!(
            record.document.into_value(),
            json!({"_id": "a", "_rev": "2-b", "name": "x", "_seq": 12})
        );
    }

    #[test]
    fn test_seq_property_disabled() {
        let processor = ChangeLineProcessor::new(None);
        let record = processor
            .process_line(&line(json!({
                "seq": "5-abc",
                "changes": [{"rev": "1-a"}],
                "doc": {"_id": "a"}
            })))
            .unwrap()
            .unwrap();
        assert_eq!(record.document.into_value(), json!({"_id": "a"}));
    }

    #[test]
    fn test_deleted_line_becomes_tombstone() {
        let processor = ChangeLineProcessor::new(Some("seq".to_string()));
        let record = processor
            .process_line(&line(json!({
                "seq": 7,
                "id": "gone",
                "deleted": true,
                "changes": [{"rev": "3-d"}]
            })))
            .unwrap()
            .unwrap();
        assert!(record.document.is_deleted());
        assert_eq!(
            record.document.into_value(),
            json!({"_id": "gone", "_deleted": true, "_rev": "3-d", "seq": 7})
        );
    }

    #[test]
    fn test_line_without_doc_is_skipped() {
        let processor = ChangeLineProcessor::default();
        let result = processor
            .process_line(&line(json!({"seq": 3, "id": "a", "changes": [{"rev": "1-a"}]})))
            .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_malformed_lines() {
        let processor = ChangeLineProcessor::default();
        assert!(matches!(
            processor.process_line(&line(json!({"changes": [{"rev": "1-a"}]}))),
            Err(RelayError::MissingSequence)
        ));
        assert!(matches!(
            processor.process_line(&line(json!({"seq": 1, "changes": []}))),
            Err(RelayError::MissingChanges { .. })
        ));
        assert!(matches!(
            processor.process_line(&line(
                json!({"seq": 1, "changes": [{"rev": "1-a"}], "doc": {"x": 1}})
            )),
            Err(RelayError::MissingId)
        ));
        assert!(matches!(
            processor.process_line(&line(
                json!({"seq": 1, "deleted": true, "changes": [{"rev": "1-a"}]})
            )),
            Err(RelayError::MissingTombstoneId { .. })
        ));
    }

    #[test]
    fn test_process_lines_covers_skipped_tail() {
        let processor = ChangeLineProcessor::default();
        let lines = vec![
            line(json!({"seq": 1, "changes": [{"rev": "1-a"}], "doc": {"_id": "a"}})),
            line(json!({"seq": 2, "id": "b", "changes": [{"rev": "1-b"}]})),
        ];
        let batch = processor.process_lines(&lines).unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.last_sequence(), Some(&Sequence::from(2)));
    }

    #[test]
    fn test_heartbeat_is_not_a_change() {
        let trailer = ChangeLine::parse(r#"{"last_seq": 40, "pending": 0}"#).unwrap();
        assert!(!trailer.is_change());
        assert!(ChangeLine::parse("not json").is_err());
    }
}
