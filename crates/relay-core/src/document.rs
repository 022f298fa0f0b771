//! Document representation.
//!
//! A [`Document`] is a JSON object that always carries a string `_id`. The
//! concurrency token lives in the `_rev` field and is the only field the
//! reconciliation pipeline is allowed to touch.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::RelayError;

/// Field holding the document identifier.
pub const ID_FIELD: &str = "_id";
/// Field holding the concurrency token.
pub const REV_FIELD: &str = "_rev";
/// Field marking a tombstone.
pub const DELETED_FIELD: &str = "_deleted";

/// Document identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocId(String);

impl DocId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for DocId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for DocId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for DocId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Concurrency token (revision) of a stored document.
///
/// Opaque to this crate: revisions are compared for equality only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Revision(String);

impl Revision {
    pub fn new(rev: impl Into<String>) -> Self {
        Self(rev.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Revision {
    fn from(rev: &str) -> Self {
        Self::new(rev)
    }
}

impl From<String> for Revision {
    fn from(rev: String) -> Self {
        Self(rev)
    }
}

impl std::fmt::Display for Revision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A JSON object with a guaranteed string `_id`.
///
/// Serializes as the plain JSON object, so a `Document` can be handed to a
/// store client as-is.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    id: DocId,
    fields: Map<String, Value>,
}

impl Document {
    /// Build a document from a JSON value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not an object or has no string `_id`.
    pub fn from_value(value: Value) -> Result<Self, RelayError> {
        match value {
            Value::Object(fields) => Self::from_map(fields),
            other => Err(RelayError::NotAnObject(other.to_string())),
        }
    }

    /// Build a document from a JSON object.
    pub fn from_map(fields: Map<String, Value>) -> Result<Self, RelayError> {
        let id = match fields.get(ID_FIELD) {
            Some(Value::String(id)) => DocId::new(id.clone()),
            _ => return Err(RelayError::MissingId),
        };
        Ok(Self { id, fields })
    }

    /// Build a tombstone for a deleted document.
    pub fn tombstone(id: DocId, rev: &Revision) -> Self {
        let mut fields = Map::new();
        fields.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
        fields.insert(DELETED_FIELD.to_string(), Value::Bool(true));
        fields.insert(REV_FIELD.to_string(), Value::String(rev.to_string()));
        Self { id, fields }
    }

    pub fn id(&self) -> &DocId {
        &self.id
    }

    /// Current concurrency token, if the `_rev` field holds a string.
    pub fn revision(&self) -> Option<Revision> {
        match self.fields.get(REV_FIELD) {
            Some(Value::String(rev)) => Some(Revision::new(rev.clone())),
            _ => None,
        }
    }

    pub fn set_revision(&mut self, rev: &Revision) {
        self.fields
            .insert(REV_FIELD.to_string(), Value::String(rev.to_string()));
    }

    /// Remove the concurrency token, turning the write into an insert.
    pub fn clear_revision(&mut self) {
        self.fields.remove(REV_FIELD);
    }

    pub fn is_deleted(&self) -> bool {
        matches!(self.fields.get(DELETED_FIELD), Some(Value::Bool(true)))
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Set a field other than `_id`.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::ReservedField`] when `field` is `_id`.
    pub fn insert(
        &mut self,
        field: impl Into<String>,
        value: Value,
    ) -> Result<Option<Value>, RelayError> {
        let field = field.into();
        if field == ID_FIELD {
            return Err(RelayError::ReservedField(field));
        }
        Ok(self.fields.insert(field, value))
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }
}

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.fields.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Document {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Document::from_value(value).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_value_requires_object() {
        let err = Document::from_value(json!([1, 2])).unwrap_err();
        assert!(matches!(err, RelayError::NotAnObject(_)));
    }

    #[test]
    fn test_from_value_requires_string_id() {
        assert!(matches!(
            Document::from_value(json!({"name": "x"})),
            Err(RelayError::MissingId)
        ));
        assert!(matches!(
            Document::from_value(json!({"_id": 7})),
            Err(RelayError::MissingId)
        ));
    }

    #[test]
    fn test_revision_set_and_clear() {
        let mut doc = Document::from_value(json!({"_id": "a", "_rev": "1-x"})).unwrap();
        assert_eq!(doc.revision(), Some(Revision::from("1-x")));

        doc.set_revision(&Revision::from("2-y"));
        assert_eq!(doc.get(REV_FIELD), Some(&json!("2-y")));

        doc.clear_revision();
        assert_eq!(doc.revision(), None);
        assert_eq!(doc.into_value(), json!({"_id": "a"}));
    }

    #[test]
    fn test_insert_rejects_id() {
        let mut doc = Document::from_value(json!({"_id": "a"})).unwrap();
        assert!(matches!(
            doc.insert("_id", json!("b")),
            Err(RelayError::ReservedField(_))
        ));
        assert_eq!(doc.id().as_str(), "a");
    }

    #[test]
    fn test_tombstone() {
        let doc = Document::tombstone(DocId::from("gone"), &Revision::from("3-z"));
        assert!(doc.is_deleted());
        assert_eq!(
            doc.into_value(),
            json!({"_id": "gone", "_deleted": true, "_rev": "3-z"})
        );
    }

    #[test]
    fn test_serde_is_plain_object() {
        let doc: Document = serde_json::from_str(r#"{"_id":"a","n":1}"#).unwrap();
        assert_eq!(serde_json::to_value(&doc).unwrap(), json!({"_id": "a", "n": 1}));

        let bad: Result<Document, _> = serde_json::from_str(r#"{"n":1}"#);
        assert!(bad.is_err());
    }
}
