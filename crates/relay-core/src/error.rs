//! Error types for the change-feed data model.

use thiserror::Error;

/// Errors raised while building documents and change records.
#[derive(Error, Debug)]
pub enum RelayError {
    /// The document is not a JSON object.
    #[error("Document must be a JSON object, got: {0}")]
    NotAnObject(String),

    /// The document has no string `_id` field.
    #[error("Document is missing a string `_id` field")]
    MissingId,

    /// Attempted to overwrite a field the data model manages itself.
    #[error("Field `{0}` cannot be overwritten")]
    ReservedField(String),

    /// A change line carries no `seq`.
    #[error("Change line is missing `seq`")]
    MissingSequence,

    /// A change line carries no revision in `changes`.
    #[error("Change line at seq {seq} has no revision in `changes`")]
    MissingChanges { seq: String },

    /// A deleted change line carries no `id`.
    #[error("Deleted change line at seq {seq} has no `id`")]
    MissingTombstoneId { seq: String },

    /// A change line could not be decoded.
    #[error("Malformed change line: {0}")]
    MalformedLine(#[from] serde_json::Error),
}
