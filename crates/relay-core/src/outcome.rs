//! Per-document answers returned by a target store.

use serde::{Deserialize, Serialize};

use crate::document::{DocId, Revision};

/// Result of looking up one identifier in the target store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LookupResult {
    /// The store holds a record for the identifier. Tombstones count as
    /// records: they still carry the token a write must present.
    Found {
        id: DocId,
        rev: Revision,
        #[serde(default)]
        deleted: bool,
    },
    /// The store has never seen the identifier.
    Absent { id: DocId },
}

impl LookupResult {
    pub fn found(id: impl Into<DocId>, rev: impl Into<Revision>) -> Self {
        Self::Found {
            id: id.into(),
            rev: rev.into(),
            deleted: false,
        }
    }

    pub fn absent(id: impl Into<DocId>) -> Self {
        Self::Absent { id: id.into() }
    }

    pub fn id(&self) -> &DocId {
        match self {
            Self::Found { id, .. } | Self::Absent { id } => id,
        }
    }

    pub fn revision(&self) -> Option<&Revision> {
        match self {
            Self::Found { rev, .. } => Some(rev),
            Self::Absent { .. } => None,
        }
    }
}

/// Outcome of writing one document in a bulk write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum BulkOutcome {
    Written {
        id: DocId,
        rev: Revision,
    },
    Failed {
        id: DocId,
        /// Store error kind, e.g. `conflict` or `forbidden`.
        error: String,
        #[serde(default)]
        reason: Option<String>,
    },
}

impl BulkOutcome {
    pub fn written(id: impl Into<DocId>, rev: impl Into<Revision>) -> Self {
        Self::Written {
            id: id.into(),
            rev: rev.into(),
        }
    }

    pub fn failed(id: impl Into<DocId>, error: impl Into<String>) -> Self {
        Self::Failed {
            id: id.into(),
            error: error.into(),
            reason: None,
        }
    }

    pub fn id(&self) -> &DocId {
        match self {
            Self::Written { id, .. } | Self::Failed { id, .. } => id,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}
