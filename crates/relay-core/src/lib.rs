//! Core types for the relay-sync framework.
//!
//! This crate provides the data model shared by the reconciliation pipeline,
//! the target store clients and the checkpoint tracker:
//!
//! - [`Document`] - A JSON document with a guaranteed string `_id`
//! - [`ChangeRecord`] / [`ChangeBatch`] - Documents observed on a change feed
//! - [`Sequence`] - Opaque change feed position
//! - [`LookupResult`] / [`BulkOutcome`] - Per-document answers from a target store
//! - [`ChangeLineProcessor`] - Turns raw change feed lines into change records
//!
//! # Architecture
//!
//! ```text
//! relay-core (this crate)
//!    │
//!    ├─── relay-target   (TargetStore trait + store clients)
//!    ├─── checkpoint     (sequence checkpoint tracking)
//!    └─── relay-sync     (resolver, committer, pipeline, feed driver)
//! ```

pub mod change;
pub mod change_line;
pub mod document;
pub mod error;
pub mod outcome;

pub use change::{ChangeBatch, ChangeRecord, Sequence};
pub use change_line::{ChangeLine, ChangeLineProcessor, RevisionRef, DEFAULT_SEQ_PROPERTY};
pub use document::{DocId, Document, Revision, DELETED_FIELD, ID_FIELD, REV_FIELD};
pub use error::RelayError;
pub use outcome::{BulkOutcome, LookupResult};
