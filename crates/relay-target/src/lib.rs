//! Target store abstraction.
//!
//! This crate defines the `TargetStore` trait the reconciliation pipeline
//! reads from and writes to, plus two implementations:
//!
//! - [`MemoryStore`] - In-process store with revision checking, used by tests
//!   and dry runs
//! - [`CouchStore`] - HTTP client for CouchDB-compatible document stores
//!
//! The trait speaks relay-core types (`DocId`, `Document`, `LookupResult`,
//! `BulkOutcome`) so the pipeline is written once against any store.

mod couch;
mod memory;
mod traits;

pub use couch::{CouchOpts, CouchStore, DEFAULT_REQUEST_TIMEOUT};
pub use memory::MemoryStore;
pub use traits::TargetStore;
