//! Error types for the reconciliation pipeline.

use relay_core::DocId;
use thiserror::Error;

/// Boxed store error, converted from the store client's `anyhow::Error`.
pub type StoreError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failure to look up current revisions in the target store.
///
/// A lookup fault is never retried or partially applied: nothing is written
/// for a batch whose lookup failed.
#[derive(Error, Debug)]
pub enum ResolveError {
    /// The lookup call itself failed.
    #[error("Revision lookup for {count} documents failed: {source}")]
    Lookup {
        count: usize,
        #[source]
        source: StoreError,
    },

    /// The store answered without an entry for a requested identifier.
    #[error("Revision lookup returned no result for '{0}'")]
    MissingResult(DocId),

    /// The store answered with an identifier that was never requested.
    #[error("Revision lookup returned a result for unrequested '{0}'")]
    UnexpectedResult(DocId),
}

/// A batch could not be committed.
///
/// Transport failures and per-document rejections are both reported as a
/// `ProcessingFailure` so the caller has one failure kind to retry on. The
/// store may have applied part of the batch either way.
#[derive(Error, Debug)]
pub enum ProcessingFailure {
    /// The bulk write call failed as a whole.
    #[error("Bulk write of {count} documents failed: {source}")]
    Transport {
        count: usize,
        #[source]
        source: StoreError,
    },

    /// The store rejected at least one document. Only the first rejection is
    /// reported.
    #[error("Bulk write rejected '{id}' at position {position}: {error}")]
    Rejected {
        id: DocId,
        position: usize,
        error: String,
        reason: Option<String>,
    },

    /// The store answered with a different number of outcomes than documents
    /// submitted, so the result is ambiguous.
    #[error("Bulk write returned {returned} outcomes for {submitted} documents")]
    OutcomeMismatch { submitted: usize, returned: usize },
}

/// Error returned by [`Pipeline::process`](crate::Pipeline::process).
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Hard fault while reading current revisions.
    #[error(transparent)]
    Lookup(#[from] ResolveError),

    /// The batch was not committed; the checkpoint must not advance.
    #[error(transparent)]
    Processing(#[from] ProcessingFailure),
}

impl PipelineError {
    pub fn is_processing_failure(&self) -> bool {
        matches!(self, Self::Processing(_))
    }
}
