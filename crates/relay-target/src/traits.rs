//! TargetStore trait definition.

use anyhow::Result;
use relay_core::{BulkOutcome, DocId, Document, LookupResult};

/// Trait for reading current revisions from and bulk-writing documents to a
/// target document store.
///
/// # Ordering contract
///
/// Both operations answer with one entry per input, in input order. Callers
/// should still match answers by identifier rather than by position.
///
/// # Usage Pattern
///
/// The pipeline is generic over the store for static dispatch:
///
/// ```ignore
/// pub async fn resolve<S: TargetStore>(store: &S, batch: ChangeBatch) -> Result<Vec<Document>> {
///     let lookups = store.lookup_revisions(&ids).await?;
///     // ...
/// }
/// ```
#[async_trait::async_trait]
pub trait TargetStore: Send + Sync {
    /// Look up the current revision of every identifier in one round trip.
    ///
    /// Absent identifiers are reported as [`LookupResult::Absent`], not as
    /// errors. An `Err` means the lookup as a whole failed.
    async fn lookup_revisions(&self, ids: &[DocId]) -> Result<Vec<LookupResult>>;

    /// Write all documents in one call.
    ///
    /// Per-document rejections (conflicts, validation failures) are reported
    /// as [`BulkOutcome::Failed`]. An `Err` means the call itself failed and
    /// nothing can be assumed about which documents were applied.
    async fn bulk_write(&self, docs: &[Document]) -> Result<Vec<BulkOutcome>>;
}

#[async_trait::async_trait]
impl<T: TargetStore + ?Sized> TargetStore for std::sync::Arc<T> {
    async fn lookup_revisions(&self, ids: &[DocId]) -> Result<Vec<LookupResult>> {
        (**self).lookup_revisions(ids).await
    }

    async fn bulk_write(&self, docs: &[Document]) -> Result<Vec<BulkOutcome>> {
        (**self).bulk_write(docs).await
    }
}

#[async_trait::async_trait]
impl<'a, T: TargetStore + ?Sized> TargetStore for &'a T {
    async fn lookup_revisions(&self, ids: &[DocId]) -> Result<Vec<LookupResult>> {
        (**self).lookup_revisions(ids).await
    }

    async fn bulk_write(&self, docs: &[Document]) -> Result<Vec<BulkOutcome>> {
        (**self).bulk_write(docs).await
    }
}
