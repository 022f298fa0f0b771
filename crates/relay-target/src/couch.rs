//! HTTP client for CouchDB-compatible document stores.
//!
//! Uses the two bulk endpoints of the CouchDB API:
//!
//! - `POST /{db}/_all_docs` with `{"keys": [...]}` for revision lookups
//! - `POST /{db}/_bulk_docs` with `{"docs": [...]}` for writes

use anyhow::{Context, Result};
use async_trait::async_trait;
use relay_core::{BulkOutcome, DocId, Document, LookupResult, Revision};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::traits::TargetStore;

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// CouchDB connection options
#[derive(Clone, Debug)]
pub struct CouchOpts {
    /// Server URL, e.g. `http://localhost:5984`
    pub url: String,
    /// Target database name
    pub database: String,
    /// Timeout applied to every request
    pub timeout: Duration,
}

/// CouchDB-compatible target store.
pub struct CouchStore {
    client: Client,
    db_url: String,
}

impl CouchStore {
    pub fn new(opts: &CouchOpts) -> Result<Self> {
        let client = Client::builder()
            .timeout(opts.timeout)
            .build()
            .context("Failed to build HTTP client")?;
        let db_url = format!("{}/{}", opts.url.trim_end_matches('/'), opts.database);

        tracing::debug!("Using CouchDB target at {db_url}");

        Ok(Self { client, db_url })
    }

    pub fn db_url(&self) -> &str {
        &self.db_url
    }

    async fn post_json<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &serde_json::Value,
    ) -> Result<T> {
        let url = format!("{}/{endpoint}", self.db_url);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("Request to '{url}' failed: {e}"))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!(
                "'{url}' returned status {status}: {}",
                text.trim()
            ));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to decode response from '{url}': {e}"))
    }
}

#[derive(Debug, Deserialize)]
struct AllDocsResponse {
    rows: Vec<AllDocsRow>,
}

#[derive(Debug, Deserialize)]
struct AllDocsRow {
    key: String,
    #[serde(default)]
    value: Option<AllDocsValue>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AllDocsValue {
    rev: String,
    #[serde(default)]
    deleted: bool,
}

#[derive(Debug, Deserialize)]
struct BulkDocsRow {
    id: String,
    #[serde(default)]
    rev: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    reason: Option<String>,
}

fn lookup_results(rows: Vec<AllDocsRow>) -> Result<Vec<LookupResult>> {
    rows.into_iter()
        .map(|row| match (row.value, row.error) {
            (Some(value), _) => Ok(LookupResult::Found {
                id: DocId::new(row.key),
                rev: Revision::new(value.rev),
                deleted: value.deleted,
            }),
            (None, Some(error)) if error == "not_found" => Ok(LookupResult::absent(row.key)),
            (None, Some(error)) => Err(anyhow::anyhow!(
                "Lookup of '{}' failed: {error}",
                row.key
            )),
            (None, None) => Err(anyhow::anyhow!(
                "Lookup row for '{}' has neither value nor error",
                row.key
            )),
        })
        .collect()
}

fn bulk_outcomes(rows: Vec<BulkDocsRow>) -> Result<Vec<BulkOutcome>> {
    rows.into_iter()
        .map(|row| match (row.error, row.rev) {
            (Some(error), _) => Ok(BulkOutcome::Failed {
                id: DocId::new(row.id),
                error,
                reason: row.reason,
            }),
            (None, Some(rev)) => Ok(BulkOutcome::written(row.id, rev)),
            (None, None) => Err(anyhow::anyhow!(
                "Bulk write row for '{}' has neither rev nor error",
                row.id
            )),
        })
        .collect()
}

#[async_trait]
impl TargetStore for CouchStore {
    async fn lookup_revisions(&self, ids: &[DocId]) -> Result<Vec<LookupResult>> {
        let body = serde_json::json!({ "keys": ids });
        let response: AllDocsResponse = self.post_json("_all_docs", &body).await?;
        lookup_results(response.rows)
    }

    async fn bulk_write(&self, docs: &[Document]) -> Result<Vec<BulkOutcome>> {
        let body = serde_json::json!({ "docs": docs });
        let rows: Vec<BulkDocsRow> = self.post_json("_bulk_docs", &body).await?;
        bulk_outcomes(rows)
    }
}
