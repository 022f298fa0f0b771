//! CouchDB-backed checkpoint storage.
//!
//! Each feed's checkpoint is one document, `checkpoint_{feed}`, in a
//! CouchDB database:
//!
//! ```json
//! {
//!     "_id": "checkpoint_orders",
//!     "_rev": "3-917fa23",
//!     "seq": "1042-g1AAAA",
//!     "kind": "sequence",
//!     "feed": "orders",
//!     "checkpoint": { "sequence": "1042-g1AAAA", "updated_at": "2024-01-01T00:00:00Z" },
//!     "created_at": "2024-01-01T00:00:00Z"
//! }
//! ```
//!
//! The store remembers the `_rev` of the last document it read or wrote and
//! presents it on the next update. If another writer changed the document
//! in between, CouchDB answers 409 and the update fails.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::store::CheckpointStore;
use crate::{validate_feed_name, CheckpointFile};

#[derive(Debug, Serialize, Deserialize)]
struct CheckpointDoc {
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "_rev", default, skip_serializing_if = "Option::is_none")]
    rev: Option<String>,
    /// Copy of the stored sequence, for people reading the document.
    #[serde(default)]
    seq: serde_json::Value,
    #[serde(flatten)]
    file: CheckpointFile,
}

#[derive(Debug, Deserialize)]
struct PutResponse {
    rev: String,
}

/// CouchDB implementation of CheckpointStore trait.
pub struct CouchCheckpointStore {
    client: Client,
    db_url: String,
    revs: Mutex<HashMap<String, String>>,
}

impl CouchCheckpointStore {
    /// Connect to `database` on the CouchDB server at `url`.
    pub fn new(url: &str, database: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        let db_url = format!("{}/{}", url.trim_end_matches('/'), database);
        tracing::debug!("Using CouchDB checkpoint store at {db_url}");
        Ok(Self {
            client,
            db_url,
            revs: Mutex::new(HashMap::new()),
        })
    }

    pub fn db_url(&self) -> &str {
        &self.db_url
    }

    /// Document id of the checkpoint for `feed`.
    pub fn doc_id(feed: &str) -> Result<String> {
        validate_feed_name(feed)?;
        Ok(format!("checkpoint_{feed}"))
    }

    fn revs(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.revs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn fetch(&self, doc_id: &str) -> Result<Option<CheckpointDoc>> {
        let url = format!("{}/{doc_id}", self.db_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("Request to '{url}' failed: {e}"))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            self.revs().remove(doc_id);
            return Ok(None);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("'{url}' returned status {status}: {}", text.trim());
        }

        let doc: CheckpointDoc = response
            .json()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to decode checkpoint document '{url}': {e}"))?;
        if let Some(rev) = &doc.rev {
            self.revs().insert(doc_id.to_string(), rev.clone());
        }
        Ok(Some(doc))
    }
}

#[async_trait]
impl CheckpointStore for CouchCheckpointStore {
    async fn store_checkpoint(&self, file: &CheckpointFile) -> Result<()> {
        let doc_id = Self::doc_id(&file.feed)?;

        let cached = self.revs().get(&doc_id).cloned();
        let rev = match cached {
            Some(rev) => Some(rev),
            None => self.fetch(&doc_id).await?.and_then(|doc| doc.rev),
        };

        let doc = CheckpointDoc {
            id: doc_id.clone(),
            rev,
            seq: file
                .checkpoint
                .get("sequence")
                .cloned()
                .unwrap_or(serde_json::Value::Null),
            file: file.clone(),
        };

        let url = format!("{}/{doc_id}", self.db_url);
        let response = self
            .client
            .put(&url)
            .json(&doc)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("Request to '{url}' failed: {e}"))?;

        let status = response.status();
        if status == StatusCode::CONFLICT {
            self.revs().remove(&doc_id);
            anyhow::bail!(
                "Checkpoint document '{doc_id}' update conflict: it was changed by another writer"
            );
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("'{url}' returned status {status}: {}", text.trim());
        }

        let saved: PutResponse = response
            .json()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to decode response from '{url}': {e}"))?;
        tracing::debug!("Stored checkpoint {doc_id} at rev {}", saved.rev);
        self.revs().insert(doc_id, saved.rev);
        Ok(())
    }

    async fn read_checkpoint(&self, feed: &str) -> Result<Option<CheckpointFile>> {
        let doc_id = Self::doc_id(feed)?;
        Ok(self.fetch(&doc_id).await?.map(|doc| doc.file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CheckpointTracker, SequenceCheckpoint};
    use relay_core::Sequence;
    use serde_json::{json, Value};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::task::JoinHandle;

    struct Received {
        request_line: String,
        body: Value,
    }

    async fn read_request(socket: &mut TcpStream) -> Received {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            assert!(n > 0, "connection closed before request was complete");
            buf.extend_from_slice(&chunk[..n]);

            let Some(header_end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
                continue;
            };
            let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
            let content_length = head
                .lines()
                .filter_map(|line| line.split_once(':'))
                .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
                .map(|(_, value)| value.trim().parse::<usize>().unwrap())
                .unwrap_or(0);

            let body_start = header_end + 4;
            if buf.len() >= body_start + content_length {
                let body = &buf[body_start..body_start + content_length];
                return Received {
                    request_line: head.lines().next().unwrap().to_string(),
                    body: serde_json::from_slice(body).unwrap_or(Value::Null),
                };
            }
        }
    }

    /// Answer one request per canned `(status, body)` pair, in order.
    async fn serve(responses: Vec<(&'static str, Value)>) -> (String, JoinHandle<Vec<Received>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let mut received = Vec::new();
            for (status, body) in responses {
                let (mut socket, _) = listener.accept().await.unwrap();
                received.push(read_request(&mut socket).await);
                let body = body.to_string();
                let response = format!(
                    "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                socket.write_all(response.as_bytes()).await.unwrap();
                socket.shutdown().await.ok();
            }
            received
        });

        (url, handle)
    }

    fn not_found() -> (&'static str, Value) {
        (
            "404 Object Not Found",
            json!({"error": "not_found", "reason": "missing"}),
        )
    }

    fn store_at(url: &str) -> CouchCheckpointStore {
        CouchCheckpointStore::new(url, "checkpoints", Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_missing_document_reads_as_none() {
        let (url, server) = serve(vec![not_found()]).await;

        let tracker = CheckpointTracker::new(store_at(&url), "orders").unwrap();
        assert_eq!(tracker.get_seq().await.unwrap(), None);

        let received = server.await.unwrap();
        assert!(received[0]
            .request_line
            .starts_with("GET /checkpoints/checkpoint_orders "));
    }

    #[tokio::test]
    async fn test_put_seq_carries_revision_forward() {
        let (url, server) = serve(vec![
            not_found(),
            (
                "201 Created",
                json!({"ok": true, "id": "checkpoint_orders", "rev": "1-a"}),
            ),
            (
                "201 Created",
                json!({"ok": true, "id": "checkpoint_orders", "rev": "2-b"}),
            ),
        ])
        .await;

        let tracker = CheckpointTracker::new(store_at(&url), "orders").unwrap();
        tracker.put_seq(&Sequence::from(5)).await.unwrap();
        tracker.put_seq(&Sequence::from("9-g1AA")).await.unwrap();

        let received = server.await.unwrap();
        assert_eq!(received.len(), 3);

        let first = &received[1];
        assert!(first
            .request_line
            .starts_with("PUT /checkpoints/checkpoint_orders "));
        assert_eq!(first.body["_id"], json!("checkpoint_orders"));
        assert_eq!(first.body["seq"], json!(5));
        assert!(first.body.get("_rev").is_none());
        assert_eq!(first.body["kind"], json!("sequence"));

        let second = &received[2];
        assert_eq!(second.body["_rev"], json!("1-a"));
        assert_eq!(second.body["seq"], json!("9-g1AA"));
    }

    #[tokio::test]
    async fn test_update_conflict_is_an_error() {
        let (url, server) = serve(vec![
            not_found(),
            (
                "409 Conflict",
                json!({"error": "conflict", "reason": "Document update conflict."}),
            ),
        ])
        .await;

        let tracker = CheckpointTracker::new(store_at(&url), "orders").unwrap();
        let err = tracker.put_seq(&Sequence::from(5)).await.unwrap_err();
        assert!(err.to_string().contains("conflict"));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_reads_existing_document() {
        let file =
            CheckpointFile::new("orders", &SequenceCheckpoint::new(Sequence::from(42))).unwrap();
        let mut stored = serde_json::to_value(&file).unwrap();
        stored["_id"] = json!("checkpoint_orders");
        stored["_rev"] = json!("7-c");
        stored["seq"] = json!(42);

        let (url, server) = serve(vec![
            ("200 OK", stored),
            (
                "201 Created",
                json!({"ok": true, "id": "checkpoint_orders", "rev": "8-d"}),
            ),
        ])
        .await;

        let tracker = CheckpointTracker::new(store_at(&url), "orders").unwrap();
        assert_eq!(tracker.get_seq().await.unwrap(), Some(Sequence::from(42)));
        tracker.put_seq(&Sequence::from(43)).await.unwrap();

        let received = server.await.unwrap();
        assert_eq!(received[1].body["_rev"], json!("7-c"));
    }
}
