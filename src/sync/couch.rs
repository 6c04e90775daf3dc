use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use super::replica::{ChangesBatch, ReplicaDoc, ReplicaStore};
use crate::utils::AppError;

#[derive(Deserialize)]
struct RevRef {
    rev: String,
}

#[derive(Deserialize)]
struct ChangeRow {
    id: String,
    #[serde(default)]
    changes: Vec<RevRef>,
}

#[derive(Deserialize)]
struct ChangesResponse {
    results: Vec<ChangeRow>,
    last_seq: serde_json::Value,
}

#[derive(Deserialize)]
struct BulkGetResponse {
    results: Vec<BulkGetResult>,
}

#[derive(Deserialize)]
struct BulkGetResult {
    docs: Vec<BulkGetEntry>,
}

/// Either `{"ok": doc}` or `{"error": {...}}`
#[derive(Deserialize)]
struct BulkGetEntry {
    #[serde(default)]
    ok: Option<ReplicaDoc>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

impl BulkGetResponse {
    fn into_docs(self) -> Vec<ReplicaDoc> {
        self.results
            .into_iter()
            .flat_map(|result| result.docs)
            .filter_map(|entry| {
                if let Some(error) = &entry.error {
                    log::warn!("⚠️  CouchDB _bulk_get skipped a revision: {}", error);
                }
                entry.ok
            })
            .collect()
    }
}

/// Remote database reached over the CouchDB HTTP API
pub struct CouchReplica {
    http: reqwest::Client,
    db_url: String,
    credentials: Option<(String, String)>,
}

impl CouchReplica {
    /// `db_url` is the database URL, e.g. `http://localhost:5984/ian-users`
    pub fn new(db_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            db_url: db_url.into().trim_end_matches('/').to_string(),
            credentials: None,
        }
    }

    pub fn with_credentials(mut self, username: &str, password: &str) -> Self {
        self.credentials = Some((username.to_string(), password.to_string()));
        self
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let request = self
            .http
            .request(method, format!("{}{}", self.db_url, path))
            .timeout(Duration::from_secs(30));

        match &self.credentials {
            Some((username, password)) => request.basic_auth(username, Some(password)),
            None => request,
        }
    }

    async fn bulk_get(&self, wanted: Vec<serde_json::Value>) -> Result<Vec<ReplicaDoc>, AppError> {
        if wanted.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .request(reqwest::Method::POST, "/_bulk_get")
            .query(&[("revs", "true")])
            .json(&json!({ "docs": wanted }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::BackendUnavailable(format!(
                "CouchDB _bulk_get error: {}",
                response.status()
            )));
        }

        let found: BulkGetResponse = response.json().await?;
        Ok(found.into_docs())
    }

    /// Create the database if missing
    pub async fn ensure_exists(&self) -> Result<(), AppError> {
        let response = self.request(reqwest::Method::PUT, "").send().await?;

        match response.status() {
            status if status.is_success() => {
                log::info!("✅ Created CouchDB database {}", self.db_url);
                Ok(())
            }
            StatusCode::PRECONDITION_FAILED => Ok(()),
            status => Err(AppError::BackendUnavailable(format!(
                "CouchDB error creating {}: {}",
                self.db_url, status
            ))),
        }
    }
}

#[async_trait]
impl ReplicaStore for CouchReplica {
    fn name(&self) -> &str {
        &self.db_url
    }

    async fn changes(&self, since: &str, limit: usize) -> Result<ChangesBatch, AppError> {
        let since = if since.is_empty() { "0" } else { since };

        let response = self
            .request(reqwest::Method::GET, "/_changes")
            .query(&[
                ("since", since.to_string()),
                ("style", "main_only".to_string()),
                ("limit", limit.max(1).to_string()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::BackendUnavailable(format!(
                "CouchDB _changes error: {}",
                response.status()
            )));
        }

        let feed: ChangesResponse = response.json().await?;

        // CouchDB 1.x numbers, 2.x+ opaque strings
        let last_seq = match feed.last_seq {
            serde_json::Value::String(seq) => seq,
            other => other.to_string(),
        };

        // Winning revisions with their `_revisions` ancestry, so the target
        // can tell a descendant from a conflicting branch
        let wanted: Vec<serde_json::Value> = feed
            .results
            .iter()
            .filter_map(|row| row.changes.first().map(|change| json!({ "id": row.id, "rev": change.rev })))
            .collect();

        Ok(ChangesBatch {
            docs: self.bulk_get(wanted).await?,
            last_seq,
        })
    }

    async fn bulk_write(&self, docs: Vec<ReplicaDoc>) -> Result<(), AppError> {
        if docs.is_empty() {
            return Ok(());
        }

        // new_edits=false: CouchDB keeps the given revisions, grafts them onto
        // their `_revisions` ancestry and picks the winner itself
        let response = self
            .request(reqwest::Method::POST, "/_bulk_docs")
            .json(&json!({ "docs": docs, "new_edits": false }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::BackendUnavailable(format!(
                "CouchDB _bulk_docs error: {}",
                response.status()
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_changes_response_parsing() {
        let feed: ChangesResponse = serde_json::from_value(json!({
            "results": [
                { "seq": "1-g1", "id": "a", "changes": [{ "rev": "1-x" }] },
                { "seq": "2-g1", "id": "b", "deleted": true, "changes": [{ "rev": "2-y" }] }
            ],
            "last_seq": "2-g1",
            "pending": 0
        }))
        .unwrap();

        assert_eq!(feed.results.len(), 2);
        assert_eq!(feed.results[1].id, "b");
        assert_eq!(feed.results[1].changes[0].rev, "2-y");
        assert_eq!(feed.last_seq, json!("2-g1"));
    }

    #[test]
    fn test_bulk_get_keeps_revision_ancestry() {
        let found: BulkGetResponse = serde_json::from_value(json!({
            "results": [
                { "id": "a", "docs": [{ "ok": {
                    "_id": "a", "_rev": "1-x", "name": "Alice",
                    "_revisions": { "start": 1, "ids": ["x"] }
                } }] },
                { "id": "b", "docs": [{ "ok": {
                    "_id": "b", "_rev": "2-y", "_deleted": true,
                    "_revisions": { "start": 2, "ids": ["y", "w"] }
                } }] },
                { "id": "c", "docs": [{ "error": {
                    "id": "c", "rev": "1-q", "error": "not_found", "reason": "missing"
                } }] }
            ]
        }))
        .unwrap();

        let docs = found.into_docs();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].body["name"], "Alice");

        let tombstone = &docs[1];
        assert!(tombstone.deleted);
        assert!(tombstone.descends_from("1-w"));

        // Pushed back with its ancestry intact
        let wire = serde_json::to_value(tombstone).unwrap();
        assert_eq!(wire["_revisions"], json!({ "start": 2, "ids": ["y", "w"] }));
    }

    #[tokio::test]
    #[ignore] // Requires CouchDB on localhost:5984
    async fn test_couch_round_trip() {
        let replica = CouchReplica::new("http://localhost:5984/ian-sync-test").with_credentials("admin", "admin");
        replica.ensure_exists().await.unwrap();

        let doc: ReplicaDoc = serde_json::from_value(json!({
            "_id": format!("doc-{}", uuid::Uuid::new_v4()),
            "_rev": "1-abc",
            "value": 42
        }))
        .unwrap();
        replica.bulk_write(vec![doc.clone()]).await.unwrap();

        let batch = replica.changes("", 10_000).await.unwrap();
        let pulled = batch.docs.iter().find(|found| found.id == doc.id).unwrap();
        assert!(pulled.revisions.is_some());
    }
}
