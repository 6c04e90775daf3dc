use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::utils::AppError;

/// Most revisions of history kept per document, as CouchDB's default `_revs_limit`
pub const REVS_LIMIT: usize = 1000;

/// A replicated document in CouchDB shape: `_id`, `_rev`, optional `_deleted`,
/// the revision history and the body fields inline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplicaDoc {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev")]
    pub rev: String,
    #[serde(rename = "_deleted", default, skip_serializing_if = "std::ops::Not::not")]
    pub deleted: bool,
    #[serde(rename = "_revisions", default, skip_serializing_if = "Option::is_none")]
    pub revisions: Option<Revisions>,
    #[serde(flatten)]
    pub body: Map<String, Value>,
}

/// Revision path in `_revisions` form: `ids` are the hashes, newest first,
/// and `start` is the generation of the first one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revisions {
    pub start: u64,
    pub ids: Vec<String>,
}

impl Revisions {
    /// Path consisting of `rev` alone
    pub fn root(rev: &str) -> Self {
        Self {
            start: generation(rev),
            ids: vec![rev_hash(rev).to_string()],
        }
    }

    /// Full `N-hash` revisions, newest first
    pub fn revs(&self) -> impl Iterator<Item = String> + '_ {
        self.ids
            .iter()
            .enumerate()
            .map(move |(depth, hash)| format!("{}-{}", self.start.saturating_sub(depth as u64), hash))
    }
}

impl ReplicaDoc {
    /// The revision path ending at `self.rev`
    pub fn history(&self) -> Revisions {
        match &self.revisions {
            Some(revisions) if revisions.revs().next().as_deref() == Some(self.rev.as_str()) => revisions.clone(),
            _ => Revisions::root(&self.rev),
        }
    }

    /// Whether `rev` is this revision or one of its ancestors
    pub fn descends_from(&self, rev: &str) -> bool {
        self.history().revs().any(|ancestor| ancestor == rev)
    }
}

/// One page of a changes feed
#[derive(Debug, Clone, Default)]
pub struct ChangesBatch {
    pub docs: Vec<ReplicaDoc>,
    /// Checkpoint to resume from
    pub last_seq: String,
}

/// Revision generation: the `N` of `N-hash`, 0 when unparsable
pub fn generation(rev: &str) -> u64 {
    rev.split_once('-')
        .and_then(|(generation, _)| generation.parse().ok())
        .unwrap_or(0)
}

fn rev_hash(rev: &str) -> &str {
    rev.split_once('-').map(|(_, hash)| hash).unwrap_or(rev)
}

/// Next revision after `previous`
pub fn next_rev(previous: Option<&str>) -> String {
    let generation = previous.map(generation).unwrap_or(0) + 1;
    format!("{}-{}", generation, Uuid::new_v4().simple())
}

/// Last-write-wins by revision: higher generation wins, ties go to the
/// lexicographically greater revision string.
pub fn rev_wins(candidate: &str, current: &str) -> bool {
    (generation(candidate), candidate) > (generation(current), current)
}

/// Whether an incoming revision replaces the stored one. A descendant always
/// replaces its ancestor. Between conflicting branches a live leaf beats a
/// deleted one, then [`rev_wins`] decides, matching CouchDB's winner choice.
pub fn supersedes(candidate: &ReplicaDoc, current: &ReplicaDoc) -> bool {
    if candidate.rev == current.rev || current.descends_from(&candidate.rev) {
        return false;
    }
    if candidate.descends_from(&current.rev) {
        return true;
    }

    match (candidate.deleted, current.deleted) {
        (false, true) => true,
        (true, false) => false,
        _ => rev_wins(&candidate.rev, &current.rev),
    }
}

/// History of a new revision `rev` written on top of `parent`
fn extend_history(parent: Option<&ReplicaDoc>, rev: &str) -> Revisions {
    let mut ids = vec![rev_hash(rev).to_string()];
    if let Some(parent) = parent {
        ids.extend(parent.history().ids);
    }
    ids.truncate(REVS_LIMIT);

    Revisions {
        start: generation(rev),
        ids,
    }
}

/// A database that can take part in replication
#[async_trait]
pub trait ReplicaStore: Send + Sync {
    fn name(&self) -> &str;

    /// Changes after `since` (empty string = from the beginning), oldest first
    async fn changes(&self, since: &str, limit: usize) -> Result<ChangesBatch, AppError>;

    /// Store revisions as-is (no new revisions are generated)
    async fn bulk_write(&self, docs: Vec<ReplicaDoc>) -> Result<(), AppError>;
}

struct Entry {
    seq: u64,
    doc: ReplicaDoc,
}

#[derive(Default)]
struct Inner {
    seq: u64,
    docs: BTreeMap<String, Entry>,
}

impl Inner {
    fn store(&mut self, doc: ReplicaDoc) {
        self.seq += 1;
        let seq = self.seq;
        self.docs.insert(doc.id.clone(), Entry { seq, doc });
    }
}

/// In-process replica. Keeps only the winning revision of each document and
/// tombstones for deletions.
pub struct MemoryReplica {
    name: String,
    inner: Mutex<Inner>,
}

impl MemoryReplica {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inner: Mutex::new(Inner::default()),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, AppError> {
        self.inner
            .lock()
            .map_err(|_| AppError::BackendUnavailable(format!("replica {} lock poisoned", self.name)))
    }

    /// Local edit: writes `body` as a new revision and returns it
    pub fn put(&self, id: &str, body: Value) -> Result<String, AppError> {
        let Value::Object(body) = body else {
            return Err(AppError::InvalidRequest("Document body must be an object".to_string()));
        };

        let mut inner = self.lock()?;
        let parent = inner.docs.get(id).map(|entry| entry.doc.clone());
        let rev = next_rev(parent.as_ref().map(|doc| doc.rev.as_str()));

        inner.store(ReplicaDoc {
            id: id.to_string(),
            rev: rev.clone(),
            deleted: false,
            revisions: Some(extend_history(parent.as_ref(), &rev)),
            body,
        });
        Ok(rev)
    }

    /// Live document, `None` when missing or deleted
    pub fn get(&self, id: &str) -> Option<ReplicaDoc> {
        let inner = self.lock().ok()?;
        inner
            .docs
            .get(id)
            .filter(|entry| !entry.doc.deleted)
            .map(|entry| entry.doc.clone())
    }

    pub fn delete(&self, id: &str) -> Result<String, AppError> {
        let mut inner = self.lock()?;
        let parent = match inner.docs.get(id) {
            Some(entry) if !entry.doc.deleted => entry.doc.clone(),
            _ => return Err(AppError::NotFound(format!("Document {} not found", id))),
        };
        let rev = next_rev(Some(&parent.rev));

        inner.store(ReplicaDoc {
            id: id.to_string(),
            rev: rev.clone(),
            deleted: true,
            revisions: Some(extend_history(Some(&parent), &rev)),
            body: Map::new(),
        });
        Ok(rev)
    }

    /// Ids of live documents, sorted
    pub fn ids(&self) -> Vec<String> {
        match self.lock() {
            Ok(inner) => inner
                .docs
                .values()
                .filter(|entry| !entry.doc.deleted)
                .map(|entry| entry.doc.id.clone())
                .collect(),
            Err(_) => Vec::new(),
        }
    }
}

#[async_trait]
impl ReplicaStore for MemoryReplica {
    fn name(&self) -> &str {
        &self.name
    }

    async fn changes(&self, since: &str, limit: usize) -> Result<ChangesBatch, AppError> {
        let since: u64 = since.parse().unwrap_or(0);
        let inner = self.lock()?;

        let mut pending: Vec<&Entry> = inner.docs.values().filter(|entry| entry.seq > since).collect();
        pending.sort_by_key(|entry| entry.seq);
        pending.truncate(limit.max(1));

        let last_seq = pending.last().map(|entry| entry.seq).unwrap_or(since);
        Ok(ChangesBatch {
            docs: pending.into_iter().map(|entry| entry.doc.clone()).collect(),
            last_seq: last_seq.to_string(),
        })
    }

    async fn bulk_write(&self, docs: Vec<ReplicaDoc>) -> Result<(), AppError> {
        let mut inner = self.lock()?;

        for mut doc in docs {
            let wins = match inner.docs.get(&doc.id) {
                Some(current) => supersedes(&doc, &current.doc),
                None => true,
            };
            if wins {
                doc.revisions = Some(doc.history());
                inner.store(doc);
            }
        }

        Ok(())
    }
}
