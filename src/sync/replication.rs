use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::replica::ReplicaStore;
use crate::utils::AppError;

/// Replication state: `Idle → Replicating → {Paused, Error}`.
/// `Paused` means caught up and waiting for changes, not stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncStatus {
    Idle,
    Replicating,
    Paused,
    Error(String),
    Cancelled,
}

impl SyncStatus {
    /// Status line shown to the user
    pub fn label(&self) -> String {
        match self {
            SyncStatus::Idle => "Idle".to_string(),
            SyncStatus::Replicating => "Syncing...".to_string(),
            SyncStatus::Paused => "Synced".to_string(),
            SyncStatus::Error(e) => format!("Sync error: {}", e),
            SyncStatus::Cancelled => "Sync stopped".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReplicationOptions {
    /// Keep following changes after catching up
    pub live: bool,
    /// Retry failed rounds with exponential backoff
    pub retry: bool,
    pub batch_size: usize,
    pub poll_interval: Duration,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for ReplicationOptions {
    fn default() -> Self {
        Self {
            live: true,
            retry: true,
            batch_size: 100,
            poll_interval: Duration::from_secs(2),
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
        }
    }
}

/// Resume points of both directions
#[derive(Debug, Default)]
struct Checkpoints {
    push: String,
    pull: String,
}

/// Bidirectional replication between a local and a remote database,
/// running in a background task until cancelled.
pub struct Replication {
    name: String,
    status: watch::Receiver<SyncStatus>,
    cancel: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl Replication {
    pub fn start(
        name: impl Into<String>,
        local: Arc<dyn ReplicaStore>,
        remote: Arc<dyn ReplicaStore>,
        options: ReplicationOptions,
    ) -> Self {
        let name = name.into();
        let (status_tx, status_rx) = watch::channel(SyncStatus::Idle);
        let (cancel_tx, cancel_rx) = watch::channel(false);

        log::info!(
            "🔄 Starting replication {} ({} <-> {}, live: {})",
            name,
            local.name(),
            remote.name(),
            options.live
        );

        let task = tokio::spawn(run(name.clone(), local, remote, options, status_tx, cancel_rx));

        Self {
            name,
            status: status_rx,
            cancel: cancel_tx,
            task,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> SyncStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncStatus> {
        self.status.clone()
    }

    /// Stop replicating. Safe to call repeatedly.
    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for Replication {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn set_status(status: &watch::Sender<SyncStatus>, next: SyncStatus) {
    status.send_if_modified(|current| {
        if *current == next {
            false
        } else {
            *current = next;
            true
        }
    });
}

/// Resolves once cancellation is requested or the handle is gone
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    let _ = cancel.wait_for(|cancelled| *cancelled).await;
}

/// Copy every change of `source` after `since` into `target`
async fn replicate_once(
    source: &dyn ReplicaStore,
    target: &dyn ReplicaStore,
    since: &mut String,
    batch_size: usize,
    status: &watch::Sender<SyncStatus>,
) -> Result<usize, AppError> {
    let mut moved = 0;

    loop {
        let batch = source.changes(since, batch_size).await?;
        let count = batch.docs.len();

        if count > 0 {
            set_status(status, SyncStatus::Replicating);
            target.bulk_write(batch.docs).await?;
            moved += count;
        }
        *since = batch.last_seq;

        if count < batch_size {
            return Ok(moved);
        }
    }
}

async fn round(
    local: &dyn ReplicaStore,
    remote: &dyn ReplicaStore,
    checkpoints: &mut Checkpoints,
    batch_size: usize,
    status: &watch::Sender<SyncStatus>,
) -> Result<(usize, usize), AppError> {
    let pushed = replicate_once(local, remote, &mut checkpoints.push, batch_size, status).await?;
    let pulled = replicate_once(remote, local, &mut checkpoints.pull, batch_size, status).await?;
    Ok((pushed, pulled))
}

async fn run(
    name: String,
    local: Arc<dyn ReplicaStore>,
    remote: Arc<dyn ReplicaStore>,
    options: ReplicationOptions,
    status: watch::Sender<SyncStatus>,
    mut cancel: watch::Receiver<bool>,
) {
    let batch_size = options.batch_size.max(1);
    let mut checkpoints = Checkpoints::default();
    let mut backoff = options.initial_backoff;

    loop {
        let result = tokio::select! {
            result = round(local.as_ref(), remote.as_ref(), &mut checkpoints, batch_size, &status) => result,
            _ = cancelled(&mut cancel) => break,
        };

        let wait = match result {
            Ok((pushed, pulled)) => {
                if pushed + pulled > 0 {
                    log::debug!("🔄 {}: pushed {}, pulled {}", name, pushed, pulled);
                }
                backoff = options.initial_backoff;

                if !options.live {
                    log::info!("✅ Replication {} complete", name);
                    set_status(&status, SyncStatus::Idle);
                    return;
                }
                set_status(&status, SyncStatus::Paused);
                options.poll_interval
            }
            Err(e) => {
                log::error!("❌ Replication {} failed: {}", name, e);
                set_status(&status, SyncStatus::Error(e.to_string()));

                if !options.retry {
                    return;
                }
                let wait = backoff;
                backoff = (backoff * 2).min(options.max_backoff);
                log::warn!("⏳ Replication {} retrying in {:?}", name, wait);
                wait
            }
        };

        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = cancelled(&mut cancel) => break,
        }
    }

    log::info!("🛑 Replication {} cancelled", name);
    set_status(&status, SyncStatus::Cancelled);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::replica::{ChangesBatch, MemoryReplica, ReplicaDoc};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn fast() -> ReplicationOptions {
        ReplicationOptions {
            poll_interval: Duration::from_millis(10),
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(40),
            ..ReplicationOptions::default()
        }
    }

    async fn wait_for(replication: &Replication, wanted: impl Fn(&SyncStatus) -> bool) -> SyncStatus {
        let mut rx = replication.subscribe();
        let status = tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|status| wanted(status)))
            .await
            .expect("timed out waiting for status")
            .expect("status channel closed");
        status.clone()
    }

    async fn wait_finished(replication: &Replication) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while !replication.is_finished() {
            assert!(tokio::time::Instant::now() < deadline, "replication never finished");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Replica that fails every call while `down` is set
    struct Flaky {
        inner: MemoryReplica,
        down: AtomicBool,
    }

    #[async_trait]
    impl ReplicaStore for Flaky {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn changes(&self, since: &str, limit: usize) -> Result<ChangesBatch, AppError> {
            if self.down.load(Ordering::SeqCst) {
                return Err(AppError::BackendUnavailable("connection refused".to_string()));
            }
            self.inner.changes(since, limit).await
        }

        async fn bulk_write(&self, docs: Vec<ReplicaDoc>) -> Result<(), AppError> {
            if self.down.load(Ordering::SeqCst) {
                return Err(AppError::BackendUnavailable("connection refused".to_string()));
            }
            self.inner.bulk_write(docs).await
        }
    }

    #[tokio::test]
    async fn test_one_shot_converges() {
        let local = Arc::new(MemoryReplica::new("local"));
        let remote = Arc::new(MemoryReplica::new("remote"));
        local.put("profile:alice", json!({ "discipline": "NSI" })).unwrap();
        remote.put("profile:bob", json!({ "discipline": "SVT" })).unwrap();

        let options = ReplicationOptions {
            live: false,
            batch_size: 1,
            ..fast()
        };
        let replication = Replication::start("users", local.clone(), remote.clone(), options);
        wait_finished(&replication).await;

        assert_eq!(replication.status(), SyncStatus::Idle);
        assert_eq!(local.ids(), remote.ids());
        assert_eq!(local.ids().len(), 2);
    }

    #[tokio::test]
    async fn test_live_replication_resolves_conflicts_by_revision() {
        let local = Arc::new(MemoryReplica::new("local"));
        let remote = Arc::new(MemoryReplica::new("remote"));

        // Concurrent edits: local is one generation ahead
        local.put("doc", json!({ "v": "local-1" })).unwrap();
        local.put("doc", json!({ "v": "local-2" })).unwrap();
        remote.put("doc", json!({ "v": "remote-1" })).unwrap();

        let replication = Replication::start("users", local.clone(), remote.clone(), fast());
        wait_for(&replication, |status| *status == SyncStatus::Paused).await;

        assert_eq!(local.get("doc").unwrap().body["v"], "local-2");
        assert_eq!(remote.get("doc").unwrap(), local.get("doc").unwrap());

        // Later edits keep flowing while live
        remote.put("doc", json!({ "v": "remote-3" })).unwrap();
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while local.get("doc").unwrap().body["v"] != "remote-3" {
            assert!(tokio::time::Instant::now() < deadline, "change never replicated");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        replication.cancel();
        replication.cancel();
        wait_for(&replication, |status| *status == SyncStatus::Cancelled).await;
    }

    #[tokio::test]
    async fn test_deletion_reaches_both_sides() {
        let local = Arc::new(MemoryReplica::new("local"));
        let remote = Arc::new(MemoryReplica::new("remote"));
        remote.put("doc", json!({ "v": "shared" })).unwrap();

        let replication = Replication::start("users", local.clone(), remote.clone(), fast());
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while local.get("doc").is_none() {
            assert!(tokio::time::Instant::now() < deadline, "doc never pulled");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        local.delete("doc").unwrap();
        while remote.get("doc").is_some() {
            assert!(tokio::time::Instant::now() < deadline, "deletion never pushed");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        // A few more rounds: the tombstone stays the winner on both sides
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(local.get("doc").is_none());
        assert!(remote.get("doc").is_none());

        replication.cancel();
    }

    #[tokio::test]
    async fn test_error_then_recovery() {
        let local = Arc::new(MemoryReplica::new("local"));
        let remote = Arc::new(Flaky {
            inner: MemoryReplica::new("remote"),
            down: AtomicBool::new(true),
        });
        local.put("doc", json!({ "v": 1 })).unwrap();

        let replication = Replication::start("users", local.clone(), remote.clone(), fast());
        let status = wait_for(&replication, |status| matches!(status, SyncStatus::Error(_))).await;
        assert!(status.label().contains("connection refused"));

        remote.down.store(false, Ordering::SeqCst);
        wait_for(&replication, |status| *status == SyncStatus::Paused).await;
        assert!(remote.inner.get("doc").is_some());

        replication.cancel();
    }

    #[tokio::test]
    async fn test_without_retry_error_is_final() {
        let local = Arc::new(MemoryReplica::new("local"));
        let remote = Arc::new(Flaky {
            inner: MemoryReplica::new("remote"),
            down: AtomicBool::new(true),
        });

        let options = ReplicationOptions { retry: false, ..fast() };
        let replication = Replication::start("users", local, remote, options);
        wait_finished(&replication).await;

        assert!(matches!(replication.status(), SyncStatus::Error(_)));
    }
}
