//! Background fetch-and-persist work queued by [`super::cache::RepoCache`].
//!
//! Admission keys on `url@commit` only — a directory sync and a blob sync
//! against the same commit are treated as the same task for admission
//! purposes, so they can't run concurrently against that commit. This
//! mirrors the upstream git service, which is only ever asked to do one
//! read at a time per commit anyway.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Notify, RwLock, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::git::worker::GitWorker;
use crate::models::{Blob, DirectoryEntry, NamedCommit};
use crate::repo_cache::error::SyncError;

#[async_trait]
pub trait RepoCacheStore: Send + Sync {
    async fn set_named_commits(&self, url: &str, commits: Vec<NamedCommit>) -> Result<(), SyncError>;
    async fn set_directories(&self, url: &str, hash: &str, entries: Vec<DirectoryEntry>) -> Result<(), SyncError>;
    async fn set_blob(&self, url: &str, hash: &str, file: &str, blob: Blob) -> Result<(), SyncError>;
}

pub struct Syncer<S: RepoCacheStore> {
    store: Arc<S>,
    git: Arc<GitWorker>,
    sem: Arc<Semaphore>,
    tasks: RwLock<HashMap<String, CancellationToken>>,
    timeout: Duration,
    inflight: AtomicUsize,
    drained: Notify,
}

fn task_key(url: &str, commit: &str) -> String {
    format!("{url}@{commit}")
}

impl<S: RepoCacheStore + 'static> Syncer<S> {
    pub fn new(store: Arc<S>, git: Arc<GitWorker>, concurrency: usize, timeout: Duration) -> Self {
        Self {
            store,
            git,
            sem: Arc::new(Semaphore::new(concurrency)),
            tasks: RwLock::new(HashMap::new()),
            timeout,
            inflight: AtomicUsize::new(0),
            drained: Notify::new(),
        }
    }

    /// 1. check if already in sync, 2. acquire a concurrency slot,
    /// 3. check again under the task-table lock, 4. register the task.
    async fn prepare_sync(
        &self,
        url: &str,
        commit: &str,
    ) -> Result<(CancellationToken, tokio::sync::OwnedSemaphorePermit), SyncError> {
        let key = task_key(url, commit);

        if self.tasks.read().await.contains_key(&key) {
            return Err(SyncError::InSync);
        }

        let permit = self.sem.clone().try_acquire_owned().map_err(|_| SyncError::Busy)?;

        let mut tasks = self.tasks.write().await;
        if tasks.contains_key(&key) {
            return Err(SyncError::InSync);
        }
        let token = CancellationToken::new();
        tasks.insert(key, token.clone());
        drop(tasks);

        self.inflight.fetch_add(1, Ordering::SeqCst);
        Ok((token, permit))
    }

    async fn finish_sync(&self, url: &str, commit: &str, token: CancellationToken) {
        token.cancel();
        self.tasks.write().await.remove(&task_key(url, commit));
        if self.inflight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.drained.notify_waiters();
        }
    }

    pub async fn sync_repository(self: &Arc<Self>, url: String) -> Result<(), SyncError> {
        match self.git.status(&crate::models::RepoUrl::normalize(&url).ok_or(SyncError::NotFound)?).await {
            crate::models::CloneStatus::Cloning { .. } => return Err(SyncError::InSync),
            crate::models::CloneStatus::Cloned => {}
            crate::models::CloneStatus::Unknown => return Err(SyncError::NotFound),
        }

        let (token, permit) = self.prepare_sync(&url, "").await?;
        let syncer = Arc::clone(self);
        tokio::spawn(async move {
            let _permit = permit;
            let repo_url = crate::models::RepoUrl::normalize(&url).expect("validated above");
            tokio::select! {
                _ = token.cancelled() => {}
                result = tokio::time::timeout(syncer.timeout, syncer.git.refs(&repo_url)) => {
                    match result {
                        Ok(Ok(commits)) => {
                            if let Err(err) = syncer.store.set_named_commits(&url, commits).await {
                                tracing::warn!(url = %url, "failed to persist named commits: {err}");
                            }
                        }
                        Ok(Err(err)) => tracing::warn!(url = %url, "git refs failed: {err}"),
                        Err(_) => tracing::warn!(url = %url, "sync repository timed out"),
                    }
                }
            }
            syncer.finish_sync(&url, "", token).await;
        });
        Ok(())
    }

    pub async fn sync_directories(self: &Arc<Self>, url: String, hash: String) -> Result<(), SyncError> {
        let (token, permit) = self.prepare_sync(&url, &hash).await?;
        let syncer = Arc::clone(self);
        tokio::spawn(async move {
            let _permit = permit;
            let repo_url = crate::models::RepoUrl::normalize(&url).expect("already validated by caller");
            tokio::select! {
                _ = token.cancelled() => {}
                result = tokio::time::timeout(syncer.timeout, syncer.git.tree(&repo_url, &hash)) => {
                    match result {
                        Ok(Ok(entries)) => {
                            if let Err(err) = syncer.store.set_directories(&url, &hash, entries).await {
                                tracing::warn!(url = %url, hash = %hash, "failed to persist directories: {err}");
                            }
                        }
                        Ok(Err(err)) => tracing::warn!(url = %url, hash = %hash, "git tree failed: {err}"),
                        Err(_) => tracing::warn!(url = %url, hash = %hash, "sync directories timed out"),
                    }
                }
            }
            syncer.finish_sync(&url, &hash, token).await;
        });
        Ok(())
    }

    pub async fn sync_blob(self: &Arc<Self>, url: String, hash: String, file: String) -> Result<(), SyncError> {
        let (token, permit) = self.prepare_sync(&url, &hash).await?;
        let syncer = Arc::clone(self);
        tokio::spawn(async move {
            let _permit = permit;
            let repo_url = crate::models::RepoUrl::normalize(&url).expect("already validated by caller");
            let trimmed = file.trim_start_matches('/').to_string();
            tokio::select! {
                _ = token.cancelled() => {}
                result = tokio::time::timeout(syncer.timeout, syncer.git.blob(&repo_url, &hash, &trimmed)) => {
                    match result {
                        Ok(Ok(blob)) => {
                            if let Err(err) = syncer.store.set_blob(&url, &hash, &file, blob).await {
                                tracing::warn!(url = %url, hash = %hash, file = %file, "failed to persist blob: {err}");
                            }
                        }
                        Ok(Err(err)) => tracing::warn!(url = %url, hash = %hash, file = %file, "git blob failed: {err}"),
                        Err(_) => tracing::warn!(url = %url, hash = %hash, file = %file, "sync blob timed out"),
                    }
                }
            }
            syncer.finish_sync(&url, &hash, token).await;
        });
        Ok(())
    }

    /// Cancels every in-flight sync, then waits for them to unwind.
    pub async fn shutdown(&self) {
        for token in self.tasks.read().await.values() {
            token.cancel();
        }
        while self.inflight.load(Ordering::SeqCst) > 0 {
            self.drained.notified().await;
        }
    }
}
