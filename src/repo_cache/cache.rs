//! Read-through cache in front of [`GitWorker`]: a read either finds
//! fully materialized state already persisted, or triggers a background
//! sync and tells the caller to come back later (`InSync`).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::git::worker::GitWorker;
use crate::models::{Blob, DirectoryEntry, NamedCommit, RepoUrl};
use crate::repo_cache::error::SyncError;
use crate::repo_cache::syncer::{RepoCacheStore, Syncer};

/// Either the cached value is ready, or a sync was just kicked off (or
/// was already running) and the caller should poll again shortly.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheOutcome<T> {
    Ready(T),
    InSync,
}

#[async_trait]
pub trait RepoCacheRead: Send + Sync {
    async fn get_named_commits(&self, url: &str) -> Result<Option<Vec<NamedCommit>>, SyncError>;
    /// `parent` is a directory path normalized via
    /// [`crate::models::normalize_query_path`]; `None` means "tree not yet
    /// synced", `Some(vec![])` means "synced, this directory has no
    /// entries" (per spec §4.3's sentinel-presence distinction).
    async fn get_directories(&self, url: &str, hash: &str, parent: &str) -> Result<Option<Vec<DirectoryEntry>>, SyncError>;
    async fn get_blob(&self, url: &str, hash: &str, file: &str) -> Result<Option<Blob>, SyncError>;
}

pub struct RepoCache<S: RepoCacheStore + RepoCacheRead> {
    store: Arc<S>,
    syncer: Arc<Syncer<S>>,
    git: Arc<GitWorker>,
}

impl<S: RepoCacheStore + RepoCacheRead + 'static> RepoCache<S> {
    pub fn new(store: Arc<S>, git: Arc<GitWorker>, sync_concurrency: usize, sync_timeout: Duration) -> Self {
        let syncer = Arc::new(Syncer::new(store.clone(), git.clone(), sync_concurrency, sync_timeout));
        Self { store, syncer, git }
    }

    pub fn syncer(&self) -> &Arc<Syncer<S>> {
        &self.syncer
    }

    pub fn git(&self) -> &Arc<GitWorker> {
        &self.git
    }

    pub async fn named_commits(&self, url: &RepoUrl) -> Result<CacheOutcome<Vec<NamedCommit>>, SyncError> {
        if let Some(commits) = self.store.get_named_commits(url.as_str()).await? {
            return Ok(CacheOutcome::Ready(commits));
        }
        match self.syncer.sync_repository(url.as_str().to_string()).await {
            Ok(()) | Err(SyncError::InSync) => Ok(CacheOutcome::InSync),
            Err(err) => Err(err),
        }
    }

    pub async fn directories(
        &self,
        url: &RepoUrl,
        hash: &str,
        path: &str,
    ) -> Result<CacheOutcome<Vec<DirectoryEntry>>, SyncError> {
        let parent = crate::models::normalize_query_path(path);
        if let Some(entries) = self.store.get_directories(url.as_str(), hash, &parent).await? {
            return Ok(CacheOutcome::Ready(entries));
        }
        match self.syncer.sync_directories(url.as_str().to_string(), hash.to_string()).await {
            Ok(()) | Err(SyncError::InSync) => Ok(CacheOutcome::InSync),
            Err(err) => Err(err),
        }
    }

    /// Unlike [`Self::named_commits`] and [`Self::directories`], a missing
    /// row here is terminal rather than a sync trigger: a blob placeholder
    /// is only ever created as a side effect of its directory listing
    /// being synced first, so an absent row means the path was never part
    /// of a known tree and retrying won't materialize it.
    pub async fn blob(&self, url: &RepoUrl, hash: &str, file: &str) -> Result<CacheOutcome<Blob>, SyncError> {
        let blob = self.store.get_blob(url.as_str(), hash, file).await?.ok_or(SyncError::NotFound)?;
        if blob.synced {
            return Ok(CacheOutcome::Ready(blob));
        }
        match self.syncer.sync_blob(url.as_str().to_string(), hash.to_string(), file.to_string()).await {
            Ok(()) | Err(SyncError::InSync) => Ok(CacheOutcome::InSync),
            Err(err) => Err(err),
        }
    }
}
