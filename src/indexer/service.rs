//! Symbol indexing: pulls a tar archive of a mirrored commit from the
//! git worker, runs each regular file through a pool of ctags
//! subprocesses, and hands the resulting symbol occurrences (enriched
//! with surrounding source lines via [`super::liner::Liner`]) to a
//! caller-supplied store.

use std::collections::HashMap;
use std::io::Read;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::sync::Semaphore;
use tokio_util::io::SyncIoBridge;

use crate::git::worker::GitWorker;
use crate::indexer::commander::{Commander, ResponseEntry};
use crate::indexer::error::IndexerError;
use crate::indexer::liner::Liner;
use crate::models::{RepoUrl, SymbolEntry};

const BINARY_SNIFF_WINDOW: usize = 1024;

/// Persistence seam for indexed symbols, kept abstract so the indexer
/// doesn't need to know whether the backing store is Postgres, SQLite,
/// or something else entirely.
#[async_trait]
pub trait SymbolStore: Send + Sync {
    /// Whether a task for `(url, hash)` has already completed
    /// successfully, per spec §4.2's task table.
    async fn repository_indexed(&self, url: &str, hash: &str) -> Result<bool, IndexerError>;
    async fn file_indexed(&self, url: &str, hash: &str, file: &str) -> Result<bool, IndexerError>;
    /// Marks `file` scanned regardless of whether it produced any symbols,
    /// so a zero-symbol file isn't re-scanned on a later indexing pass.
    async fn mark_indexed(&self, url: &str, hash: &str, file: &str) -> Result<(), IndexerError>;
    async fn add_entries(&self, entries: Vec<SymbolEntry>) -> Result<(), IndexerError>;
    async fn set_task_state(&self, url: &str, hash: &str, success: bool) -> Result<(), IndexerError>;
    /// Upserts by (url, hash). Returns `Err(TaskExists)` when a non-expired
    /// row for this key is already present, per spec §4.2's admission rule.
    async fn new_index_task(&self, url: &str, hash: &str) -> Result<(), IndexerError>;
}

pub struct Indexer<S: SymbolStore> {
    git: Arc<GitWorker>,
    store: Arc<S>,
    pool: Mutex<Vec<Commander>>,
    pool_sem: Arc<Semaphore>,
    max_file_size: usize,
    timeout: Duration,
    /// `hash -> url` admission map: bounds concurrently in-flight tasks to
    /// the pool size and lets a duplicate submission for the same commit
    /// resolve to a no-op instead of a second pass over the same archive.
    in_flight: Mutex<HashMap<String, String>>,
    concurrency: usize,
}

impl<S: SymbolStore + 'static> Indexer<S> {
    pub async fn new(
        ctags_path: &str,
        pool_size: usize,
        max_file_size: usize,
        timeout: Duration,
        git: Arc<GitWorker>,
        store: Arc<S>,
    ) -> Result<Self, IndexerError> {
        let mut commanders = Vec::with_capacity(pool_size);
        for _ in 0..pool_size {
            commanders.push(Commander::spawn(ctags_path).await?);
        }
        Ok(Self {
            git,
            store,
            pool: Mutex::new(commanders),
            pool_sem: Arc::new(Semaphore::new(pool_size)),
            max_file_size,
            timeout,
            in_flight: Mutex::new(HashMap::new()),
            concurrency: pool_size,
        })
    }

    /// Mirrors the original `IndexRepository` RPC: a quick, awaited check
    /// of whether `(url, hash)` is already indexed, returned synchronously
    /// so the caller (`ProjectSvc`) can flip its own `indexed` flag right
    /// away. If it isn't indexed yet, a background pass is admitted (or
    /// silently declined if busy/duplicate) and this still returns `false`
    /// without waiting on that pass to finish.
    pub async fn request_indexing(self: &Arc<Self>, url: RepoUrl, hash: String) -> bool {
        match self.store.repository_indexed(url.as_str(), &hash).await {
            Ok(true) => return true,
            Ok(false) => {}
            Err(err) => {
                tracing::warn!(url = url.as_str(), hash = %hash, "failed to check index status: {err}");
            }
        }
        self.submit(url, hash);
        false
    }

    /// Queues a repository for indexing and returns immediately; the
    /// work runs on a background task and reports its outcome through
    /// [`SymbolStore::set_task_state`] once done. Mirrors the
    /// fire-and-forget admission used for newly registered projects.
    ///
    /// Admission per spec §4.2: a full in-flight map returns `Busy`
    /// (silently, since callers don't await this); a duplicate `hash`
    /// already in flight is a no-op; otherwise a new task row is opened
    /// via [`SymbolStore::new_index_task`], which itself rejects a
    /// non-expired duplicate with `TaskExists`.
    fn submit(self: &Arc<Self>, url: RepoUrl, hash: String) {
        let indexer = Arc::clone(self);
        tokio::spawn(async move {
            {
                let mut in_flight = indexer.in_flight.lock().await;
                if in_flight.contains_key(&hash) {
                    return;
                }
                if in_flight.len() >= indexer.concurrency {
                    tracing::warn!(url = url.as_str(), hash = %hash, "index task rejected: pool busy");
                    return;
                }
                in_flight.insert(hash.clone(), url.as_str().to_string());
            }

            if let Err(err) = indexer.store.new_index_task(url.as_str(), &hash).await {
                if err != IndexerError::TaskExists {
                    tracing::warn!(url = url.as_str(), hash = %hash, "failed to open index task: {err}");
                }
                indexer.in_flight.lock().await.remove(&hash);
                return;
            }

            let result = tokio::time::timeout(indexer.timeout, indexer.index_repository(&url, &hash)).await;
            let success = matches!(result, Ok(Ok(())));
            if let Err(err) = &result {
                tracing::warn!(url = url.as_str(), hash = %hash, "index task timed out: {err}");
            } else if let Ok(Err(err)) = &result {
                tracing::warn!(url = url.as_str(), hash = %hash, "index task failed: {err}");
            }
            if let Err(err) = indexer.store.set_task_state(url.as_str(), &hash, success).await {
                tracing::warn!(url = url.as_str(), hash = %hash, "failed to persist task state: {err}");
            }
            indexer.in_flight.lock().await.remove(&hash);
        });
    }

    async fn acquire(&self) -> (tokio::sync::OwnedSemaphorePermit, Commander) {
        let permit = self.pool_sem.clone().acquire_owned().await.expect("pool semaphore never closed");
        let commander = self.pool.lock().await.pop().expect("commander available under held permit");
        (permit, commander)
    }

    async fn release(&self, commander: Commander) {
        self.pool.lock().await.push(commander);
    }

    /// Reads the archive as a stream, one tar entry at a time, rather than
    /// buffering the whole tarball: `tar::Archive` only offers a sync
    /// `Read`, so the blocking read-and-parse loop runs on its own thread
    /// via [`tokio::task::spawn_blocking`] and hands each regular file's
    /// bytes across a channel to this async loop for ctags/storage work.
    async fn index_repository(&self, url: &RepoUrl, hash: &str) -> Result<(), IndexerError> {
        let archive = self.git.archive(url, hash).await.map_err(|e| IndexerError::Internal(e.to_string()))?;
        let reader = SyncIoBridge::new(archive);
        let max_file_size = self.max_file_size;

        let (tx, mut rx) = tokio::sync::mpsc::channel::<Result<TarFile, String>>(4);
        let reader_task = tokio::task::spawn_blocking(move || read_tar_entries(reader, max_file_size, &tx));

        while let Some(file) = rx.recv().await {
            let TarFile { path, content } = file.map_err(IndexerError::Internal)?;

            let sniff_len = content.len().min(BINARY_SNIFF_WINDOW);
            if content[..sniff_len].contains(&0u8) {
                continue;
            }

            if self.store.file_indexed(url.as_str(), hash, &path).await? {
                continue;
            }

            let (permit, mut commander) = self.acquire().await;
            let tags = commander.index_file(&path, &content).await;
            self.release(commander).await;
            drop(permit);

            let tags = match tags {
                Ok(tags) => tags,
                Err(err) => {
                    tracing::warn!(file = %path, "ctags failed on file: {err}");
                    continue;
                }
            };

            let symbol_entries = build_symbol_entries(url.as_str(), hash, &content, tags);
            if !symbol_entries.is_empty() {
                self.store.add_entries(symbol_entries).await?;
            }
            self.store.mark_indexed(url.as_str(), hash, &path).await?;
        }

        reader_task.await.map_err(|e| IndexerError::Internal(format!("tar reader task panicked: {e}")))?;
        Ok(())
    }
}

struct TarFile {
    path: String,
    content: Vec<u8>,
}

/// Runs on a blocking thread: walks the tar stream entry by entry, skipping
/// directories and oversized files, and sends each surviving regular file's
/// path and content over `tx`. Only one file's bytes are ever held in memory
/// at a time, never the whole archive.
fn read_tar_entries<R: Read>(reader: R, max_file_size: usize, tx: &tokio::sync::mpsc::Sender<Result<TarFile, String>>) {
    let mut tar = tar::Archive::new(reader);
    let entries = match tar.entries() {
        Ok(entries) => entries,
        Err(e) => {
            let _ = tx.blocking_send(Err(format!("bad tar stream: {e}")));
            return;
        }
    };

    for entry in entries {
        let mut entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let _ = tx.blocking_send(Err(format!("tar entry error: {e}")));
                return;
            }
        };
        if entry.header().entry_type() != tar::EntryType::Regular {
            continue;
        }
        let size = entry.header().size().unwrap_or(0) as usize;
        if size > max_file_size {
            continue;
        }

        let path = match entry.path() {
            Ok(path) => path.to_string_lossy().into_owned(),
            Err(e) => {
                let _ = tx.blocking_send(Err(e.to_string()));
                return;
            }
        };

        let mut content = Vec::with_capacity(size);
        if let Err(e) = entry.read_to_end(&mut content) {
            let _ = tx.blocking_send(Err(e.to_string()));
            return;
        }

        if tx.blocking_send(Ok(TarFile { path, content })).is_err() {
            return;
        }
    }
}

#[async_trait]
impl<S: SymbolStore + 'static> crate::project::IndexRequester for Arc<Indexer<S>> {
    async fn request_indexing(&self, url: RepoUrl, hash: String) -> bool {
        Indexer::request_indexing(self, url, hash).await
    }
}

fn build_symbol_entries(url: &str, hash: &str, content: &[u8], tags: Vec<ResponseEntry>) -> Vec<SymbolEntry> {
    let mut liner = Liner::new(content);
    let mut out = Vec::with_capacity(tags.len());

    for tag in tags {
        let line = liner.get_line(tag.line).unwrap_or_default();

        let mut line_before = String::new();
        let after_exists = liner.get_line(tag.line + 1).is_ok();
        if !after_exists {
            line_before = liner.get_line(tag.line - 2).unwrap_or_default();
        }

        let lb = liner.get_line(tag.line - 1).unwrap_or_default();
        if !line_before.is_empty() {
            line_before.push('\n');
            line_before.push_str(&lb);
        } else {
            line_before = lb;
        }

        let line_after = liner.get_line(tag.line + 1).unwrap_or_default();

        out.push(SymbolEntry {
            url: url.to_string(),
            hash: hash.to_string(),
            file: tag.path,
            name: tag.name,
            pattern: tag.pattern,
            language: tag.language,
            line_number: tag.line as i32,
            line,
            line_before,
            line_after,
            kind: tag.kind,
            scope: tag.scope,
            scope_kind: tag.scope_kind,
        });
    }

    out
}
