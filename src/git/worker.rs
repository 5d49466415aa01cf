//! Subprocess-driven mirror of a GitHub repository.
//!
//! Every operation shells out to the real `git` binary rather than using
//! a Rust git implementation: cloning, reading refs, walking trees and
//! reading blobs are all just parsed `git` subcommand output. This keeps
//! the worker's behavior identical to what a developer would see running
//! the same commands by hand, including which objects count as binary.

use std::collections::HashMap;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};
use tokio::process::{Child, Command};
use tokio::sync::{Mutex, OwnedSemaphorePermit, RwLock, Semaphore};
use tokio::time::timeout;

use crate::git::error::GitError;
use crate::git::process::{ContentWriter, LineWriter, ProgressWriter};
use crate::models::{Blob, CloneStatus, DirectoryEntry, NamedCommit, RepoUrl};

/// One mirrored repository's on-disk home is `data_dir/<owner>/<repo>`,
/// stored bare (no working tree) since nothing here ever needs a checkout.
pub struct GitWorker {
    data_dir: PathBuf,
    clone_sem: Arc<Semaphore>,
    archive_sem: Arc<Semaphore>,
    other_sem: Arc<Semaphore>,
    in_flight: RwLock<HashMap<String, Arc<Mutex<String>>>>,
    other_timeout: Duration,
    clone_timeout: Duration,
    archive_timeout: Duration,
}

impl GitWorker {
    #[allow(clippy::too_many_arguments)]
    pub async fn new(
        data_dir: PathBuf,
        clone_concurrency: usize,
        archive_concurrency: usize,
        other_concurrency: usize,
        clone_timeout: Duration,
        other_timeout: Duration,
        archive_timeout: Duration,
    ) -> Result<Self, GitError> {
        let version = Command::new("git")
            .arg("--version")
            .output()
            .await
            .map_err(|e| GitError::Internal(format!("git binary unavailable: {e}")))?;
        if !version.status.success() {
            return Err(GitError::Internal("git --version exited non-zero".into()));
        }

        // A pager spawned on a captured stdout pipe would hang forever
        // waiting for a terminal that doesn't exist.
        let pager = Command::new("git")
            .args(["config", "--global", "core.pager", ""])
            .output()
            .await
            .map_err(|e| GitError::Internal(format!("git config failed: {e}")))?;
        if !pager.status.success() {
            return Err(GitError::Internal("git config core.pager failed".into()));
        }

        tokio::fs::create_dir_all(&data_dir)
            .await
            .map_err(|e| GitError::Internal(e.to_string()))?;

        Ok(Self {
            data_dir,
            clone_sem: Arc::new(Semaphore::new(clone_concurrency)),
            archive_sem: Arc::new(Semaphore::new(archive_concurrency)),
            other_sem: Arc::new(Semaphore::new(other_concurrency)),
            in_flight: RwLock::new(HashMap::new()),
            other_timeout,
            clone_timeout,
            archive_timeout,
        })
    }

    /// Filesystem-rooted location of a mirror, `data_dir/<owner>/<repo>`.
    /// `url` must have a depth-2 path; callers check this before use.
    fn repo_path(&self, url: &RepoUrl) -> PathBuf {
        let mut path = self.data_dir.clone();
        for segment in url.path_segments() {
            path.push(segment);
        }
        path
    }

    fn is_cloned(&self, url: &RepoUrl) -> bool {
        self.repo_path(url).join("HEAD").exists()
    }

    /// Spec §4.1/§6: a url whose path isn't exactly `org/repo` (depth 2)
    /// is rejected outright, never turned into a filesystem path.
    fn check_depth(url: &RepoUrl) -> Result<(), GitError> {
        if url.path_segments().len() == 2 {
            Ok(())
        } else {
            Err(GitError::InvalidUrl)
        }
    }

    /// Checks the filesystem before the in-flight map, per spec §4.1: a
    /// clone that just renamed its tmp dir into place but hasn't yet had
    /// its in-flight entry removed must read as `Cloned`, not `Cloning`.
    pub async fn status(&self, url: &RepoUrl) -> CloneStatus {
        if self.is_cloned(url) {
            return CloneStatus::Cloned;
        }
        if let Some(progress) = self.in_flight.read().await.get(url.as_str()) {
            return CloneStatus::Cloning { progress: progress.lock().await.clone() };
        }
        CloneStatus::Unknown
    }

    /// Starts a bare clone in the background and returns immediately;
    /// callers poll [`Self::status`] for progress. Admission is checked
    /// twice, once before acquiring a clone slot and once after, so two
    /// concurrent callers for the same url can't both start a clone.
    pub async fn clone(self: &Arc<Self>, url: RepoUrl) -> Result<(), GitError> {
        Self::check_depth(&url)?;
        if self.is_cloned(&url) {
            return Err(GitError::Cloned);
        }
        if self.in_flight.read().await.contains_key(url.as_str()) {
            return Err(GitError::Cloning);
        }

        let permit = self.clone_sem.clone().try_acquire_owned().map_err(|_| GitError::Busy)?;

        let progress = Arc::new(Mutex::new(String::new()));
        {
            let mut in_flight = self.in_flight.write().await;
            if in_flight.contains_key(url.as_str()) {
                return Err(GitError::Cloning);
            }
            in_flight.insert(url.as_str().to_string(), progress.clone());
        }

        let worker = Arc::clone(self);
        tokio::spawn(async move {
            let _permit = permit;
            let _ = worker.run_clone(&url, progress).await;
            worker.in_flight.write().await.remove(url.as_str());
        });

        Ok(())
    }

    /// Clones into a `_tmp`-suffixed staging directory and atomically
    /// renames it onto the final path only on success, per the Mirror
    /// lifecycle invariant in spec §3: a directory at the final path
    /// implies a fully-cloned mirror, never a partial one.
    async fn run_clone(&self, url: &RepoUrl, progress: Arc<Mutex<String>>) -> Result<(), GitError> {
        let dest = self.repo_path(url);
        let tmp_dest = tmp_path(&dest);
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| GitError::Internal(e.to_string()))?;
        }
        let _ = tokio::fs::remove_dir_all(&tmp_dest).await;

        let mut child = Command::new("git")
            .args(["clone", "--mirror", "--progress", url.as_str()])
            .arg(&tmp_dest)
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::piped())
            .spawn()
            .map_err(|e| GitError::Internal(e.to_string()))?;

        let mut stderr = child.stderr.take().expect("piped stderr");
        let mut writer = ProgressWriter::new(progress);
        let mut buf = [0u8; 4096];

        let pump = async {
            loop {
                let n = stderr.read(&mut buf).await.map_err(|e| GitError::Internal(e.to_string()))?;
                if n == 0 {
                    break;
                }
                writer.feed(&buf[..n]);
            }
            child.wait().await.map_err(|e| GitError::Internal(e.to_string()))
        };

        let status = match timeout(self.clone_timeout, pump).await {
            Ok(result) => result,
            Err(_) => {
                let _ = child.start_kill();
                let _ = tokio::fs::remove_dir_all(&tmp_dest).await;
                return Err(GitError::Internal("git clone timed out".into()));
            }
        }?;

        if !status.success() {
            let _ = tokio::fs::remove_dir_all(&tmp_dest).await;
            return Err(GitError::Internal(format!("git clone exited with {status}")));
        }

        tokio::fs::rename(&tmp_dest, &dest).await.map_err(|e| GitError::Internal(e.to_string()))?;
        Ok(())
    }

    pub async fn refs(&self, url: &RepoUrl) -> Result<Vec<NamedCommit>, GitError> {
        Self::check_depth(url)?;
        if !self.is_cloned(url) {
            return Err(GitError::NotExist);
        }
        let _permit = self.acquire_other().await?;

        let repo_path = self.repo_path(url);
        let output = timeout(
            self.other_timeout,
            Command::new("git")
                .current_dir(&repo_path)
                .args(["show-ref", "--heads", "--tags", "--dereference"])
                .output(),
        )
        .await
        .map_err(|_| GitError::Internal("git show-ref timed out".into()))?
        .map_err(|e| GitError::Internal(e.to_string()))?;

        let mut line_writer = LineWriter::default();
        line_writer.feed(&output.stdout);

        let mut refs = Vec::new();
        for line in line_writer.take_lines() {
            let Some((hash, reference)) = line.split_once(' ') else { continue };
            let reference = reference.trim_end_matches("^{}");
            if let Some(name) = reference.strip_prefix("refs/heads/") {
                refs.push(NamedCommit { name: name.to_string(), hash: hash.to_string(), branch: true });
            } else if let Some(name) = reference.strip_prefix("refs/tags/") {
                refs.push(NamedCommit { name: name.to_string(), hash: hash.to_string(), branch: false });
            }
        }
        Ok(refs)
    }

    /// Lists every entry in the commit's tree, recursively, in one call —
    /// callers that need a single directory's immediate children filter
    /// the result by `parent_dir_of`. This lets a tree sync materialize
    /// the whole repository in one pass instead of one `git` call per
    /// directory (see [`crate::repo_cache::Syncer::sync_directories`]).
    pub async fn tree(&self, url: &RepoUrl, hash: &str) -> Result<Vec<DirectoryEntry>, GitError> {
        Self::check_depth(url)?;
        if !self.is_cloned(url) {
            return Err(GitError::NotExist);
        }
        let _permit = self.acquire_other().await?;

        let repo_path = self.repo_path(url);

        let output = timeout(
            self.other_timeout,
            Command::new("git").current_dir(&repo_path).args(["ls-tree", "-r", "-t", hash]).output(),
        )
        .await
        .map_err(|_| GitError::Internal("git ls-tree timed out".into()))?
        .map_err(|e| GitError::Internal(e.to_string()))?;

        if !output.status.success() {
            return Err(GitError::NotFound);
        }

        let mut line_writer = LineWriter::default();
        line_writer.feed(&output.stdout);

        let mut entries = Vec::new();
        for line in line_writer.take_lines() {
            // "<mode> <type> <hash>\t<path>"
            let Some((meta, path)) = line.split_once('\t') else { continue };
            let Some(object_type) = meta.split_whitespace().nth(1) else { continue };
            entries.push(DirectoryEntry { file: path.to_string(), dir: object_type == "tree" });
        }
        Ok(entries)
    }

    pub async fn blob(&self, url: &RepoUrl, hash: &str, file: &str) -> Result<Blob, GitError> {
        Self::check_depth(url)?;
        if !self.is_cloned(url) {
            return Err(GitError::NotExist);
        }
        let _permit = self.acquire_other().await?;

        let repo_path = self.repo_path(url);
        let file = file.trim_start_matches('/');
        let treeish = format!("{hash}:{file}");
        let dir_banner = format!("tree {hash}:{file}");

        let mut child = Command::new("git")
            .current_dir(&repo_path)
            .args(["show", &treeish])
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::null())
            .spawn()
            .map_err(|e| GitError::Internal(e.to_string()))?;

        let mut stdout = child.stdout.take().expect("piped stdout");
        let mut writer = ContentWriter::new();
        let mut buf = [0u8; 8192];
        let result = loop {
            match timeout(self.other_timeout, stdout.read(&mut buf)).await {
                Err(_) => break Err(GitError::Internal("git show timed out".into())),
                Ok(Err(e)) => break Err(GitError::Internal(e.to_string())),
                Ok(Ok(0)) => break Ok(()),
                Ok(Ok(n)) => {
                    if writer.feed(&buf[..n]) {
                        let _ = child.kill().await;
                        break Ok(());
                    }
                }
            }
        };
        let status = child.wait().await.map_err(|e| GitError::Internal(e.to_string()))?;

        result?;
        if writer.is_binary() {
            return Ok(Blob::binary());
        }
        if !status.success() {
            return Err(GitError::NotFound);
        }
        let content = writer.into_string();
        if content.starts_with(&dir_banner) {
            return Err(GitError::NotFound);
        }
        Ok(Blob::plain(content))
    }

    /// Starts `git archive` and returns a live stdout stream the caller
    /// (the indexer) consumes as a tar byte stream. Holding the semaphore
    /// permit inside the returned stream ties its lifetime to the stream,
    /// so the archive concurrency slot is freed only once fully drained
    /// or dropped. A background watchdog kills the subprocess if it
    /// outlives `archive_timeout`, since a stalled `git archive` would
    /// otherwise hang a streaming HTTP response indefinitely.
    pub async fn archive(&self, url: &RepoUrl, hash: &str) -> Result<ArchiveStream, GitError> {
        Self::check_depth(url)?;
        if !self.is_cloned(url) {
            return Err(GitError::NotExist);
        }
        let permit = self.archive_sem.clone().try_acquire_owned().map_err(|_| GitError::Busy)?;

        let repo_path = self.repo_path(url);
        let mut child = Command::new("git")
            .current_dir(&repo_path)
            .args(["archive", "--worktree-attributes", "--format=tar", hash, "--"])
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::null())
            .spawn()
            .map_err(|e| GitError::Internal(e.to_string()))?;

        let stdout = child.stdout.take().expect("piped stdout");
        let child = Arc::new(std::sync::Mutex::new(child));
        let watchdog = tokio::spawn({
            let child = Arc::clone(&child);
            let archive_timeout = self.archive_timeout;
            async move {
                tokio::time::sleep(archive_timeout).await;
                if let Ok(mut child) = child.lock() {
                    let _ = child.start_kill();
                }
            }
        });
        Ok(ArchiveStream { child, stdout, _permit: permit, watchdog })
    }

    async fn acquire_other(&self) -> Result<OwnedSemaphorePermit, GitError> {
        self.other_sem.clone().try_acquire_owned().map_err(|_| GitError::Busy)
    }
}

/// Tar byte stream backing [`GitWorker::archive`]. Dropping it kills the
/// underlying `git archive` process so an abandoned indexing pass doesn't
/// leave a subprocess running.
pub struct ArchiveStream {
    child: Arc<std::sync::Mutex<Child>>,
    stdout: tokio::process::ChildStdout,
    _permit: OwnedSemaphorePermit,
    watchdog: tokio::task::JoinHandle<()>,
}

impl AsyncRead for ArchiveStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.stdout).poll_read(cx, buf)
    }
}

impl Drop for ArchiveStream {
    fn drop(&mut self) {
        self.watchdog.abort();
        if let Ok(mut child) = self.child.lock() {
            let _ = child.start_kill();
        }
    }
}

fn tmp_path(dest: &std::path::Path) -> PathBuf {
    let mut name = dest.file_name().expect("mirror path has a file name").to_os_string();
    name.push("_tmp");
    dest.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bare_worker(data_dir: PathBuf) -> GitWorker {
        GitWorker {
            data_dir,
            clone_sem: Arc::new(Semaphore::new(1)),
            archive_sem: Arc::new(Semaphore::new(1)),
            other_sem: Arc::new(Semaphore::new(4)),
            in_flight: RwLock::new(HashMap::new()),
            other_timeout: Duration::from_secs(5),
            clone_timeout: Duration::from_secs(5),
            archive_timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn status_is_unknown_before_clone_and_cloned_after_head_written() {
        let tmp = tempfile::tempdir().unwrap();
        let worker = bare_worker(tmp.path().to_path_buf());
        let url = RepoUrl::normalize("https://github.com/octocat/hello-world").unwrap();

        assert_eq!(worker.status(&url).await, CloneStatus::Unknown);

        let repo_path = worker.repo_path(&url);
        tokio::fs::create_dir_all(&repo_path).await.unwrap();
        tokio::fs::write(repo_path.join("HEAD"), b"ref: refs/heads/main\n").await.unwrap();

        assert_eq!(worker.status(&url).await, CloneStatus::Cloned);
    }

    #[tokio::test]
    async fn clone_reports_already_cloned() {
        let tmp = tempfile::tempdir().unwrap();
        let worker = Arc::new(bare_worker(tmp.path().to_path_buf()));
        let url = RepoUrl::normalize("https://github.com/octocat/hello-world").unwrap();

        let repo_path = worker.repo_path(&url);
        tokio::fs::create_dir_all(&repo_path).await.unwrap();
        tokio::fs::write(repo_path.join("HEAD"), b"ref: refs/heads/main\n").await.unwrap();

        let err = worker.clone(url).await.unwrap_err();
        assert_eq!(err, GitError::Cloned);
    }

    #[tokio::test]
    async fn clone_reports_busy_when_slot_is_held() {
        let tmp = tempfile::tempdir().unwrap();
        let worker = Arc::new(bare_worker(tmp.path().to_path_buf()));
        let _permit = worker.clone_sem.clone().try_acquire_owned().unwrap();

        let url = RepoUrl::normalize("https://github.com/octocat/hello-world").unwrap();
        let err = worker.clone(url).await.unwrap_err();
        assert_eq!(err, GitError::Busy);
    }

    #[tokio::test]
    async fn clone_reports_already_cloning_when_in_flight() {
        let tmp = tempfile::tempdir().unwrap();
        let worker = bare_worker(tmp.path().to_path_buf());
        let url = RepoUrl::normalize("https://github.com/octocat/hello-world").unwrap();
        worker.in_flight.write().await.insert(url.as_str().to_string(), Arc::new(Mutex::new(String::new())));

        let err = worker.clone(url).await.unwrap_err();
        assert_eq!(err, GitError::Cloning);
    }

    #[tokio::test]
    async fn clone_rejects_urls_with_a_path_depth_other_than_two() {
        let tmp = tempfile::tempdir().unwrap();
        let worker = Arc::new(bare_worker(tmp.path().to_path_buf()));

        let too_deep = RepoUrl::normalize("https://github.com/a/b/c").unwrap();
        assert_eq!(worker.clone(too_deep).await.unwrap_err(), GitError::InvalidUrl);

        let too_shallow = RepoUrl::normalize("https://github.com/a").unwrap();
        assert_eq!(worker.clone(too_shallow).await.unwrap_err(), GitError::InvalidUrl);
    }

    #[tokio::test]
    async fn refs_and_tree_reject_uncloned_repositories() {
        let tmp = tempfile::tempdir().unwrap();
        let worker = bare_worker(tmp.path().to_path_buf());
        let url = RepoUrl::normalize("https://github.com/octocat/hello-world").unwrap();

        assert_eq!(worker.refs(&url).await.unwrap_err(), GitError::NotExist);
        assert_eq!(worker.tree(&url, "main").await.unwrap_err(), GitError::NotExist);
    }
}
