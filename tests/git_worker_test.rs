//! Exercises [`klask_rs::git::GitWorker`] against a real local mirror,
//! bypassing `clone()` (which always shells out to the literal URL, so a
//! network-free test seeds the mirror directory by hand instead) the way
//! the in-module unit tests do, but through the crate's public surface.

use std::process::Command;
use std::time::Duration;

use klask_rs::git::GitWorker;
use klask_rs::models::RepoUrl;
use tempfile::TempDir;

fn git(dir: &std::path::Path, args: &[&str]) {
    let status = Command::new("git").current_dir(dir).args(args).status().expect("git binary available on PATH");
    assert!(status.success(), "git {args:?} failed in {dir:?}");
}

/// Builds a small real commit with a nested directory and a binary file,
/// then mirrors it at the exact path `GitWorker` expects for
/// `github.com/octocat/hello-world`. Returns the commit hash.
fn seed_mirror(data_dir: &std::path::Path) -> String {
    let work = TempDir::new().unwrap();
    git(work.path(), &["init", "-q", "-b", "main"]);
    git(work.path(), &["config", "user.email", "test@example.com"]);
    git(work.path(), &["config", "user.name", "Test"]);

    std::fs::create_dir_all(work.path().join("api/router")).unwrap();
    std::fs::write(work.path().join("api/router/router.go"), b"package router\n").unwrap();
    std::fs::write(work.path().join(".gitignore"), ".idea\n*.exe").unwrap();
    std::fs::write(work.path().join("image.png"), [0x89u8, b'P', b'N', b'G', 0, 0, 0, 0]).unwrap();

    git(work.path(), &["add", "."]);
    git(work.path(), &["commit", "-q", "-m", "seed"]);

    let hash = String::from_utf8(
        Command::new("git").current_dir(work.path()).args(["rev-parse", "HEAD"]).output().unwrap().stdout,
    )
    .unwrap()
    .trim()
    .to_string();

    let dst = data_dir.join("octocat").join("hello-world");
    std::fs::create_dir_all(dst.parent().unwrap()).unwrap();
    git(data_dir, &["clone", "--mirror", "-q", work.path().to_str().unwrap(), dst.to_str().unwrap()]);

    hash
}

#[tokio::test]
async fn refs_tree_and_blob_read_a_real_mirror() {
    let tmp = TempDir::new().unwrap();
    let hash = seed_mirror(tmp.path());

    let worker = GitWorker::new(
        tmp.path().to_path_buf(),
        4,
        4,
        4,
        Duration::from_secs(10),
        Duration::from_secs(10),
        Duration::from_secs(10),
    )
    .await
    .expect("git worker initializes against a real git binary");

    let url = RepoUrl::normalize("https://github.com/octocat/hello-world").unwrap();

    let refs = worker.refs(&url).await.unwrap();
    assert!(refs.iter().any(|r| r.name == "main" && r.branch && r.hash == hash));

    // A single tree() call must return the whole recursive listing,
    // including the nested "api/router" directory and its file, not just
    // the repository root's immediate children.
    let tree = worker.tree(&url, &hash).await.unwrap();
    assert!(tree.iter().any(|e| e.file == "api" && e.dir));
    assert!(tree.iter().any(|e| e.file == "api/router" && e.dir));
    assert!(tree.iter().any(|e| e.file == "api/router/router.go" && !e.dir));
    assert!(tree.iter().any(|e| e.file == ".gitignore" && !e.dir));

    let gitignore = worker.blob(&url, &hash, ".gitignore").await.unwrap();
    assert!(gitignore.plain);
    assert_eq!(gitignore.content, ".idea\n*.exe");

    let image = worker.blob(&url, &hash, "image.png").await.unwrap();
    assert!(!image.plain);
    assert_eq!(image.content, "");

    // `git show <hash>:<dir>` exits 0 and prints a `tree <hash>:<dir>`
    // banner instead of failing; a directory path must read as NotFound.
    assert_eq!(worker.blob(&url, &hash, "api/router").await.unwrap_err(), klask_rs::git::GitError::NotFound);
}

#[tokio::test]
async fn uncloned_repository_reports_not_exist() {
    let tmp = TempDir::new().unwrap();
    let worker = GitWorker::new(
        tmp.path().to_path_buf(),
        1,
        1,
        1,
        Duration::from_secs(5),
        Duration::from_secs(5),
        Duration::from_secs(5),
    )
    .await
    .unwrap();

    let url = RepoUrl::normalize("https://github.com/octocat/never-cloned").unwrap();
    assert_eq!(worker.refs(&url).await.unwrap_err(), klask_rs::git::GitError::NotExist);
    assert_eq!(worker.tree(&url, "main").await.unwrap_err(), klask_rs::git::GitError::NotExist);
    assert_eq!(worker.blob(&url, "main", "README.md").await.unwrap_err(), klask_rs::git::GitError::NotExist);
}
