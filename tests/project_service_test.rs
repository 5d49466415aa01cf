//! End-to-end exercise of [`klask_rs::project::ProjectService`] wired to
//! in-memory fakes for its store and account seams, so the annotation
//! rollup and indexing-flag behavior can be verified without a database.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use klask_rs::account::{AccountError, AccountService, AccountStore};
use klask_rs::models::{Account, AccountBasicInfo, AnnotationRecord, LatestAnnotation, Project, RepoUrl};
use klask_rs::project::{IndexRequester, ProjectError, ProjectService, ProjectStore};
use uuid::Uuid;

#[derive(Default)]
struct FakeAccountStore {
    accounts: Mutex<Vec<Account>>,
}

#[async_trait]
impl AccountStore for FakeAccountStore {
    async fn find_by_name_or_email(&self, identifier: &str) -> Result<Option<Account>, AccountError> {
        Ok(self.accounts.lock().unwrap().iter().find(|a| a.name == identifier || a.email == identifier).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, AccountError> {
        Ok(self.accounts.lock().unwrap().iter().find(|a| a.id == id).cloned())
    }

    async fn basic_info(&self, ids: &[Uuid]) -> Result<Vec<AccountBasicInfo>, AccountError> {
        Ok(self
            .accounts
            .lock()
            .unwrap()
            .iter()
            .filter(|a| ids.contains(&a.id))
            .map(|a| AccountBasicInfo { id: a.id, name: a.name.clone() })
            .collect())
    }

    async fn insert(&self, name: &str, email: &str, password_hash: &str) -> Result<Account, AccountError> {
        let account = Account {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            created_at: Utc::now(),
        };
        self.accounts.lock().unwrap().push(account.clone());
        Ok(account)
    }
}

#[derive(Default)]
struct FakeProjectStore {
    projects: Mutex<Vec<Project>>,
    annotations: Mutex<Vec<(Uuid, Uuid, String, i32, String)>>,
    latest: Mutex<HashMap<(Uuid, String, String), LatestAnnotation>>,
}

#[async_trait]
impl ProjectStore for FakeProjectStore {
    async fn insert_project(&self, owner_uid: Uuid, url: &str, hash: &str, name: &str, branch: bool) -> Result<Uuid, ProjectError> {
        let mut projects = self.projects.lock().unwrap();
        if projects.iter().any(|p| p.owner_uid == owner_uid && p.url == url && p.name == name) {
            return Err(ProjectError::AlreadyExists);
        }
        let id = Uuid::new_v4();
        projects.push(Project {
            id,
            owner_uid,
            url: url.to_string(),
            hash: hash.to_string(),
            name: name.to_string(),
            branch,
            indexed: false,
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn project_info(&self, owner_uid: Uuid, url: &str, name: &str) -> Result<Project, ProjectError> {
        self.projects
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.owner_uid == owner_uid && p.url == url && p.name == name)
            .cloned()
            .ok_or(ProjectError::NotFound)
    }

    async fn project_exists(&self, pid: Uuid) -> Result<bool, ProjectError> {
        Ok(self.projects.lock().unwrap().iter().any(|p| p.id == pid))
    }

    async fn set_project_indexed(&self, pid: Uuid) -> Result<(), ProjectError> {
        if let Some(project) = self.projects.lock().unwrap().iter_mut().find(|p| p.id == pid) {
            project.indexed = true;
        }
        Ok(())
    }

    async fn user_projects(&self, owner_uid: Uuid) -> Result<Vec<Project>, ProjectError> {
        Ok(self.projects.lock().unwrap().iter().filter(|p| p.owner_uid == owner_uid).cloned().collect())
    }

    async fn add_annotation(&self, pid: Uuid, uid: Uuid, file: &str, text: &str, line_number: i32) -> Result<(), ProjectError> {
        self.annotations.lock().unwrap().push((pid, uid, file.to_string(), line_number, text.to_string()));
        Ok(())
    }

    async fn update_latest_annotation(
        &self,
        pid: Uuid,
        parent: &str,
        sub: &str,
        file: &str,
        brief: &str,
        line_number: i32,
    ) -> Result<(), ProjectError> {
        self.latest.lock().unwrap().insert(
            (pid, parent.to_string(), sub.to_string()),
            LatestAnnotation {
                pid,
                parent: parent.to_string(),
                sub: sub.to_string(),
                file: file.to_string(),
                brief: brief.to_string(),
                line_number,
                timestamp: Utc::now(),
            },
        );
        Ok(())
    }

    async fn annotation_lines(&self, pid: Uuid, file: &str) -> Result<Vec<i32>, ProjectError> {
        let mut lines: Vec<i32> =
            self.annotations.lock().unwrap().iter().filter(|a| a.0 == pid && a.2 == file).map(|a| a.3).collect();
        lines.sort_unstable();
        lines.dedup();
        Ok(lines)
    }

    async fn annotations(&self, pid: Uuid, file: &str, line_number: i32) -> Result<Vec<AnnotationRecord>, ProjectError> {
        Ok(self
            .annotations
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.0 == pid && a.2 == file && a.3 == line_number)
            .map(|a| AnnotationRecord { uid: a.1, username: String::new(), text: a.4.clone(), created_at: Utc::now() })
            .collect())
    }

    async fn latest_annotations(&self, pid: Uuid, parent: &str) -> Result<Vec<LatestAnnotation>, ProjectError> {
        Ok(self.latest.lock().unwrap().values().filter(|a| a.pid == pid && a.parent == parent).cloned().collect())
    }
}

struct FakeIndexer {
    indexed: bool,
}

#[async_trait]
impl IndexRequester for FakeIndexer {
    async fn request_indexing(&self, _url: RepoUrl, _hash: String) -> bool {
        self.indexed
    }
}

fn build(indexed_already: bool) -> ProjectService<FakeProjectStore, FakeAccountStore> {
    let accounts = Arc::new(AccountService::new(Arc::new(FakeAccountStore::default())));
    let store = Arc::new(FakeProjectStore::default());
    let indexer = Arc::new(FakeIndexer { indexed: indexed_already }) as Arc<dyn IndexRequester>;
    ProjectService::new(store, accounts, indexer)
}

#[tokio::test]
async fn project_info_flips_indexed_on_read_once_already_indexed() {
    let service = build(true);
    let owner = Uuid::new_v4();

    service.new_project(owner, "https://github.com/octocat/hello-world", "deadbeef", "demo", true).await.unwrap();

    let info = service.project_info(owner, owner, "https://github.com/octocat/hello-world", "demo").await.unwrap();
    assert!(info.indexed);
    assert!(info.can_annotate);
}

#[tokio::test]
async fn project_info_stays_unindexed_while_a_background_pass_is_still_running() {
    let service = build(false);
    let owner = Uuid::new_v4();

    service.new_project(owner, "https://github.com/octocat/hello-world", "deadbeef", "demo", true).await.unwrap();

    let info = service.project_info(owner, owner, "https://github.com/octocat/hello-world", "demo").await.unwrap();
    assert!(!info.indexed);
}

/// `new_project` requests indexing on a detached task rather than
/// awaiting it inline, mirroring the original handler's fire-and-forget
/// goroutine — creation must not block on the indexing check.
#[tokio::test]
async fn new_project_does_not_block_on_the_indexing_request() {
    let service = build(true);
    let owner = Uuid::new_v4();

    let started = std::time::Instant::now();
    service.new_project(owner, "https://github.com/octocat/hello-world", "deadbeef", "demo", true).await.unwrap();
    assert!(started.elapsed() < std::time::Duration::from_millis(200));
}

#[tokio::test]
async fn project_info_denies_annotation_to_non_owners() {
    let service = build(true);
    let owner = Uuid::new_v4();
    let other = Uuid::new_v4();

    service.new_project(owner, "https://github.com/octocat/hello-world", "deadbeef", "demo", true).await.unwrap();

    let info = service.project_info(other, owner, "https://github.com/octocat/hello-world", "demo").await.unwrap();
    assert!(!info.can_annotate);
}

#[tokio::test]
async fn annotation_rolls_up_to_every_ancestor_directory() {
    let service = build(true);
    let owner = Uuid::new_v4();
    service.new_project(owner, "https://github.com/octocat/hello-world", "deadbeef", "demo", true).await.unwrap();
    let info = service.project_info(owner, owner, "https://github.com/octocat/hello-world", "demo").await.unwrap();

    service.add_annotation(info.id, owner, "api/router/router.go", "needs a timeout", 12).await.unwrap();

    let at_root = service.latest_annotations(info.id, ".").await.unwrap();
    assert_eq!(at_root.len(), 1);
    assert_eq!(at_root[0].sub, "api");
    assert_eq!(at_root[0].file, "api/router/router.go");

    let at_api = service.latest_annotations(info.id, "api").await.unwrap();
    assert_eq!(at_api.len(), 1);
    assert_eq!(at_api[0].sub, "router");

    let lines = service.annotation_lines(info.id, "api/router/router.go").await.unwrap();
    assert_eq!(lines, vec![12]);
}

#[tokio::test]
async fn add_annotation_rejects_unknown_project() {
    let service = build(true);
    let err = service.add_annotation(Uuid::new_v4(), Uuid::new_v4(), "a.rs", "x", 1).await.unwrap_err();
    assert_eq!(err, ProjectError::NotFound);
}
