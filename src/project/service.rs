//! Annotation projects: a project pins one repository at one commit for
//! one owner, and annotations hang off (project, file, line).

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::account::{AccountService, AccountStore};
use crate::models::{AnnotationRecord, LatestAnnotation, Project, RepoUrl};
use crate::project::error::ProjectError;

/// Requests indexing for a commit; decoupled from [`crate::indexer::Indexer`]
/// so the project service doesn't need to know its concrete symbol store.
///
/// Mirrors the original `requestForIndexing`/`IndexRepository` RPC pair: a
/// quick, awaited check of whether the commit is already indexed. If it
/// isn't, a background indexing pass is admitted (subject to the indexer's
/// own busy/duplicate rules) and the call still returns promptly with
/// `false` — only the already-indexed case is synchronous in effect.
#[async_trait]
pub trait IndexRequester: Send + Sync {
    async fn request_indexing(&self, url: RepoUrl, hash: String) -> bool;
}

#[async_trait]
pub trait ProjectStore: Send + Sync {
    /// Returns the newly created project's id, used to flip `indexed`
    /// immediately if [`IndexRequester::request_indexing`] reports the
    /// commit is already indexed.
    async fn insert_project(
        &self,
        owner_uid: Uuid,
        url: &str,
        hash: &str,
        name: &str,
        branch: bool,
    ) -> Result<Uuid, ProjectError>;
    async fn project_info(&self, owner_uid: Uuid, url: &str, name: &str) -> Result<Project, ProjectError>;
    async fn project_exists(&self, pid: Uuid) -> Result<bool, ProjectError>;
    async fn set_project_indexed(&self, pid: Uuid) -> Result<(), ProjectError>;
    async fn user_projects(&self, owner_uid: Uuid) -> Result<Vec<Project>, ProjectError>;

    async fn add_annotation(
        &self,
        pid: Uuid,
        uid: Uuid,
        file: &str,
        text: &str,
        line_number: i32,
    ) -> Result<(), ProjectError>;
    async fn update_latest_annotation(
        &self,
        pid: Uuid,
        parent: &str,
        sub: &str,
        file: &str,
        brief: &str,
        line_number: i32,
    ) -> Result<(), ProjectError>;
    async fn annotation_lines(&self, pid: Uuid, file: &str) -> Result<Vec<i32>, ProjectError>;
    async fn annotations(&self, pid: Uuid, file: &str, line_number: i32) -> Result<Vec<AnnotationRecord>, ProjectError>;
    async fn latest_annotations(&self, pid: Uuid, parent: &str) -> Result<Vec<LatestAnnotation>, ProjectError>;
}

pub struct ProjectService<S: ProjectStore, A: AccountStore> {
    store: Arc<S>,
    accounts: Arc<AccountService<A>>,
    indexer: Arc<dyn IndexRequester>,
}

impl<S: ProjectStore + 'static, A: AccountStore> ProjectService<S, A> {
    pub fn new(store: Arc<S>, accounts: Arc<AccountService<A>>, indexer: Arc<dyn IndexRequester>) -> Self {
        Self { store, accounts, indexer }
    }

    /// Creates the project row, then requests indexing the same way the
    /// original `NewProject` handler does: fired on a detached task so
    /// project creation doesn't wait on it. If the commit turns out to
    /// already be indexed, the task flips `indexed` once the check comes
    /// back; otherwise a background indexing pass was admitted and this
    /// never circles back to write anything.
    pub async fn new_project(
        &self,
        owner_uid: Uuid,
        raw_url: &str,
        hash: &str,
        name: &str,
        branch: bool,
    ) -> Result<(), ProjectError> {
        let url = RepoUrl::normalize(raw_url).ok_or(ProjectError::InvalidUrl)?;
        let pid = self.store.insert_project(owner_uid, url.as_str(), hash, name, branch).await?;

        let store = Arc::clone(&self.store);
        let indexer = Arc::clone(&self.indexer);
        let hash = hash.to_string();
        tokio::spawn(async move {
            if indexer.request_indexing(url, hash).await {
                if let Err(err) = store.set_project_indexed(pid).await {
                    tracing::warn!(pid = %pid, "failed to flip indexed flag after requesting indexing: {err}");
                }
            }
        });

        Ok(())
    }

    /// Reading project info has a side effect: an unindexed project
    /// re-requests indexing on every read, same as upstream. If the
    /// commit turns out to already be indexed, the `indexed` flag is
    /// flipped here rather than waiting for a separate notification.
    pub async fn project_info(&self, requester_uid: Uuid, owner_uid: Uuid, raw_url: &str, name: &str) -> Result<ProjectInfo, ProjectError> {
        let url = RepoUrl::normalize(raw_url).ok_or(ProjectError::InvalidUrl)?;
        let mut project = self.store.project_info(owner_uid, url.as_str(), name).await?;

        if !project.indexed && self.indexer.request_indexing(url, project.hash.clone()).await {
            self.store.set_project_indexed(project.id).await?;
            project.indexed = true;
        }

        Ok(ProjectInfo {
            id: project.id,
            hash: project.hash,
            branch: project.branch,
            indexed: project.indexed,
            can_annotate: requester_uid == owner_uid,
        })
    }

    pub async fn list_projects(&self, owner_uid: Uuid) -> Result<Vec<Project>, ProjectError> {
        self.store.user_projects(owner_uid).await
    }

    /// Adds an annotation, then walks every ancestor directory of `file`
    /// updating its "most recent annotation beneath here" rollup.
    pub async fn add_annotation(&self, pid: Uuid, uid: Uuid, file: &str, text: &str, line_number: i32) -> Result<(), ProjectError> {
        if !self.store.project_exists(pid).await? {
            return Err(ProjectError::NotFound);
        }

        self.store.add_annotation(pid, uid, file, text, line_number).await?;

        let brief = crate::models::latest_annotation::brief_of(text);
        let mut current = file.to_string();
        while current != "." && current != "/" {
            let parent = parent_of(&current);
            let sub = base_of(&current);
            self.store.update_latest_annotation(pid, &parent, &sub, file, &brief, line_number).await?;
            current = parent;
        }
        Ok(())
    }

    pub async fn annotation_lines(&self, pid: Uuid, file: &str) -> Result<Vec<i32>, ProjectError> {
        self.store.annotation_lines(pid, file).await
    }

    pub async fn annotations(&self, pid: Uuid, file: &str, line_number: i32) -> Result<Vec<AnnotationRecordWithName>, ProjectError> {
        let file = file.trim_start_matches('/');
        let records = self.store.annotations(pid, file, line_number).await?;

        let ids: Vec<Uuid> = {
            let mut seen = std::collections::HashSet::new();
            records.iter().map(|r| r.uid).filter(|id| seen.insert(*id)).collect()
        };
        let infos = self.accounts.basic_info(&ids).await.map_err(|e| ProjectError::Internal(e.to_string()))?;
        let name_of: std::collections::HashMap<Uuid, String> = infos.into_iter().map(|i| (i.id, i.name)).collect();

        Ok(records
            .into_iter()
            .map(|r| AnnotationRecordWithName { name: name_of.get(&r.uid).cloned().unwrap_or_default(), record: r })
            .collect())
    }

    pub async fn latest_annotations(&self, pid: Uuid, parent: &str) -> Result<Vec<LatestAnnotation>, ProjectError> {
        self.store.latest_annotations(pid, parent).await
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ProjectInfo {
    pub id: Uuid,
    pub hash: String,
    pub branch: bool,
    pub indexed: bool,
    pub can_annotate: bool,
}

#[derive(Debug, Clone)]
pub struct AnnotationRecordWithName {
    pub name: String,
    pub record: AnnotationRecord,
}

fn parent_of(path: &str) -> String {
    match path.rfind('/') {
        Some(0) => "/".to_string(),
        Some(idx) => path[..idx].to_string(),
        None => ".".to_string(),
    }
}

fn base_of(path: &str) -> String {
    match path.rfind('/') {
        Some(idx) => path[idx + 1..].to_string(),
        None => path.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_of_nested_path_strips_last_segment() {
        assert_eq!(parent_of("src/main.rs"), "src");
        assert_eq!(parent_of("src"), ".");
        assert_eq!(parent_of("a/b/c.rs"), "a/b");
        assert_eq!(parent_of("/a/b.rs"), "/a");
    }

    #[test]
    fn base_of_returns_final_segment() {
        assert_eq!(base_of("a/b/c.rs"), "c.rs");
        assert_eq!(base_of("c.rs"), "c.rs");
    }
}
