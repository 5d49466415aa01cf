use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{Annotation, AnnotationRecord, LatestAnnotation, Project};
use crate::project::{ProjectError, ProjectStore};

pub struct ProjectRepository {
    pool: PgPool,
}

impl ProjectRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn internal(err: sqlx::Error) -> ProjectError {
    ProjectError::Internal(err.to_string())
}

#[async_trait]
impl ProjectStore for ProjectRepository {
    async fn insert_project(&self, owner_uid: Uuid, url: &str, hash: &str, name: &str, branch: bool) -> Result<Uuid, ProjectError> {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO projects (id, owner_uid, url, hash, name, branch, indexed) VALUES ($1, $2, $3, $4, $5, $6, false)",
        )
        .bind(id)
        .bind(owner_uid)
        .bind(url)
        .bind(hash)
        .bind(name)
        .bind(branch)
        .execute(&self.pool)
        .await
        .map_err(|err| match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => ProjectError::AlreadyExists,
            _ => internal(err),
        })?;
        Ok(id)
    }

    async fn project_info(&self, owner_uid: Uuid, url: &str, name: &str) -> Result<Project, ProjectError> {
        sqlx::query_as::<_, Project>(
            "SELECT id, owner_uid, url, hash, name, branch, indexed, created_at FROM projects \
             WHERE owner_uid = $1 AND url = $2 AND name = $3",
        )
        .bind(owner_uid)
        .bind(url)
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(internal)?
        .ok_or(ProjectError::NotFound)
    }

    async fn project_exists(&self, pid: Uuid) -> Result<bool, ProjectError> {
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM projects WHERE id = $1)")
            .bind(pid)
            .fetch_one(&self.pool)
            .await
            .map_err(internal)
    }

    async fn set_project_indexed(&self, pid: Uuid) -> Result<(), ProjectError> {
        sqlx::query("UPDATE projects SET indexed = true WHERE id = $1")
            .bind(pid)
            .execute(&self.pool)
            .await
            .map_err(internal)?;
        Ok(())
    }

    async fn user_projects(&self, owner_uid: Uuid) -> Result<Vec<Project>, ProjectError> {
        sqlx::query_as::<_, Project>(
            "SELECT id, owner_uid, url, hash, name, branch, indexed, created_at FROM projects \
             WHERE owner_uid = $1 ORDER BY created_at DESC",
        )
        .bind(owner_uid)
        .fetch_all(&self.pool)
        .await
        .map_err(internal)
    }

    async fn add_annotation(&self, pid: Uuid, uid: Uuid, file: &str, text: &str, line_number: i32) -> Result<(), ProjectError> {
        sqlx::query(
            "INSERT INTO annotations (id, pid, uid, file, line_number, annotation) VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(Uuid::new_v4())
        .bind(pid)
        .bind(uid)
        .bind(file)
        .bind(line_number)
        .bind(text)
        .execute(&self.pool)
        .await
        .map_err(internal)?;
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
        sqlx::query(
            "INSERT INTO latest_annotations (pid, parent, sub, file, brief, line_number, timestamp) \
             VALUES ($1, $2, $3, $4, $5, $6, now()) \
             ON CONFLICT (pid, parent, sub) DO UPDATE SET \
             file = $4, brief = $5, line_number = $6, timestamp = now()",
        )
        .bind(pid)
        .bind(parent)
        .bind(sub)
        .bind(file)
        .bind(brief)
        .bind(line_number)
        .execute(&self.pool)
        .await
        .map_err(internal)?;
        Ok(())
    }

    async fn annotation_lines(&self, pid: Uuid, file: &str) -> Result<Vec<i32>, ProjectError> {
        sqlx::query_scalar(
            "SELECT DISTINCT line_number FROM annotations WHERE pid = $1 AND file = $2 ORDER BY line_number",
        )
        .bind(pid)
        .bind(file)
        .fetch_all(&self.pool)
        .await
        .map_err(internal)
    }

    async fn annotations(&self, pid: Uuid, file: &str, line_number: i32) -> Result<Vec<AnnotationRecord>, ProjectError> {
        let rows = sqlx::query_as::<_, Annotation>(
            "SELECT pid, uid, file, line_number, annotation as text, created_at FROM annotations \
             WHERE pid = $1 AND file = $2 AND line_number = $3 ORDER BY created_at",
        )
        .bind(pid)
        .bind(file)
        .bind(line_number)
        .fetch_all(&self.pool)
        .await
        .map_err(internal)?;

        Ok(rows
            .into_iter()
            .map(|a| AnnotationRecord { uid: a.uid, username: String::new(), text: a.text, created_at: a.created_at })
            .collect())
    }

    async fn latest_annotations(&self, pid: Uuid, parent: &str) -> Result<Vec<LatestAnnotation>, ProjectError> {
        sqlx::query_as::<_, LatestAnnotation>(
            "SELECT pid, parent, sub, file, brief, line_number, timestamp FROM latest_annotations \
             WHERE pid = $1 AND parent = $2 ORDER BY timestamp DESC",
        )
        .bind(pid)
        .bind(parent)
        .fetch_all(&self.pool)
        .await
        .map_err(internal)
    }
}
