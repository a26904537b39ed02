use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use std::sync::Arc;
use uuid::Uuid;

use crate::models::{
    Capability, Credentials, Draft, Feature, FeatureSummary, Issue, IssueDraft, IssueKind,
    NewUser, Project, Role, User,
};

pub type DbResult<T> = Result<T, sqlx::Error>;

/// Repository
///
/// Every database access the handlers need. Handlers talk to
/// `Arc<dyn Repository>` only, so tests can swap in an in-memory store.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Sessions & Credentials ---
    /// Live (non-deleted) user owning a session younger than `max_age_secs`.
    async fn find_session_user(&self, session: Uuid, max_age_secs: i64) -> DbResult<Option<User>>;
    async fn role_permissions(&self, role_id: i64) -> DbResult<Vec<Capability>>;
    async fn find_credentials(&self, username: &str) -> DbResult<Option<Credentials>>;
    async fn find_user_by_username(&self, username: &str) -> DbResult<Option<User>>;
    /// Opens a session, dropping every other session of the user and touching `last_login`.
    async fn create_session(&self, user_id: i64) -> DbResult<Uuid>;
    async fn delete_session(&self, session: Uuid) -> DbResult<()>;

    // --- Users ---
    async fn create_user(&self, user: NewUser) -> DbResult<i64>;
    /// Includes soft-deleted users.
    async fn get_user(&self, id: i64) -> DbResult<Option<User>>;
    /// Every user, soft-deleted ones included.
    async fn list_users(&self) -> DbResult<Vec<User>>;
    async fn list_active_users(&self) -> DbResult<Vec<User>>;
    /// Clears assignments and sessions, then soft- or hard-deletes. False when no such user.
    async fn delete_user(&self, id: i64, hard: bool) -> DbResult<bool>;
    async fn set_user_role(&self, user_id: i64, role_id: Option<i64>) -> DbResult<bool>;
    async fn projects_for_user(&self, user_id: i64) -> DbResult<Vec<Project>>;
    async fn features_assigned_to(&self, user_id: i64) -> DbResult<Vec<Feature>>;
    async fn issues_assigned_to(&self, kind: IssueKind, user_id: i64) -> DbResult<Vec<Issue>>;

    // --- Roles & Capabilities ---
    async fn list_roles(&self) -> DbResult<Vec<Role>>;
    async fn get_role(&self, id: i64) -> DbResult<Option<Role>>;
    async fn create_role(&self, draft: Draft) -> DbResult<i64>;
    async fn update_role(&self, id: i64, draft: Draft) -> DbResult<bool>;
    async fn delete_role(&self, id: i64) -> DbResult<bool>;
    async fn list_capabilities(&self) -> DbResult<Vec<Capability>>;
    /// Replaces the role's capability set atomically.
    async fn set_role_permissions(&self, role_id: i64, capability_ids: Vec<i64>) -> DbResult<()>;

    // --- Projects ---
    async fn list_projects(&self) -> DbResult<Vec<Project>>;
    async fn get_project(&self, id: i64) -> DbResult<Option<Project>>;
    async fn create_project(&self, draft: Draft, user_id: i64) -> DbResult<i64>;
    async fn update_project(&self, id: i64, draft: Draft) -> DbResult<bool>;
    /// Soft-deletes the project, its features and their stories and bugs.
    async fn soft_delete_project(&self, id: i64) -> DbResult<bool>;

    // --- Features ---
    async fn list_feature_summaries(&self) -> DbResult<Vec<FeatureSummary>>;
    async fn features_for_project(&self, project_id: i64) -> DbResult<Vec<Feature>>;
    /// Includes soft-deleted features, with `project_name` filled in.
    async fn get_feature(&self, id: i64) -> DbResult<Option<Feature>>;
    async fn create_feature(&self, project_id: i64, draft: Draft, user_id: i64) -> DbResult<i64>;
    async fn update_feature(&self, id: i64, draft: Draft) -> DbResult<bool>;
    /// Soft-deletes the feature and its stories and bugs.
    async fn soft_delete_feature(&self, id: i64) -> DbResult<bool>;

    // --- Stories & Bugs ---
    async fn list_issues(&self, kind: IssueKind) -> DbResult<Vec<Issue>>;
    async fn issues_for_feature(&self, kind: IssueKind, feature_id: i64) -> DbResult<Vec<Issue>>;
    async fn get_issue(&self, kind: IssueKind, id: i64) -> DbResult<Option<Issue>>;
    async fn create_issue(
        &self,
        kind: IssueKind,
        feature_id: i64,
        draft: IssueDraft,
        user_id: i64,
    ) -> DbResult<i64>;
    async fn update_issue(&self, kind: IssueKind, id: i64, draft: IssueDraft) -> DbResult<bool>;
    async fn soft_delete_issue(&self, kind: IssueKind, id: i64) -> DbResult<bool>;
}

/// RepositoryState
///
/// The concrete type used to share the repository across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// PostgresRepository
///
/// Concrete `Repository` over a `PgPool`. Queries are checked at runtime
/// (`query_as` + `FromRow`), so building the crate needs no live database.
#[derive(Clone)]
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const USER_COLUMNS: &str = "u.id, u.name, u.username, u.email, u.photo_url, u.role_id, \
     u.created_at, u.updated_at, u.last_login, u.deleted_at";

const PROJECT_COLUMNS: &str =
    "p.id, p.name, p.description, p.user_id, p.created_at, p.updated_at, p.deleted_at";

const FEATURE_COLUMNS: &str = "f.id, f.name, f.description, f.project_id, f.user_id, \
     f.created_at, f.updated_at, f.deleted_at, p.name AS project_name";

const ISSUE_COLUMNS: &str = "i.id, i.name, i.description, i.feature_id, i.user_id, \
     i.assignee_id, i.created_at, i.updated_at, i.deleted_at, f.name AS feature_name";

/// Logs a failed query under the operation name and hands the error back.
fn logged(op: &'static str) -> impl Fn(sqlx::Error) -> sqlx::Error {
    move |e| {
        tracing::error!("{} error: {:?}", op, e);
        e
    }
}

/// Soft-deletes the live stories and bugs hanging off `feature_ids`.
async fn cascade_issues(tx: &mut Transaction<'_, Postgres>, feature_ids: &[i64]) -> DbResult<()> {
    for kind in [IssueKind::Story, IssueKind::Bug] {
        let sql = format!(
            "UPDATE {} SET deleted_at = NOW() WHERE feature_id = ANY($1) AND deleted_at IS NULL",
            kind.table()
        );
        sqlx::query(&sql).bind(feature_ids).execute(&mut **tx).await?;
    }
    Ok(())
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn find_session_user(&self, session: Uuid, max_age_secs: i64) -> DbResult<Option<User>> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM sessions s JOIN users u ON u.id = s.user_id \
             WHERE s.uuid = $1 AND u.deleted_at IS NULL \
             AND s.created_at > NOW() - make_interval(secs => $2)"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(session)
            .bind(max_age_secs as f64)
            .fetch_optional(&self.pool)
            .await
            .map_err(logged("find_session_user"))
    }

    async fn role_permissions(&self, role_id: i64) -> DbResult<Vec<Capability>> {
        sqlx::query_as::<_, Capability>(
            r#"
            SELECT c.id, c.name, c.description, c."group"
            FROM permissions p
            JOIN capabilities c ON c.id = p.capability_id
            WHERE p.role_id = $1
            ORDER BY c.id
            "#,
        )
        .bind(role_id)
        .fetch_all(&self.pool)
        .await
        .map_err(logged("role_permissions"))
    }

    async fn find_credentials(&self, username: &str) -> DbResult<Option<Credentials>> {
        sqlx::query_as::<_, Credentials>(
            "SELECT id, password FROM users WHERE username = $1 AND deleted_at IS NULL",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(logged("find_credentials"))
    }

    async fn find_user_by_username(&self, username: &str) -> DbResult<Option<User>> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users u WHERE u.username = $1 AND u.deleted_at IS NULL"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(logged("find_user_by_username"))
    }

    async fn create_session(&self, user_id: i64) -> DbResult<Uuid> {
        let session = Uuid::new_v4();
        let mut tx = self.pool.begin().await.map_err(logged("create_session"))?;

        sqlx::query("DELETE FROM sessions WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(logged("create_session"))?;

        sqlx::query("INSERT INTO sessions (uuid, user_id) VALUES ($1, $2)")
            .bind(session)
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(logged("create_session"))?;

        sqlx::query("UPDATE users SET last_login = NOW() WHERE id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(logged("create_session"))?;

        tx.commit().await.map_err(logged("create_session"))?;
        Ok(session)
    }

    async fn delete_session(&self, session: Uuid) -> DbResult<()> {
        sqlx::query("DELETE FROM sessions WHERE uuid = $1")
            .bind(session)
            .execute(&self.pool)
            .await
            .map_err(logged("delete_session"))?;
        Ok(())
    }

    async fn create_user(&self, user: NewUser) -> DbResult<i64> {
        sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO users (name, username, email, password, photo_url)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(user.name)
        .bind(user.username)
        .bind(user.email)
        .bind(user.password_hash)
        .bind(user.photo_url)
        .fetch_one(&self.pool)
        .await
        .map_err(logged("create_user"))
    }

    async fn get_user(&self, id: i64) -> DbResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users u WHERE u.id = $1");
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(logged("get_user"))
    }

    async fn list_users(&self) -> DbResult<Vec<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users u ORDER BY u.id");
        sqlx::query_as::<_, User>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(logged("list_users"))
    }

    async fn list_active_users(&self) -> DbResult<Vec<User>> {
        let sql =
            format!("SELECT {USER_COLUMNS} FROM users u WHERE u.deleted_at IS NULL ORDER BY u.name");
        sqlx::query_as::<_, User>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(logged("list_active_users"))
    }

    async fn delete_user(&self, id: i64, hard: bool) -> DbResult<bool> {
        let mut tx = self.pool.begin().await.map_err(logged("delete_user"))?;

        for kind in [IssueKind::Story, IssueKind::Bug] {
            let sql = format!(
                "UPDATE {} SET assignee_id = NULL WHERE assignee_id = $1",
                kind.table()
            );
            sqlx::query(&sql)
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(logged("delete_user"))?;
        }

        sqlx::query("DELETE FROM sessions WHERE user_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(logged("delete_user"))?;

        let sql = if hard {
            "DELETE FROM users WHERE id = $1"
        } else {
            "UPDATE users SET deleted_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL"
        };
        let result = sqlx::query(sql)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(logged("delete_user"))?;

        if result.rows_affected() == 0 {
            tx.rollback().await.map_err(logged("delete_user"))?;
            return Ok(false);
        }

        tx.commit().await.map_err(logged("delete_user"))?;
        Ok(true)
    }

    async fn set_user_role(&self, user_id: i64, role_id: Option<i64>) -> DbResult<bool> {
        let result = sqlx::query("UPDATE users SET role_id = $2, updated_at = NOW() WHERE id = $1")
            .bind(user_id)
            .bind(role_id)
            .execute(&self.pool)
            .await
            .map_err(logged("set_user_role"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn projects_for_user(&self, user_id: i64) -> DbResult<Vec<Project>> {
        let sql = format!(
            "SELECT {PROJECT_COLUMNS} FROM projects p \
             WHERE p.user_id = $1 AND p.deleted_at IS NULL ORDER BY p.id"
        );
        sqlx::query_as::<_, Project>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(logged("projects_for_user"))
    }

    async fn features_assigned_to(&self, user_id: i64) -> DbResult<Vec<Feature>> {
        let sql = format!(
            "SELECT {FEATURE_COLUMNS} FROM features f JOIN projects p ON p.id = f.project_id \
             WHERE f.deleted_at IS NULL AND ( \
                 EXISTS (SELECT 1 FROM stories s WHERE s.feature_id = f.id \
                         AND s.assignee_id = $1 AND s.deleted_at IS NULL) \
              OR EXISTS (SELECT 1 FROM bugs b WHERE b.feature_id = f.id \
                         AND b.assignee_id = $1 AND b.deleted_at IS NULL)) \
             ORDER BY f.id"
        );
        sqlx::query_as::<_, Feature>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(logged("features_assigned_to"))
    }

    async fn issues_assigned_to(&self, kind: IssueKind, user_id: i64) -> DbResult<Vec<Issue>> {
        let sql = format!(
            "SELECT {ISSUE_COLUMNS} FROM {} i JOIN features f ON f.id = i.feature_id \
             WHERE i.assignee_id = $1 AND i.deleted_at IS NULL ORDER BY i.id",
            kind.table()
        );
        sqlx::query_as::<_, Issue>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(logged("issues_assigned_to"))
    }

    async fn list_roles(&self) -> DbResult<Vec<Role>> {
        sqlx::query_as::<_, Role>("SELECT id, name, description FROM roles ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(logged("list_roles"))
    }

    async fn get_role(&self, id: i64) -> DbResult<Option<Role>> {
        sqlx::query_as::<_, Role>("SELECT id, name, description FROM roles WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(logged("get_role"))
    }

    async fn create_role(&self, draft: Draft) -> DbResult<i64> {
        sqlx::query_scalar::<_, i64>(
            "INSERT INTO roles (name, description) VALUES ($1, $2) RETURNING id",
        )
        .bind(draft.name)
        .bind(draft.description)
        .fetch_one(&self.pool)
        .await
        .map_err(logged("create_role"))
    }

    async fn update_role(&self, id: i64, draft: Draft) -> DbResult<bool> {
        let result = sqlx::query("UPDATE roles SET name = $2, description = $3 WHERE id = $1")
            .bind(id)
            .bind(draft.name)
            .bind(draft.description)
            .execute(&self.pool)
            .await
            .map_err(logged("update_role"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_role(&self, id: i64) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM roles WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(logged("delete_role"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_capabilities(&self) -> DbResult<Vec<Capability>> {
        sqlx::query_as::<_, Capability>(
            r#"SELECT id, name, description, "group" FROM capabilities ORDER BY "group", id"#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(logged("list_capabilities"))
    }

    async fn set_role_permissions(&self, role_id: i64, capability_ids: Vec<i64>) -> DbResult<()> {
        let mut tx = self.pool.begin().await.map_err(logged("set_role_permissions"))?;

        sqlx::query("DELETE FROM permissions WHERE role_id = $1")
            .bind(role_id)
            .execute(&mut *tx)
            .await
            .map_err(logged("set_role_permissions"))?;

        if !capability_ids.is_empty() {
            sqlx::query(
                "INSERT INTO permissions (role_id, capability_id) \
                 SELECT $1, UNNEST($2::BIGINT[]) ON CONFLICT DO NOTHING",
            )
            .bind(role_id)
            .bind(&capability_ids[..])
            .execute(&mut *tx)
            .await
            .map_err(logged("set_role_permissions"))?;
        }

        tx.commit().await.map_err(logged("set_role_permissions"))
    }

    async fn list_projects(&self) -> DbResult<Vec<Project>> {
        let sql =
            format!("SELECT {PROJECT_COLUMNS} FROM projects p WHERE p.deleted_at IS NULL ORDER BY p.id");
        sqlx::query_as::<_, Project>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(logged("list_projects"))
    }

    async fn get_project(&self, id: i64) -> DbResult<Option<Project>> {
        let sql = format!(
            "SELECT {PROJECT_COLUMNS} FROM projects p WHERE p.id = $1 AND p.deleted_at IS NULL"
        );
        sqlx::query_as::<_, Project>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(logged("get_project"))
    }

    async fn create_project(&self, draft: Draft, user_id: i64) -> DbResult<i64> {
        sqlx::query_scalar::<_, i64>(
            "INSERT INTO projects (name, description, user_id) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(draft.name)
        .bind(draft.description)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(logged("create_project"))
    }

    async fn update_project(&self, id: i64, draft: Draft) -> DbResult<bool> {
        let result = sqlx::query(
            "UPDATE projects SET name = $2, description = $3, updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(draft.name)
        .bind(draft.description)
        .execute(&self.pool)
        .await
        .map_err(logged("update_project"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn soft_delete_project(&self, id: i64) -> DbResult<bool> {
        let mut tx = self.pool.begin().await.map_err(logged("soft_delete_project"))?;

        let result = sqlx::query(
            "UPDATE projects SET deleted_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(logged("soft_delete_project"))?;

        if result.rows_affected() == 0 {
            tx.rollback().await.map_err(logged("soft_delete_project"))?;
            return Ok(false);
        }

        let feature_ids = sqlx::query_scalar::<_, i64>(
            "UPDATE features SET deleted_at = NOW() \
             WHERE project_id = $1 AND deleted_at IS NULL RETURNING id",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await
        .map_err(logged("soft_delete_project"))?;

        cascade_issues(&mut tx, &feature_ids)
            .await
            .map_err(logged("soft_delete_project"))?;

        tx.commit().await.map_err(logged("soft_delete_project"))?;
        tracing::info!(project_id = id, features = feature_ids.len(), "project soft-deleted");
        Ok(true)
    }

    async fn list_feature_summaries(&self) -> DbResult<Vec<FeatureSummary>> {
        sqlx::query_as::<_, FeatureSummary>(
            r#"
            SELECT
                f.id, f.name, f.project_id, p.name AS project_name, f.user_id,
                f.created_at, f.updated_at,
                (SELECT COUNT(*) FROM stories s
                   WHERE s.feature_id = f.id AND s.deleted_at IS NULL) AS story_count,
                (SELECT COUNT(*) FROM bugs b
                   WHERE b.feature_id = f.id AND b.deleted_at IS NULL) AS bug_count
            FROM features f
            JOIN projects p ON p.id = f.project_id
            WHERE f.deleted_at IS NULL
            ORDER BY f.id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(logged("list_feature_summaries"))
    }

    async fn features_for_project(&self, project_id: i64) -> DbResult<Vec<Feature>> {
        let sql = format!(
            "SELECT {FEATURE_COLUMNS} FROM features f JOIN projects p ON p.id = f.project_id \
             WHERE f.project_id = $1 AND f.deleted_at IS NULL ORDER BY f.id"
        );
        sqlx::query_as::<_, Feature>(&sql)
            .bind(project_id)
            .fetch_all(&self.pool)
            .await
            .map_err(logged("features_for_project"))
    }

    async fn get_feature(&self, id: i64) -> DbResult<Option<Feature>> {
        let sql = format!(
            "SELECT {FEATURE_COLUMNS} FROM features f JOIN projects p ON p.id = f.project_id \
             WHERE f.id = $1"
        );
        sqlx::query_as::<_, Feature>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(logged("get_feature"))
    }

    async fn create_feature(&self, project_id: i64, draft: Draft, user_id: i64) -> DbResult<i64> {
        sqlx::query_scalar::<_, i64>(
            "INSERT INTO features (name, description, project_id, user_id) \
             VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(draft.name)
        .bind(draft.description)
        .bind(project_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(logged("create_feature"))
    }

    async fn update_feature(&self, id: i64, draft: Draft) -> DbResult<bool> {
        let result = sqlx::query(
            "UPDATE features SET name = $2, description = $3, updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(draft.name)
        .bind(draft.description)
        .execute(&self.pool)
        .await
        .map_err(logged("update_feature"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn soft_delete_feature(&self, id: i64) -> DbResult<bool> {
        let mut tx = self.pool.begin().await.map_err(logged("soft_delete_feature"))?;

        let result = sqlx::query(
            "UPDATE features SET deleted_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(logged("soft_delete_feature"))?;

        if result.rows_affected() == 0 {
            tx.rollback().await.map_err(logged("soft_delete_feature"))?;
            return Ok(false);
        }

        cascade_issues(&mut tx, &[id])
            .await
            .map_err(logged("soft_delete_feature"))?;

        tx.commit().await.map_err(logged("soft_delete_feature"))?;
        Ok(true)
    }

    async fn list_issues(&self, kind: IssueKind) -> DbResult<Vec<Issue>> {
        let sql = format!(
            "SELECT {ISSUE_COLUMNS} FROM {} i JOIN features f ON f.id = i.feature_id \
             WHERE i.deleted_at IS NULL ORDER BY i.id",
            kind.table()
        );
        sqlx::query_as::<_, Issue>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(logged("list_issues"))
    }

    async fn issues_for_feature(&self, kind: IssueKind, feature_id: i64) -> DbResult<Vec<Issue>> {
        let sql = format!(
            "SELECT {ISSUE_COLUMNS} FROM {} i JOIN features f ON f.id = i.feature_id \
             WHERE i.feature_id = $1 AND i.deleted_at IS NULL ORDER BY i.id",
            kind.table()
        );
        sqlx::query_as::<_, Issue>(&sql)
            .bind(feature_id)
            .fetch_all(&self.pool)
            .await
            .map_err(logged("issues_for_feature"))
    }

    async fn get_issue(&self, kind: IssueKind, id: i64) -> DbResult<Option<Issue>> {
        let sql = format!(
            "SELECT {ISSUE_COLUMNS} FROM {} i JOIN features f ON f.id = i.feature_id \
             WHERE i.id = $1 AND i.deleted_at IS NULL",
            kind.table()
        );
        sqlx::query_as::<_, Issue>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(logged("get_issue"))
    }

    async fn create_issue(
        &self,
        kind: IssueKind,
        feature_id: i64,
        draft: IssueDraft,
        user_id: i64,
    ) -> DbResult<i64> {
        let sql = format!(
            "INSERT INTO {} (name, description, feature_id, user_id, assignee_id) \
             VALUES ($1, $2, $3, $4, $5) RETURNING id",
            kind.table()
        );
        sqlx::query_scalar::<_, i64>(&sql)
            .bind(draft.name)
            .bind(draft.description)
            .bind(feature_id)
            .bind(user_id)
            .bind(draft.assignee_id)
            .fetch_one(&self.pool)
            .await
            .map_err(logged("create_issue"))
    }

    async fn update_issue(&self, kind: IssueKind, id: i64, draft: IssueDraft) -> DbResult<bool> {
        let sql = format!(
            "UPDATE {} SET name = $2, description = $3, assignee_id = $4, updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL",
            kind.table()
        );
        let result = sqlx::query(&sql)
            .bind(id)
            .bind(draft.name)
            .bind(draft.description)
            .bind(draft.assignee_id)
            .execute(&self.pool)
            .await
            .map_err(logged("update_issue"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn soft_delete_issue(&self, kind: IssueKind, id: i64) -> DbResult<bool> {
        let sql = format!(
            "UPDATE {} SET deleted_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
            kind.table()
        );
        let result = sqlx::query(&sql)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(logged("soft_delete_issue"))?;
        Ok(result.rows_affected() > 0)
    }
}
