use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::AppError;

// --- Accounts & Access Control ---

/// User
///
/// A row of the `users` table, minus the password hash. `deleted_at` is set
/// once the account has been soft-deleted.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, Default, PartialEq)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub username: String,
    pub email: String,
    pub photo_url: Option<String>,
    pub role_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Credentials
///
/// The minimum needed to verify a login. Never leaves the auth layer.
#[derive(Debug, Clone, FromRow)]
pub struct Credentials {
    pub id: i64,
    pub password: String,
}

/// NewUser
///
/// Insert payload for the `users` table. `password_hash` is already bcrypt'd.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub photo_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, Default, PartialEq)]
pub struct Role {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
}

/// Capability
///
/// A named permission string. `group` only drives how the admin panel lays
/// capabilities out.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, Default, PartialEq)]
pub struct Capability {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    // `group` is a reserved word in SQL; the column is quoted in every query.
    pub group: String,
}

/// A user as listed in the admin panel, with the role resolved.
#[derive(Debug, Clone, Serialize)]
pub struct UserWithRole {
    #[serde(flatten)]
    pub user: User,
    pub role: Option<Role>,
}

/// Capabilities sharing a `group`, as laid out on the role page.
#[derive(Debug, Clone, Serialize)]
pub struct CapabilityGroup {
    pub group: String,
    pub capabilities: Vec<GrantedCapability>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GrantedCapability {
    #[serde(flatten)]
    pub capability: Capability,
    pub granted: bool,
}

// --- Issue Tree ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, Default, PartialEq)]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    // Creator. Null once the creator has been hard-deleted.
    pub user_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, Default, PartialEq)]
pub struct Feature {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub project_id: i64,
    pub user_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
    // Loaded through a JOIN on `projects` where the query asks for it.
    #[sqlx(default)]
    pub project_name: Option<String>,
}

/// FeatureSummary
///
/// One row of the "all features" listing: live story and bug counts are
/// aggregated in SQL.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, Default, PartialEq)]
pub struct FeatureSummary {
    pub id: i64,
    pub name: String,
    pub project_id: i64,
    pub project_name: String,
    pub user_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub story_count: i64,
    pub bug_count: i64,
}

/// IssueKind
///
/// Stories and bugs share one table shape; the kind picks the table, the URL
/// segment and the capability names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueKind {
    Story,
    Bug,
}

impl IssueKind {
    /// Table name. Only ever one of two literals, so it is safe to splice
    /// into SQL text.
    pub fn table(self) -> &'static str {
        match self {
            IssueKind::Story => "stories",
            IssueKind::Bug => "bugs",
        }
    }

    /// URL segment, identical to the table name.
    pub fn plural(self) -> &'static str {
        self.table()
    }

    pub fn singular(self) -> &'static str {
        match self {
            IssueKind::Story => "story",
            IssueKind::Bug => "bug",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            IssueKind::Story => "Story",
            IssueKind::Bug => "Bug",
        }
    }

    pub fn label_plural(self) -> &'static str {
        match self {
            IssueKind::Story => "Stories",
            IssueKind::Bug => "Bugs",
        }
    }

    /// Verb used on the create form ("Create a Story", "Log a Bug").
    pub fn create_verb(self) -> &'static str {
        match self {
            IssueKind::Story => "Create",
            IssueKind::Bug => "Log",
        }
    }

    pub fn read_mine(self) -> &'static str {
        match self {
            IssueKind::Story => "read_stories_mine",
            IssueKind::Bug => "read_bugs_mine",
        }
    }

    pub fn read_others(self) -> &'static str {
        match self {
            IssueKind::Story => "read_stories_others",
            IssueKind::Bug => "read_bugs_others",
        }
    }

    pub fn create(self) -> &'static str {
        match self {
            IssueKind::Story => "create_stories",
            IssueKind::Bug => "create_bugs",
        }
    }

    pub fn update_mine(self) -> &'static str {
        match self {
            IssueKind::Story => "update_stories_mine",
            IssueKind::Bug => "update_bugs_mine",
        }
    }

    pub fn update_others(self) -> &'static str {
        match self {
            IssueKind::Story => "update_stories_others",
            IssueKind::Bug => "update_bugs_others",
        }
    }

    pub fn delete_mine(self) -> &'static str {
        match self {
            IssueKind::Story => "delete_stories_mine",
            IssueKind::Bug => "delete_bugs_mine",
        }
    }

    pub fn delete_others(self) -> &'static str {
        match self {
            IssueKind::Story => "delete_stories_others",
            IssueKind::Bug => "delete_bugs_others",
        }
    }
}

/// Issue
///
/// A story or a bug.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, Default, PartialEq)]
pub struct Issue {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub feature_id: i64,
    // Creator.
    pub user_id: Option<i64>,
    pub assignee_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
    #[sqlx(default)]
    pub feature_name: Option<String>,
}

impl Issue {
    /// Owner columns used for "mine" checks.
    pub fn owners(&self) -> [Option<i64>; 2] {
        [self.user_id, self.assignee_id]
    }
}

/// An issue with creator and assignee resolved, ready for a template.
#[derive(Debug, Clone, Serialize)]
pub struct IssueView {
    #[serde(flatten)]
    pub issue: Issue,
    pub creator: Option<User>,
    pub assignee: Option<User>,
}

// --- Validated Inputs ---

/// Draft
///
/// Validated name/description pair handed to the repository for projects,
/// features and roles.
#[derive(Debug, Clone, PartialEq)]
pub struct Draft {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IssueDraft {
    pub name: String,
    pub description: Option<String>,
    pub assignee_id: Option<i64>,
}

// --- Form Payloads ---

/// Name/description pair posted by the project, feature and role forms.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct NameForm {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl NameForm {
    pub fn description(&self) -> Option<String> {
        non_empty(&self.description)
    }

    pub fn into_draft(self) -> Result<Draft, AppError> {
        Ok(Draft {
            description: self.description(),
            name: required("NAME", &self.name)?,
        })
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct IssueForm {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub assignee_id: String,
}

impl IssueForm {
    pub fn description(&self) -> Option<String> {
        non_empty(&self.description)
    }

    /// `0`, empty or unparsable means unassigned.
    pub fn assignee(&self) -> Option<i64> {
        parse_optional_id(&self.assignee_id)
    }

    pub fn into_draft(self) -> Result<IssueDraft, AppError> {
        Ok(IssueDraft {
            description: self.description(),
            assignee_id: self.assignee(),
            name: required("NAME", &self.name)?,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

/// Capability ids posted by the role permissions form; the field repeats once
/// per checked box.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct PermissionsForm {
    #[serde(default)]
    pub permissions: Vec<i64>,
}

/// SetUserRoleRequest
///
/// JSON body of `POST /admin/setUserRole`. Ids arrive either as numbers or as
/// strings, depending on which page posted them.
#[derive(Debug, Clone, Deserialize)]
pub struct SetUserRoleRequest {
    pub user_id: FlexibleId,
    pub role_id: FlexibleId,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum FlexibleId {
    Number(i64),
    Text(String),
}

impl FlexibleId {
    pub fn value(&self) -> Option<i64> {
        match self {
            FlexibleId::Number(n) if *n > 0 => Some(*n),
            FlexibleId::Number(_) => None,
            FlexibleId::Text(s) => parse_optional_id(s),
        }
    }
}

/// Query string of the user DELETE endpoint.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct DeleteUserQuery {
    #[serde(default)]
    pub mode: Option<String>,
}

impl DeleteUserQuery {
    pub fn is_hard(&self) -> bool {
        self.mode.as_deref() == Some("hard")
    }
}

/// Body returned by the JSON endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusResponse {
    pub status: String,
}

impl StatusResponse {
    pub fn success() -> Self {
        Self {
            status: "success".to_string(),
        }
    }
}

/// Trimmed value of a mandatory field, or a 422 naming it.
pub fn required(field: &str, value: &str) -> Result<String, AppError> {
    non_empty(value).ok_or_else(|| AppError::Validation(format!("{} is required.", field)))
}

pub fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Positive integer ids only; anything else reads as "none".
pub fn parse_optional_id(value: &str) -> Option<i64> {
    value.trim().parse::<i64>().ok().filter(|id| *id > 0)
}
