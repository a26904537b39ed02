// Shared by several test binaries; not every binary uses every helper.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use issuetrack::{
    AppState,
    auth::{AuthUser, hash_password},
    config::AppConfig,
    models::{
        Capability, Credentials, Draft, Feature, FeatureSummary, Issue, IssueDraft, IssueKind,
        NewUser, Project, Role, User,
    },
    permissions::Permissions,
    repository::{DbResult, Repository},
    storage::MockStorageService,
    views::Views,
};
use std::{
    collections::{BTreeSet, HashMap},
    fmt,
    sync::{Arc, Mutex},
};
use uuid::Uuid;

/// The error Postgres raises for a `UNIQUE` column.
#[derive(Debug)]
pub struct UniqueViolation(pub &'static str);

impl fmt::Display for UniqueViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "duplicate key value violates unique constraint \"{}\"", self.0)
    }
}

impl std::error::Error for UniqueViolation {}

impl sqlx::error::DatabaseError for UniqueViolation {
    fn message(&self) -> &str {
        "duplicate key value violates unique constraint"
    }

    fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        self
    }

    fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
        self
    }

    fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
        self
    }

    fn constraint(&self) -> Option<&str> {
        Some(self.0)
    }

    fn kind(&self) -> sqlx::error::ErrorKind {
        sqlx::error::ErrorKind::UniqueViolation
    }
}

fn unique_violation(constraint: &'static str) -> sqlx::Error {
    sqlx::Error::Database(Box::new(UniqueViolation(constraint)))
}

// --- IN-MEMORY REPOSITORY ---

/// Every capability the seed migration inserts, with its group.
pub const CAPABILITIES: [(&str, &str); 36] = [
    ("admin", "admin"),
    ("admin_read_users", "admin"),
    ("admin_update_users", "admin"),
    ("read_role", "admin"),
    ("create_role", "admin"),
    ("update_role", "admin"),
    ("delete_role", "admin"),
    ("update_permissions", "admin"),
    ("read_users", "users"),
    ("create_users", "users"),
    ("delete_users", "users"),
    ("read_projects_mine", "projects"),
    ("read_projects_others", "projects"),
    ("create_projects", "projects"),
    ("update_projects_mine", "projects"),
    ("update_projects_others", "projects"),
    ("delete_projects_mine", "projects"),
    ("delete_projects_others", "projects"),
    ("read_features", "features"),
    ("create_features", "features"),
    ("update_features", "features"),
    ("delete_features", "features"),
    ("read_stories_mine", "stories"),
    ("read_stories_others", "stories"),
    ("create_stories", "stories"),
    ("update_stories_mine", "stories"),
    ("update_stories_others", "stories"),
    ("delete_stories_mine", "stories"),
    ("delete_stories_others", "stories"),
    ("read_bugs_mine", "bugs"),
    ("read_bugs_others", "bugs"),
    ("create_bugs", "bugs"),
    ("update_bugs_mine", "bugs"),
    ("update_bugs_others", "bugs"),
    ("delete_bugs_mine", "bugs"),
    ("delete_bugs_others", "bugs"),
];

#[derive(Default)]
pub struct Store {
    pub users: Vec<User>,
    pub passwords: HashMap<i64, String>,
    pub sessions: HashMap<Uuid, (i64, DateTime<Utc>)>,
    pub roles: Vec<Role>,
    pub capabilities: Vec<Capability>,
    pub permissions: BTreeSet<(i64, i64)>,
    pub projects: Vec<Project>,
    pub features: Vec<Feature>,
    pub stories: Vec<Issue>,
    pub bugs: Vec<Issue>,
    next_id: i64,
}

impl Store {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn issues(&self, kind: IssueKind) -> &Vec<Issue> {
        match kind {
            IssueKind::Story => &self.stories,
            IssueKind::Bug => &self.bugs,
        }
    }

    fn issues_mut(&mut self, kind: IssueKind) -> &mut Vec<Issue> {
        match kind {
            IssueKind::Story => &mut self.stories,
            IssueKind::Bug => &mut self.bugs,
        }
    }

    fn project_name(&self, project_id: i64) -> Option<String> {
        self.projects
            .iter()
            .find(|p| p.id == project_id)
            .map(|p| p.name.clone())
    }

    fn feature_name(&self, feature_id: i64) -> Option<String> {
        self.features
            .iter()
            .find(|f| f.id == feature_id)
            .map(|f| f.name.clone())
    }

    fn with_project_name(&self, feature: &Feature) -> Feature {
        Feature {
            project_name: self.project_name(feature.project_id),
            ..feature.clone()
        }
    }

    fn with_feature_name(&self, issue: &Issue) -> Issue {
        Issue {
            feature_name: self.feature_name(issue.feature_id),
            ..issue.clone()
        }
    }

    fn live_user(&self, username: &str) -> Option<&User> {
        self.users
            .iter()
            .find(|u| u.username == username && u.deleted_at.is_none())
    }

    fn cascade_issues(&mut self, feature_ids: &[i64]) {
        let now = Utc::now();
        for kind in [IssueKind::Story, IssueKind::Bug] {
            for issue in self.issues_mut(kind) {
                if feature_ids.contains(&issue.feature_id) && issue.deleted_at.is_none() {
                    issue.deleted_at = Some(now);
                }
            }
        }
    }
}

/// MemoryRepo
///
/// `Repository` over plain vectors, mirroring the Postgres semantics closely
/// enough for handler and router tests: soft deletes, cascades, session TTL.
pub struct MemoryRepo {
    pub store: Mutex<Store>,
}

impl MemoryRepo {
    /// The four built-in roles (admin keeps id 1) and every capability, with
    /// nothing granted.
    pub fn new() -> Self {
        let mut store = Store::default();

        for (id, name) in [(1, "admin"), (2, "manager"), (3, "qa"), (4, "developer")] {
            store.roles.push(Role {
                id,
                name: name.to_string(),
                description: None,
            });
        }

        for (i, (name, group)) in CAPABILITIES.iter().enumerate() {
            store.capabilities.push(Capability {
                id: i as i64 + 1,
                name: name.to_string(),
                description: None,
                group: group.to_string(),
            });
        }

        store.next_id = 100;
        Self {
            store: Mutex::new(store),
        }
    }

    pub fn capability_id(&self, name: &str) -> i64 {
        let store = self.store.lock().unwrap();
        store
            .capabilities
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.id)
            .unwrap_or_else(|| panic!("unknown capability {}", name))
    }

    /// Adds `names` to the role's capability set.
    pub fn grant(&self, role_id: i64, names: &[&str]) {
        let ids: Vec<i64> = names.iter().map(|n| self.capability_id(n)).collect();
        let mut store = self.store.lock().unwrap();
        for id in ids {
            store.permissions.insert((role_id, id));
        }
    }

    /// Fresh role holding exactly `names`.
    pub fn role_with(&self, names: &[&str]) -> i64 {
        let role_id = {
            let mut store = self.store.lock().unwrap();
            let id = store.next_id();
            store.roles.push(Role {
                id,
                name: format!("role-{}", id),
                description: None,
            });
            id
        };
        self.grant(role_id, names);
        role_id
    }

    pub fn add_user(&self, username: &str, role_id: Option<i64>) -> i64 {
        self.insert_user(username, role_id, "!".to_string())
    }

    /// User whose bcrypt hash matches `password`.
    pub fn add_user_with_password(&self, username: &str, password: &str) -> i64 {
        let hash = hash_password(password, 4).unwrap();
        self.insert_user(username, None, hash)
    }

    fn insert_user(&self, username: &str, role_id: Option<i64>, hash: String) -> i64 {
        let mut store = self.store.lock().unwrap();
        let id = store.next_id();
        let now = Utc::now();
        store.users.push(User {
            id,
            name: format!("{} name", username),
            username: username.to_string(),
            email: format!("{}@example.com", username),
            photo_url: None,
            role_id,
            created_at: now,
            updated_at: now,
            last_login: now,
            deleted_at: None,
        });
        store.passwords.insert(id, hash);
        id
    }

    /// A user on a fresh role with `names`, resolved the way the extractor would.
    pub fn member(&self, username: &str, names: &[&str]) -> AuthUser {
        let role_id = self.role_with(names);
        let id = self.add_user(username, Some(role_id));
        self.auth_user(id)
    }

    pub fn auth_user(&self, user_id: i64) -> AuthUser {
        let store = self.store.lock().unwrap();
        let user = store
            .users
            .iter()
            .find(|u| u.id == user_id)
            .cloned()
            .unwrap();
        let permissions: Permissions = match user.role_id {
            Some(role_id) => store
                .capabilities
                .iter()
                .filter(|c| store.permissions.contains(&(role_id, c.id)))
                .cloned()
                .collect(),
            None => Permissions::new(),
        };
        AuthUser::new(user, permissions)
    }

    pub fn add_project(&self, name: &str, owner: i64) -> i64 {
        let mut store = self.store.lock().unwrap();
        let id = store.next_id();
        let now = Utc::now();
        store.projects.push(Project {
            id,
            name: name.to_string(),
            description: None,
            user_id: Some(owner),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        });
        id
    }

    pub fn add_feature(&self, project_id: i64, name: &str, owner: i64) -> i64 {
        let mut store = self.store.lock().unwrap();
        let id = store.next_id();
        let now = Utc::now();
        store.features.push(Feature {
            id,
            name: name.to_string(),
            description: None,
            project_id,
            user_id: Some(owner),
            created_at: now,
            updated_at: now,
            deleted_at: None,
            project_name: None,
        });
        id
    }

    pub fn add_issue(
        &self,
        kind: IssueKind,
        feature_id: i64,
        name: &str,
        creator: i64,
        assignee: Option<i64>,
    ) -> i64 {
        let mut store = self.store.lock().unwrap();
        let id = store.next_id();
        let now = Utc::now();
        store.issues_mut(kind).push(Issue {
            id,
            name: name.to_string(),
            description: None,
            feature_id,
            user_id: Some(creator),
            assignee_id: assignee,
            created_at: now,
            updated_at: now,
            deleted_at: None,
            feature_name: None,
        });
        id
    }

    pub fn open_session(&self, user_id: i64) -> Uuid {
        self.open_session_at(user_id, Utc::now())
    }

    pub fn open_session_at(&self, user_id: i64, created_at: DateTime<Utc>) -> Uuid {
        let session = Uuid::new_v4();
        self.store
            .lock()
            .unwrap()
            .sessions
            .insert(session, (user_id, created_at));
        session
    }

    // --- Raw reads, soft-deleted rows included ---

    pub fn user(&self, id: i64) -> Option<User> {
        let store = self.store.lock().unwrap();
        store.users.iter().find(|u| u.id == id).cloned()
    }

    pub fn project(&self, id: i64) -> Project {
        let store = self.store.lock().unwrap();
        store.projects.iter().find(|p| p.id == id).cloned().unwrap()
    }

    pub fn feature(&self, id: i64) -> Feature {
        let store = self.store.lock().unwrap();
        store.features.iter().find(|f| f.id == id).cloned().unwrap()
    }

    pub fn issue(&self, kind: IssueKind, id: i64) -> Issue {
        let store = self.store.lock().unwrap();
        store
            .issues(kind)
            .iter()
            .find(|i| i.id == id)
            .cloned()
            .unwrap()
    }

    pub fn soft_delete_feature_now(&self, id: i64) {
        let mut store = self.store.lock().unwrap();
        if let Some(feature) = store.features.iter_mut().find(|f| f.id == id) {
            feature.deleted_at = Some(Utc::now());
        }
    }

    pub fn soft_delete_issue_now(&self, kind: IssueKind, id: i64) {
        let mut store = self.store.lock().unwrap();
        if let Some(issue) = store.issues_mut(kind).iter_mut().find(|i| i.id == id) {
            issue.deleted_at = Some(Utc::now());
        }
    }

    pub fn soft_delete_project_now(&self, id: i64) {
        let mut store = self.store.lock().unwrap();
        if let Some(project) = store.projects.iter_mut().find(|p| p.id == id) {
            project.deleted_at = Some(Utc::now());
        }
    }

    pub fn session_count(&self, user_id: i64) -> usize {
        let store = self.store.lock().unwrap();
        store
            .sessions
            .values()
            .filter(|(owner, _)| *owner == user_id)
            .count()
    }
}

#[async_trait]
impl Repository for MemoryRepo {
    async fn find_session_user(&self, session: Uuid, max_age_secs: i64) -> DbResult<Option<User>> {
        let store = self.store.lock().unwrap();
        let cutoff = Utc::now() - Duration::seconds(max_age_secs);
        Ok(store
            .sessions
            .get(&session)
            .filter(|(_, created_at)| *created_at > cutoff)
            .and_then(|(user_id, _)| store.users.iter().find(|u| u.id == *user_id))
            .filter(|u| u.deleted_at.is_none())
            .cloned())
    }

    async fn role_permissions(&self, role_id: i64) -> DbResult<Vec<Capability>> {
        let store = self.store.lock().unwrap();
        Ok(store
            .capabilities
            .iter()
            .filter(|c| store.permissions.contains(&(role_id, c.id)))
            .cloned()
            .collect())
    }

    async fn find_credentials(&self, username: &str) -> DbResult<Option<Credentials>> {
        let store = self.store.lock().unwrap();
        Ok(store.live_user(username).map(|u| Credentials {
            id: u.id,
            password: store.passwords.get(&u.id).cloned().unwrap_or_default(),
        }))
    }

    async fn find_user_by_username(&self, username: &str) -> DbResult<Option<User>> {
        let store = self.store.lock().unwrap();
        Ok(store.live_user(username).cloned())
    }

    async fn create_session(&self, user_id: i64) -> DbResult<Uuid> {
        let mut store = self.store.lock().unwrap();
        let now = Utc::now();
        store.sessions.retain(|_, (owner, _)| *owner != user_id);
        let session = Uuid::new_v4();
        store.sessions.insert(session, (user_id, now));
        if let Some(user) = store.users.iter_mut().find(|u| u.id == user_id) {
            user.last_login = now;
        }
        Ok(session)
    }

    async fn delete_session(&self, session: Uuid) -> DbResult<()> {
        self.store.lock().unwrap().sessions.remove(&session);
        Ok(())
    }

    async fn create_user(&self, user: NewUser) -> DbResult<i64> {
        let mut store = self.store.lock().unwrap();
        if store.users.iter().any(|u| u.username == user.username) {
            return Err(unique_violation("users_username_key"));
        }
        let id = store.next_id();
        let now = Utc::now();
        store.users.push(User {
            id,
            name: user.name,
            username: user.username,
            email: user.email,
            photo_url: user.photo_url,
            role_id: None,
            created_at: now,
            updated_at: now,
            last_login: now,
            deleted_at: None,
        });
        store.passwords.insert(id, user.password_hash);
        Ok(id)
    }

    async fn get_user(&self, id: i64) -> DbResult<Option<User>> {
        Ok(self.user(id))
    }

    async fn list_users(&self) -> DbResult<Vec<User>> {
        Ok(self.store.lock().unwrap().users.clone())
    }

    async fn list_active_users(&self) -> DbResult<Vec<User>> {
        let store = self.store.lock().unwrap();
        let mut users: Vec<User> = store
            .users
            .iter()
            .filter(|u| u.deleted_at.is_none())
            .cloned()
            .collect();
        users.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(users)
    }

    async fn delete_user(&self, id: i64, hard: bool) -> DbResult<bool> {
        let mut store = self.store.lock().unwrap();
        let Some(position) = store
            .users
            .iter()
            .position(|u| u.id == id && (hard || u.deleted_at.is_none()))
        else {
            return Ok(false);
        };

        for kind in [IssueKind::Story, IssueKind::Bug] {
            for issue in store.issues_mut(kind) {
                if issue.assignee_id == Some(id) {
                    issue.assignee_id = None;
                }
            }
        }
        store.sessions.retain(|_, (owner, _)| *owner != id);

        if hard {
            store.users.remove(position);
            store.passwords.remove(&id);
        } else {
            let now = Utc::now();
            let user = &mut store.users[position];
            user.deleted_at = Some(now);
            user.updated_at = now;
        }
        Ok(true)
    }

    async fn set_user_role(&self, user_id: i64, role_id: Option<i64>) -> DbResult<bool> {
        let mut store = self.store.lock().unwrap();
        match store.users.iter_mut().find(|u| u.id == user_id) {
            Some(user) => {
                user.role_id = role_id;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn projects_for_user(&self, user_id: i64) -> DbResult<Vec<Project>> {
        let store = self.store.lock().unwrap();
        Ok(store
            .projects
            .iter()
            .filter(|p| p.user_id == Some(user_id) && p.deleted_at.is_none())
            .cloned()
            .collect())
    }

    async fn features_assigned_to(&self, user_id: i64) -> DbResult<Vec<Feature>> {
        let store = self.store.lock().unwrap();
        let assigned = |feature_id: i64| {
            store.stories.iter().chain(store.bugs.iter()).any(|i| {
                i.feature_id == feature_id
                    && i.assignee_id == Some(user_id)
                    && i.deleted_at.is_none()
            })
        };
        Ok(store
            .features
            .iter()
            .filter(|f| f.deleted_at.is_none() && assigned(f.id))
            .map(|f| store.with_project_name(f))
            .collect())
    }

    async fn issues_assigned_to(&self, kind: IssueKind, user_id: i64) -> DbResult<Vec<Issue>> {
        let store = self.store.lock().unwrap();
        Ok(store
            .issues(kind)
            .iter()
            .filter(|i| i.assignee_id == Some(user_id) && i.deleted_at.is_none())
            .map(|i| store.with_feature_name(i))
            .collect())
    }

    async fn list_roles(&self) -> DbResult<Vec<Role>> {
        let mut roles = self.store.lock().unwrap().roles.clone();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roles)
    }

    async fn get_role(&self, id: i64) -> DbResult<Option<Role>> {
        let store = self.store.lock().unwrap();
        Ok(store.roles.iter().find(|r| r.id == id).cloned())
    }

    async fn create_role(&self, draft: Draft) -> DbResult<i64> {
        let mut store = self.store.lock().unwrap();
        if store.roles.iter().any(|r| r.name == draft.name) {
            return Err(unique_violation("roles_name_key"));
        }
        let id = store.next_id();
        store.roles.push(Role {
            id,
            name: draft.name,
            description: draft.description,
        });
        Ok(id)
    }

    async fn update_role(&self, id: i64, draft: Draft) -> DbResult<bool> {
        let mut store = self.store.lock().unwrap();
        if store.roles.iter().any(|r| r.name == draft.name && r.id != id) {
            return Err(unique_violation("roles_name_key"));
        }
        match store.roles.iter_mut().find(|r| r.id == id) {
            Some(role) => {
                role.name = draft.name;
                role.description = draft.description;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_role(&self, id: i64) -> DbResult<bool> {
        let mut store = self.store.lock().unwrap();
        let before = store.roles.len();
        store.roles.retain(|r| r.id != id);
        if store.roles.len() == before {
            return Ok(false);
        }
        store.permissions.retain(|(role_id, _)| *role_id != id);
        for user in store.users.iter_mut() {
            if user.role_id == Some(id) {
                user.role_id = None;
            }
        }
        Ok(true)
    }

    async fn list_capabilities(&self) -> DbResult<Vec<Capability>> {
        let mut capabilities = self.store.lock().unwrap().capabilities.clone();
        capabilities.sort_by(|a, b| a.group.cmp(&b.group).then(a.id.cmp(&b.id)));
        Ok(capabilities)
    }

    async fn set_role_permissions(&self, role_id: i64, capability_ids: Vec<i64>) -> DbResult<()> {
        let mut store = self.store.lock().unwrap();
        store.permissions.retain(|(r, _)| *r != role_id);
        for capability_id in capability_ids {
            store.permissions.insert((role_id, capability_id));
        }
        Ok(())
    }

    async fn list_projects(&self) -> DbResult<Vec<Project>> {
        let store = self.store.lock().unwrap();
        Ok(store
            .projects
            .iter()
            .filter(|p| p.deleted_at.is_none())
            .cloned()
            .collect())
    }

    async fn get_project(&self, id: i64) -> DbResult<Option<Project>> {
        let store = self.store.lock().unwrap();
        Ok(store
            .projects
            .iter()
            .find(|p| p.id == id && p.deleted_at.is_none())
            .cloned())
    }

    async fn create_project(&self, draft: Draft, user_id: i64) -> DbResult<i64> {
        let id = self.add_project(&draft.name, user_id);
        let mut store = self.store.lock().unwrap();
        if let Some(project) = store.projects.iter_mut().find(|p| p.id == id) {
            project.description = draft.description;
        }
        Ok(id)
    }

    async fn update_project(&self, id: i64, draft: Draft) -> DbResult<bool> {
        let mut store = self.store.lock().unwrap();
        match store
            .projects
            .iter_mut()
            .find(|p| p.id == id && p.deleted_at.is_none())
        {
            Some(project) => {
                project.name = draft.name;
                project.description = draft.description;
                project.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn soft_delete_project(&self, id: i64) -> DbResult<bool> {
        let mut store = self.store.lock().unwrap();
        let now = Utc::now();
        match store
            .projects
            .iter_mut()
            .find(|p| p.id == id && p.deleted_at.is_none())
        {
            Some(project) => project.deleted_at = Some(now),
            None => return Ok(false),
        }

        let mut feature_ids = Vec::new();
        for feature in store.features.iter_mut() {
            if feature.project_id == id && feature.deleted_at.is_none() {
                feature.deleted_at = Some(now);
                feature_ids.push(feature.id);
            }
        }
        store.cascade_issues(&feature_ids);
        Ok(true)
    }

    async fn list_feature_summaries(&self) -> DbResult<Vec<FeatureSummary>> {
        let store = self.store.lock().unwrap();
        let live_count = |issues: &Vec<Issue>, feature_id: i64| {
            issues
                .iter()
                .filter(|i| i.feature_id == feature_id && i.deleted_at.is_none())
                .count() as i64
        };
        Ok(store
            .features
            .iter()
            .filter(|f| f.deleted_at.is_none())
            .map(|f| FeatureSummary {
                id: f.id,
                name: f.name.clone(),
                project_id: f.project_id,
                project_name: store.project_name(f.project_id).unwrap_or_default(),
                user_id: f.user_id,
                created_at: f.created_at,
                updated_at: f.updated_at,
                story_count: live_count(&store.stories, f.id),
                bug_count: live_count(&store.bugs, f.id),
            })
            .collect())
    }

    async fn features_for_project(&self, project_id: i64) -> DbResult<Vec<Feature>> {
        let store = self.store.lock().unwrap();
        Ok(store
            .features
            .iter()
            .filter(|f| f.project_id == project_id && f.deleted_at.is_none())
            .map(|f| store.with_project_name(f))
            .collect())
    }

    async fn get_feature(&self, id: i64) -> DbResult<Option<Feature>> {
        let store = self.store.lock().unwrap();
        Ok(store
            .features
            .iter()
            .find(|f| f.id == id)
            .map(|f| store.with_project_name(f)))
    }

    async fn create_feature(&self, project_id: i64, draft: Draft, user_id: i64) -> DbResult<i64> {
        let id = self.add_feature(project_id, &draft.name, user_id);
        let mut store = self.store.lock().unwrap();
        if let Some(feature) = store.features.iter_mut().find(|f| f.id == id) {
            feature.description = draft.description;
        }
        Ok(id)
    }

    async fn update_feature(&self, id: i64, draft: Draft) -> DbResult<bool> {
        let mut store = self.store.lock().unwrap();
        match store
            .features
            .iter_mut()
            .find(|f| f.id == id && f.deleted_at.is_none())
        {
            Some(feature) => {
                feature.name = draft.name;
                feature.description = draft.description;
                feature.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn soft_delete_feature(&self, id: i64) -> DbResult<bool> {
        let mut store = self.store.lock().unwrap();
        match store
            .features
            .iter_mut()
            .find(|f| f.id == id && f.deleted_at.is_none())
        {
            Some(feature) => feature.deleted_at = Some(Utc::now()),
            None => return Ok(false),
        }
        store.cascade_issues(&[id]);
        Ok(true)
    }

    async fn list_issues(&self, kind: IssueKind) -> DbResult<Vec<Issue>> {
        let store = self.store.lock().unwrap();
        Ok(store
            .issues(kind)
            .iter()
            .filter(|i| i.deleted_at.is_none())
            .map(|i| store.with_feature_name(i))
            .collect())
    }

    async fn issues_for_feature(&self, kind: IssueKind, feature_id: i64) -> DbResult<Vec<Issue>> {
        let store = self.store.lock().unwrap();
        Ok(store
            .issues(kind)
            .iter()
            .filter(|i| i.feature_id == feature_id && i.deleted_at.is_none())
            .map(|i| store.with_feature_name(i))
            .collect())
    }

    async fn get_issue(&self, kind: IssueKind, id: i64) -> DbResult<Option<Issue>> {
        let store = self.store.lock().unwrap();
        Ok(store
            .issues(kind)
            .iter()
            .find(|i| i.id == id && i.deleted_at.is_none())
            .map(|i| store.with_feature_name(i)))
    }

    async fn create_issue(
        &self,
        kind: IssueKind,
        feature_id: i64,
        draft: IssueDraft,
        user_id: i64,
    ) -> DbResult<i64> {
        let id = self.add_issue(kind, feature_id, &draft.name, user_id, draft.assignee_id);
        let mut store = self.store.lock().unwrap();
        if let Some(issue) = store.issues_mut(kind).iter_mut().find(|i| i.id == id) {
            issue.description = draft.description;
        }
        Ok(id)
    }

    async fn update_issue(&self, kind: IssueKind, id: i64, draft: IssueDraft) -> DbResult<bool> {
        let mut store = self.store.lock().unwrap();
        match store
            .issues_mut(kind)
            .iter_mut()
            .find(|i| i.id == id && i.deleted_at.is_none())
        {
            Some(issue) => {
                issue.name = draft.name;
                issue.description = draft.description;
                issue.assignee_id = draft.assignee_id;
                issue.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn soft_delete_issue(&self, kind: IssueKind, id: i64) -> DbResult<bool> {
        let mut store = self.store.lock().unwrap();
        match store
            .issues_mut(kind)
            .iter_mut()
            .find(|i| i.id == id && i.deleted_at.is_none())
        {
            Some(issue) => {
                issue.deleted_at = Some(Utc::now());
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

// --- STATE HELPERS ---

pub fn create_test_state(repo: Arc<MemoryRepo>) -> AppState {
    create_test_state_with(repo, AppConfig::default())
}

pub fn create_test_state_with(repo: Arc<MemoryRepo>, config: AppConfig) -> AppState {
    let views = Views::load(&config.templates_dir).expect("templates should load");
    AppState {
        repo,
        storage: Arc::new(MockStorageService::new()),
        views: Arc::new(views),
        config,
    }
}
