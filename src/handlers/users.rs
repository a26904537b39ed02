use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    response::Redirect,
};
use serde_json::json;

use super::{HtmlResult, Registration, create_account, issues::IssueType, success};
use crate::{
    AppState,
    auth::AuthUser,
    error::{AppError, AppResult},
    models::{DeleteUserQuery, IssueKind, StatusResponse, User},
    permissions::caps,
    views::Page,
};

async fn find_user(state: &AppState, id: i64) -> AppResult<User> {
    state
        .repo
        .get_user(id)
        .await?
        .ok_or_else(|| AppError::not_found("User"))
}

/// dashboard
///
/// Landing page after login: what is currently assigned to me.
pub async fn dashboard(user: AuthUser, State(state): State<AppState>) -> HtmlResult {
    let stories = if user.can(&[IssueKind::Story.read_mine()]) {
        state.repo.issues_assigned_to(IssueKind::Story, user.id).await?
    } else {
        Vec::new()
    };
    let bugs = if user.can(&[IssueKind::Bug.read_mine()]) {
        state.repo.issues_assigned_to(IssueKind::Bug, user.id).await?
    } else {
        Vec::new()
    };

    let data = json!({
        "stories": stories,
        "bugs": bugs,
        "has_role": user.role_id.is_some(),
    });
    state
        .views
        .render("users/dashboard", &Page::new("Dashboard", data, Some(&user)))
}

/// store
///
/// Account creation from the admin panel. Unlike registration, the creator
/// stays logged in as themselves.
pub async fn store(
    user: AuthUser,
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<Redirect> {
    user.require(&[caps::CREATE_USERS])?;

    let registration = Registration::from_multipart(multipart).await?;
    let id = create_account(&state, registration).await?;

    Ok(Redirect::to(&format!("/users/{}", id)))
}

pub async fn show(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> HtmlResult {
    user.require(&[caps::READ_USERS])?;

    let profile = find_user(&state, id).await?;
    let title = format!("User - {}", profile.name);
    let data = json!({
        "deleted": profile.deleted_at.is_some(),
        "profile": profile,
        "can_delete": user.can(&[caps::DELETE_USERS]),
    });
    state.views.render("users/show", &Page::new(title, data, Some(&user)))
}

pub async fn projects(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> HtmlResult {
    user.require(&[caps::READ_USERS, caps::READ_PROJECTS_MINE])?;

    let profile = find_user(&state, id).await?;
    let projects = state.repo.projects_for_user(id).await?;

    let title = format!("{} - Projects", profile.name);
    let data = json!({ "profile": profile, "projects": projects });
    state.views.render("users/projects", &Page::new(title, data, Some(&user)))
}

/// features
///
/// Features the user is involved in through an assigned story or bug.
pub async fn features(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> HtmlResult {
    user.require(&[caps::READ_FEATURES])?;

    let profile = find_user(&state, id).await?;
    let features = state.repo.features_assigned_to(id).await?;

    let title = format!("{} - Features", profile.name);
    let data = json!({ "profile": profile, "features": features });
    state.views.render("users/features", &Page::new(title, data, Some(&user)))
}

/// issues
///
/// Stories or bugs assigned to the user (`/users/{id}/stories`, `/users/{id}/bugs`).
pub async fn issues<K: IssueType>(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> HtmlResult {
    let kind = K::KIND;
    user.require(&[kind.read_mine()])?;

    let profile = find_user(&state, id).await?;
    let issues = state.repo.issues_assigned_to(kind, id).await?;

    let title = format!("{} - {}", profile.name, kind.label_plural());
    let data = json!({
        "kind": { "plural": kind.plural(), "label_plural": kind.label_plural() },
        "profile": profile,
        "issues": issues,
    });
    state.views.render("users/issues", &Page::new(title, data, Some(&user)))
}

/// destroy
///
/// Soft delete by default, `?mode=hard` removes the row. Either way the user's
/// assignments are cleared and their sessions dropped.
pub async fn destroy(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<DeleteUserQuery>,
) -> AppResult<Json<StatusResponse>> {
    user.require(&[caps::DELETE_USERS])?;

    let hard = query.is_hard();
    if !state.repo.delete_user(id, hard).await? {
        return Err(AppError::not_found("User"));
    }

    tracing::info!(user_id = id, hard, by = user.id, "user deleted");
    Ok(success())
}
