use axum::{
    Form, Json,
    extract::{Path, State},
    response::Redirect,
};
use serde_json::json;

use super::{HtmlResult, success};
use crate::{
    AppState,
    auth::AuthUser,
    error::{AppError, AppResult},
    models::{NameForm, Project, StatusResponse},
    permissions::{Scope, caps},
    views::Page,
};

async fn find_project(state: &AppState, id: i64) -> AppResult<Project> {
    state
        .repo
        .get_project(id)
        .await?
        .ok_or_else(|| AppError::not_found("Project"))
}

/// index
///
/// Projects the user may read: their own with `read_projects_mine`, everyone
/// else's with `read_projects_others`.
pub async fn index(user: AuthUser, State(state): State<AppState>) -> HtmlResult {
    let can_mine = user.can(&[caps::READ_PROJECTS_MINE]);
    let can_others = user.can(&[caps::READ_PROJECTS_OTHERS]);
    if !can_mine && !can_others {
        return Err(AppError::Forbidden);
    }

    let projects: Vec<Project> = state
        .repo
        .list_projects()
        .await?
        .into_iter()
        .filter(|p| match Scope::of(&[p.user_id], user.id) {
            Scope::Mine => can_mine,
            Scope::Others => can_others,
        })
        .collect();

    let data = json!({
        "projects": projects,
        "can_create": user.can(&[caps::CREATE_PROJECTS]),
    });
    state.views.render("projects/index", &Page::new("Projects", data, Some(&user)))
}

pub async fn create(user: AuthUser, State(state): State<AppState>) -> HtmlResult {
    user.require(&[caps::CREATE_PROJECTS])?;
    state
        .views
        .render("projects/create", &Page::new("New Project", json!({}), Some(&user)))
}

pub async fn store(
    user: AuthUser,
    State(state): State<AppState>,
    Form(form): Form<NameForm>,
) -> AppResult<Redirect> {
    user.require(&[caps::CREATE_PROJECTS])?;

    let id = state.repo.create_project(form.into_draft()?, user.id).await?;
    tracing::info!(project_id = id, user_id = user.id, "project created");

    Ok(Redirect::to("/projects"))
}

/// show
///
/// A project with its live features.
pub async fn show(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> HtmlResult {
    let project = find_project(&state, id).await?;
    let owners = [project.user_id];
    user.require_on(&owners, caps::READ_PROJECTS_MINE, caps::READ_PROJECTS_OTHERS)?;

    let features = state.repo.features_for_project(id).await?;

    let data = json!({
        "can_update": user.permissions.can_on(
            &owners, user.id, caps::UPDATE_PROJECTS_MINE, caps::UPDATE_PROJECTS_OTHERS),
        "can_delete": user.permissions.can_on(
            &owners, user.id, caps::DELETE_PROJECTS_MINE, caps::DELETE_PROJECTS_OTHERS),
        "can_create_features": user.can(&[caps::CREATE_FEATURES]),
        "project": project,
        "features": features,
    });
    let title = format!("Project - {}", project.name);
    state.views.render("projects/show", &Page::new(title, data, Some(&user)))
}

pub async fn edit(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> HtmlResult {
    let project = find_project(&state, id).await?;
    user.require_on(
        &[project.user_id],
        caps::UPDATE_PROJECTS_MINE,
        caps::UPDATE_PROJECTS_OTHERS,
    )?;

    let title = format!("Edit Project - {}", project.name);
    let data = json!({ "project": project });
    state.views.render("projects/edit", &Page::new(title, data, Some(&user)))
}

pub async fn update(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Form(form): Form<NameForm>,
) -> AppResult<Redirect> {
    let project = find_project(&state, id).await?;
    user.require_on(
        &[project.user_id],
        caps::UPDATE_PROJECTS_MINE,
        caps::UPDATE_PROJECTS_OTHERS,
    )?;

    if !state.repo.update_project(id, form.into_draft()?).await? {
        return Err(AppError::not_found("Project"));
    }

    Ok(Redirect::to(&format!("/projects/{}", id)))
}

/// destroy
///
/// Soft-deletes the project together with its features, stories and bugs.
pub async fn destroy(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<StatusResponse>> {
    let project = find_project(&state, id).await?;
    user.require_on(
        &[project.user_id],
        caps::DELETE_PROJECTS_MINE,
        caps::DELETE_PROJECTS_OTHERS,
    )?;

    if !state.repo.soft_delete_project(id).await? {
        return Err(AppError::not_found("Project"));
    }

    Ok(success())
}
