use axum::{
    Form, Json,
    extract::{Path, State},
    response::Redirect,
};
use serde_json::json;

use super::{HtmlResult, issues::readable, success};
use crate::{
    AppState,
    auth::AuthUser,
    error::{AppError, AppResult},
    models::{Feature, IssueKind, NameForm, StatusResponse},
    permissions::caps,
    views::Page,
};

/// Feature by id, soft-deleted ones included.
pub(crate) async fn find_feature(state: &AppState, id: i64) -> AppResult<Feature> {
    state
        .repo
        .get_feature(id)
        .await?
        .ok_or_else(|| AppError::not_found("Feature"))
}

async fn find_live_feature(state: &AppState, id: i64) -> AppResult<Feature> {
    let feature = find_feature(state, id).await?;
    if feature.deleted_at.is_some() {
        return Err(AppError::not_found("Feature"));
    }
    Ok(feature)
}

/// all
///
/// Every live feature, with its project name and live story/bug counts.
pub async fn all(user: AuthUser, State(state): State<AppState>) -> HtmlResult {
    user.require(&[caps::READ_FEATURES])?;

    let features = state.repo.list_feature_summaries().await?;
    let data = json!({ "features": features });
    state.views.render("features/all", &Page::new("Features", data, Some(&user)))
}

pub async fn index(
    user: AuthUser,
    State(state): State<AppState>,
    Path(project_id): Path<i64>,
) -> HtmlResult {
    user.require(&[caps::READ_FEATURES])?;

    let project = state
        .repo
        .get_project(project_id)
        .await?
        .ok_or_else(|| AppError::not_found("Project"))?;
    let features = state.repo.features_for_project(project_id).await?;

    let title = format!("{} - Features", project.name);
    let data = json!({
        "project": project,
        "features": features,
        "can_create": user.can(&[caps::CREATE_FEATURES]),
    });
    state.views.render("features/index", &Page::new(title, data, Some(&user)))
}

pub async fn create(
    user: AuthUser,
    State(state): State<AppState>,
    Path(project_id): Path<i64>,
) -> HtmlResult {
    user.require(&[caps::CREATE_FEATURES])?;

    let project = state
        .repo
        .get_project(project_id)
        .await?
        .ok_or_else(|| AppError::not_found("Project"))?;

    let title = format!("Create {} Feature", project.name);
    state
        .views
        .render("features/create", &Page::new(title, json!({ "project": project }), Some(&user)))
}

pub async fn store(
    user: AuthUser,
    State(state): State<AppState>,
    Path(project_id): Path<i64>,
    Form(form): Form<NameForm>,
) -> AppResult<Redirect> {
    user.require(&[caps::CREATE_FEATURES])?;

    if state.repo.get_project(project_id).await?.is_none() {
        return Err(AppError::not_found("Project"));
    }

    let id = state
        .repo
        .create_feature(project_id, form.into_draft()?, user.id)
        .await?;
    tracing::info!(feature_id = id, project_id, "feature created");

    Ok(Redirect::to(&format!("/projects/{}", project_id)))
}

/// show
///
/// A feature with its live stories and bugs. Soft-deleted features still
/// render, flagged in the title.
pub async fn show(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> HtmlResult {
    user.require(&[caps::READ_FEATURES])?;

    let feature = find_feature(&state, id).await?;

    let stories = state.repo.issues_for_feature(IssueKind::Story, id).await?;
    let bugs = state.repo.issues_for_feature(IssueKind::Bug, id).await?;

    let mut title = format!("Feature - {}", feature.name);
    if feature.deleted_at.is_some() {
        title.push_str(" (deleted)");
    }

    let data = json!({
        "deleted": feature.deleted_at.is_some(),
        "feature": feature,
        "stories": readable(&user, IssueKind::Story, stories),
        "bugs": readable(&user, IssueKind::Bug, bugs),
        "can_update": user.can(&[caps::UPDATE_FEATURES]),
        "can_delete": user.can(&[caps::DELETE_FEATURES]),
        "can_create_stories": user.can(&[IssueKind::Story.create()]),
        "can_create_bugs": user.can(&[IssueKind::Bug.create()]),
    });
    state.views.render("features/show", &Page::new(title, data, Some(&user)))
}

pub async fn edit(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> HtmlResult {
    user.require(&[caps::UPDATE_FEATURES])?;

    let feature = find_live_feature(&state, id).await?;
    let data = json!({ "feature": feature });
    state.views.render("features/edit", &Page::new("Edit Feature", data, Some(&user)))
}

pub async fn update(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Form(form): Form<NameForm>,
) -> AppResult<Redirect> {
    user.require(&[caps::UPDATE_FEATURES])?;

    let feature = find_live_feature(&state, id).await?;
    if !state.repo.update_feature(id, form.into_draft()?).await? {
        return Err(AppError::not_found("Feature"));
    }

    Ok(Redirect::to(&format!("/projects/{}/features", feature.project_id)))
}

/// destroy
///
/// Soft-deletes the feature along with its stories and bugs.
pub async fn destroy(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<StatusResponse>> {
    user.require(&[caps::DELETE_FEATURES])?;

    if !state.repo.soft_delete_feature(id).await? {
        return Err(AppError::not_found("Feature"));
    }

    Ok(success())
}
