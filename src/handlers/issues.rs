//! Stories and bugs. Both kinds share one set of handlers, instantiated per
//! kind through the `IssueType` markers (`issues::show::<Story>`).

use axum::{
    Form, Json,
    extract::{Path, State},
    response::Redirect,
};
use serde_json::{Value, json};
use std::collections::HashMap;

use super::{HtmlResult, features::find_feature, success};
use crate::{
    AppState,
    auth::AuthUser,
    error::{AppError, AppResult},
    models::{Issue, IssueDraft, IssueForm, IssueKind, IssueView, StatusResponse, User},
    permissions::Scope,
    views::Page,
};

pub trait IssueType: Send + Sync + 'static {
    const KIND: IssueKind;
}

pub struct Story;
pub struct Bug;

impl IssueType for Story {
    const KIND: IssueKind = IssueKind::Story;
}

impl IssueType for Bug {
    const KIND: IssueKind = IssueKind::Bug;
}

/// Keeps the issues the user may read, given ownership.
pub fn readable(user: &AuthUser, kind: IssueKind, issues: Vec<Issue>) -> Vec<Issue> {
    issues
        .into_iter()
        .filter(|issue| {
            let cap = Scope::of(&issue.owners(), user.id).pick(kind.read_mine(), kind.read_others());
            user.can(&[cap])
        })
        .collect()
}

fn require_any_read(user: &AuthUser, kind: IssueKind) -> AppResult<()> {
    if user.can(&[kind.read_mine()]) || user.can(&[kind.read_others()]) {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

/// Names a template needs to talk about the kind.
fn kind_json(kind: IssueKind) -> Value {
    json!({
        "singular": kind.singular(),
        "plural": kind.plural(),
        "label": kind.label(),
        "label_plural": kind.label_plural(),
        "create_verb": kind.create_verb(),
    })
}

/// Attaches creator and assignee to each issue. Deleted users still resolve
/// so old issues keep their history.
async fn with_people(state: &AppState, issues: Vec<Issue>) -> AppResult<Vec<IssueView>> {
    let users: HashMap<i64, User> = state
        .repo
        .list_users()
        .await?
        .into_iter()
        .map(|u| (u.id, u))
        .collect();

    let lookup = |id: Option<i64>| id.and_then(|id| users.get(&id).cloned());

    Ok(issues
        .into_iter()
        .map(|issue| IssueView {
            creator: lookup(issue.user_id),
            assignee: lookup(issue.assignee_id),
            issue,
        })
        .collect())
}

async fn find_issue(state: &AppState, kind: IssueKind, id: i64) -> AppResult<Issue> {
    state
        .repo
        .get_issue(kind, id)
        .await?
        .ok_or_else(|| AppError::not_found(kind.label()))
}

/// Rejects assignees that do not exist or have been deleted.
async fn validate_assignee(state: &AppState, draft: &IssueDraft) -> AppResult<()> {
    let Some(assignee_id) = draft.assignee_id else {
        return Ok(());
    };
    match state.repo.get_user(assignee_id).await? {
        Some(user) if user.deleted_at.is_none() => Ok(()),
        _ => Err(AppError::Validation("ASSIGNEE does not exist.".to_string())),
    }
}

/// all
///
/// Every live issue of the kind the user may read.
pub async fn all<K: IssueType>(user: AuthUser, State(state): State<AppState>) -> HtmlResult {
    let kind = K::KIND;
    require_any_read(&user, kind)?;

    let issues = readable(&user, kind, state.repo.list_issues(kind).await?);
    let data = json!({
        "kind": kind_json(kind),
        "issues": with_people(&state, issues).await?,
    });
    state
        .views
        .render("issues/all", &Page::new(kind.label_plural(), data, Some(&user)))
}

/// index
///
/// Issues of one feature. A soft-deleted feature gets the deleted notice
/// instead of a listing.
pub async fn index<K: IssueType>(
    user: AuthUser,
    State(state): State<AppState>,
    Path(feature_id): Path<i64>,
) -> HtmlResult {
    let kind = K::KIND;
    require_any_read(&user, kind)?;

    let feature = find_feature(&state, feature_id).await?;
    if feature.deleted_at.is_some() {
        return state
            .views
            .deleted_entity("This feature has been deleted.", Some(&user));
    }

    let issues = readable(
        &user,
        kind,
        state.repo.issues_for_feature(kind, feature_id).await?,
    );

    let title = format!("{} - {}", feature.name, kind.label_plural());
    let data = json!({
        "kind": kind_json(kind),
        "feature": feature,
        "issues": with_people(&state, issues).await?,
        "can_create": user.can(&[kind.create()]),
    });
    state.views.render("issues/index", &Page::new(title, data, Some(&user)))
}

pub async fn create<K: IssueType>(
    user: AuthUser,
    State(state): State<AppState>,
    Path(feature_id): Path<i64>,
) -> HtmlResult {
    let kind = K::KIND;
    user.require(&[kind.create()])?;

    let feature = find_feature(&state, feature_id).await?;
    if feature.deleted_at.is_some() {
        return state
            .views
            .deleted_entity("This feature has been deleted.", Some(&user));
    }

    let users = state.repo.list_active_users().await?;
    let title = format!("{} a {}", kind.create_verb(), kind.label());
    let data = json!({
        "kind": kind_json(kind),
        "feature": feature,
        "users": users,
    });
    state.views.render("issues/create", &Page::new(title, data, Some(&user)))
}

pub async fn store<K: IssueType>(
    user: AuthUser,
    State(state): State<AppState>,
    Path(feature_id): Path<i64>,
    Form(form): Form<IssueForm>,
) -> AppResult<Redirect> {
    let kind = K::KIND;
    user.require(&[kind.create()])?;

    let feature = find_feature(&state, feature_id).await?;
    if feature.deleted_at.is_some() {
        return Err(AppError::not_found("Feature"));
    }

    let draft = form.into_draft()?;
    validate_assignee(&state, &draft).await?;

    let id = state
        .repo
        .create_issue(kind, feature_id, draft, user.id)
        .await?;
    tracing::info!(kind = kind.singular(), id, feature_id, "issue created");

    Ok(Redirect::to(&format!("/features/{}", feature_id)))
}

pub async fn show<K: IssueType>(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> HtmlResult {
    let kind = K::KIND;
    let issue = find_issue(&state, kind, id).await?;
    let owners = issue.owners();
    user.require_on(&owners, kind.read_mine(), kind.read_others())?;

    let title = format!("{} - {}", kind.label(), issue.name);
    let can_update = user
        .permissions
        .can_on(&owners, user.id, kind.update_mine(), kind.update_others());
    let can_delete = user
        .permissions
        .can_on(&owners, user.id, kind.delete_mine(), kind.delete_others());

    let view = with_people(&state, vec![issue])
        .await?
        .pop()
        .ok_or_else(|| AppError::not_found(kind.label()))?;

    let data = json!({
        "kind": kind_json(kind),
        "issue": view,
        "can_update": can_update,
        "can_delete": can_delete,
    });
    state.views.render("issues/show", &Page::new(title, data, Some(&user)))
}

pub async fn edit<K: IssueType>(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> HtmlResult {
    let kind = K::KIND;
    let issue = find_issue(&state, kind, id).await?;
    user.require_on(&issue.owners(), kind.update_mine(), kind.update_others())?;

    let users = state.repo.list_active_users().await?;
    let title = format!("Edit {} - {}", kind.label(), issue.name);
    let data = json!({
        "kind": kind_json(kind),
        "issue": issue,
        "users": users,
    });
    state.views.render("issues/edit", &Page::new(title, data, Some(&user)))
}

pub async fn update<K: IssueType>(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Form(form): Form<IssueForm>,
) -> AppResult<Redirect> {
    let kind = K::KIND;
    let issue = find_issue(&state, kind, id).await?;
    user.require_on(&issue.owners(), kind.update_mine(), kind.update_others())?;

    let draft = form.into_draft()?;
    validate_assignee(&state, &draft).await?;

    if !state.repo.update_issue(kind, id, draft).await? {
        return Err(AppError::not_found(kind.label()));
    }

    Ok(Redirect::to(&format!("/{}/{}", kind.plural(), id)))
}

pub async fn destroy<K: IssueType>(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<StatusResponse>> {
    let kind = K::KIND;
    let issue = find_issue(&state, kind, id).await?;
    user.require_on(&issue.owners(), kind.delete_mine(), kind.delete_others())?;

    if !state.repo.soft_delete_issue(kind, id).await? {
        return Err(AppError::not_found(kind.label()));
    }

    Ok(success())
}
