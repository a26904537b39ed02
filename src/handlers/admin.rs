use axum::{
    Form, Json,
    extract::{Path, State, rejection::JsonRejection},
    response::Redirect,
};
use serde_json::json;
use std::collections::{BTreeSet, HashMap};

use super::{HtmlResult, success, taken_or};
use crate::{
    AppState,
    auth::AuthUser,
    error::{AppError, AppResult},
    models::{
        Capability, CapabilityGroup, GrantedCapability, NameForm, PermissionsForm, Role,
        SetUserRoleRequest, StatusResponse, UserWithRole,
    },
    permissions::{ADMIN_ROLE_ID, caps},
    views::Page,
};

async fn find_role(state: &AppState, id: i64) -> AppResult<Role> {
    state
        .repo
        .get_role(id)
        .await?
        .ok_or_else(|| AppError::not_found("Role"))
}

/// Role names are unique. `except` is the role being renamed.
async fn ensure_role_name_free(state: &AppState, name: &str, except: Option<i64>) -> AppResult<()> {
    let taken = state
        .repo
        .list_roles()
        .await?
        .iter()
        .any(|r| r.name == name && Some(r.id) != except);
    if taken {
        return Err(AppError::Validation("NAME is already taken.".to_string()));
    }
    Ok(())
}

/// Groups capabilities in first-seen order, flagging the granted ones.
pub fn group_capabilities(
    capabilities: Vec<Capability>,
    granted: &BTreeSet<i64>,
) -> Vec<CapabilityGroup> {
    let mut groups: Vec<CapabilityGroup> = Vec::new();

    for capability in capabilities {
        let entry = GrantedCapability {
            granted: granted.contains(&capability.id),
            capability,
        };
        match groups
            .iter_mut()
            .find(|g| g.group == entry.capability.group)
        {
            Some(group) => group.capabilities.push(entry),
            None => groups.push(CapabilityGroup {
                group: entry.capability.group.clone(),
                capabilities: vec![entry],
            }),
        }
    }

    groups
}

pub async fn index(user: AuthUser, State(state): State<AppState>) -> HtmlResult {
    user.require_admin(caps::ADMIN)?;
    state
        .views
        .render("admin/index", &Page::new("Admin", json!({}), Some(&user)))
}

/// users
///
/// Every account, deleted ones included, with the role resolved.
pub async fn users(user: AuthUser, State(state): State<AppState>) -> HtmlResult {
    user.require_admin(caps::ADMIN_READ_USERS)?;

    let roles = state.repo.list_roles().await?;
    let by_id: HashMap<i64, &Role> = roles.iter().map(|r| (r.id, r)).collect();

    let users: Vec<UserWithRole> = state
        .repo
        .list_users()
        .await?
        .into_iter()
        .map(|u| UserWithRole {
            role: u.role_id.and_then(|id| by_id.get(&id).map(|r| (*r).clone())),
            user: u,
        })
        .collect();

    let data = json!({
        "users": users,
        "roles": roles,
        "can_create_users": user.can(&[caps::CREATE_USERS]),
        "can_delete_users": user.can(&[caps::DELETE_USERS]),
    });
    state
        .views
        .render("admin/users", &Page::new("Admin - Users", data, Some(&user)))
}

/// set_user_role
///
/// JSON endpoint behind the role select on the users page. An empty or zero
/// `role_id` clears the role.
pub async fn set_user_role(
    user: AuthUser,
    State(state): State<AppState>,
    payload: Result<Json<SetUserRoleRequest>, JsonRejection>,
) -> AppResult<Json<StatusResponse>> {
    user.require_admin(caps::ADMIN_UPDATE_USERS)?;

    let Json(request) = payload.map_err(|e| AppError::Validation(e.body_text()))?;

    let user_id = request
        .user_id
        .value()
        .ok_or_else(|| AppError::Validation("USER_ID is required.".to_string()))?;
    let role_id = request.role_id.value();

    if let Some(role_id) = role_id {
        find_role(&state, role_id).await?;
    }

    if !state.repo.set_user_role(user_id, role_id).await? {
        return Err(AppError::not_found("User"));
    }

    tracing::info!(user_id, ?role_id, by = user.id, "user role changed");
    Ok(success())
}

pub async fn roles(user: AuthUser, State(state): State<AppState>) -> HtmlResult {
    user.require_admin(caps::READ_ROLE)?;

    let roles = state.repo.list_roles().await?;
    let capabilities = state.repo.list_capabilities().await?;

    let data = json!({
        "roles": roles,
        "capabilities": capabilities,
        "can_create": user.is_admin || user.can(&[caps::CREATE_ROLE]),
    });
    state
        .views
        .render("admin/roles", &Page::new("Admin - Roles", data, Some(&user)))
}

pub async fn new_role(user: AuthUser, State(state): State<AppState>) -> HtmlResult {
    user.require_admin(caps::CREATE_ROLE)?;
    state
        .views
        .render("admin/role_create", &Page::new("New Role", json!({}), Some(&user)))
}

pub async fn store_role(
    user: AuthUser,
    State(state): State<AppState>,
    Form(form): Form<NameForm>,
) -> AppResult<Redirect> {
    user.require_admin(caps::CREATE_ROLE)?;

    let draft = form.into_draft()?;
    ensure_role_name_free(&state, &draft.name, None).await?;

    let id = state
        .repo
        .create_role(draft)
        .await
        .map_err(|e| taken_or("NAME", e))?;
    tracing::info!(role_id = id, "role created");

    Ok(Redirect::to("/admin/roles"))
}

/// show_role
///
/// The role with every capability, grouped, and the granted ones checked.
pub async fn show_role(
    user: AuthUser,
    State(state): State<AppState>,
    Path(role_id): Path<i64>,
) -> HtmlResult {
    user.require_admin(caps::READ_ROLE)?;

    let role = find_role(&state, role_id).await?;
    let granted: BTreeSet<i64> = state
        .repo
        .role_permissions(role_id)
        .await?
        .into_iter()
        .map(|c| c.id)
        .collect();
    let groups = group_capabilities(state.repo.list_capabilities().await?, &granted);

    let title = format!("Role - {}", role.name);
    let data = json!({
        "role": role,
        "groups": groups,
        "granted_count": granted.len(),
        "can_update_permissions": user.is_admin || user.can(&[caps::UPDATE_PERMISSIONS]),
        "can_update": user.is_admin || user.can(&[caps::UPDATE_ROLE]),
        "can_delete": role.id != ADMIN_ROLE_ID && (user.is_admin || user.can(&[caps::DELETE_ROLE])),
    });
    state.views.render("admin/role_show", &Page::new(title, data, Some(&user)))
}

pub async fn edit_role(
    user: AuthUser,
    State(state): State<AppState>,
    Path(role_id): Path<i64>,
) -> HtmlResult {
    user.require_admin(caps::UPDATE_ROLE)?;

    let role = find_role(&state, role_id).await?;
    let title = format!("Edit Role - {}", role.name);
    state
        .views
        .render("admin/role_edit", &Page::new(title, json!({ "role": role }), Some(&user)))
}

pub async fn update_role(
    user: AuthUser,
    State(state): State<AppState>,
    Path(role_id): Path<i64>,
    Form(form): Form<NameForm>,
) -> AppResult<Redirect> {
    user.require_admin(caps::UPDATE_ROLE)?;

    find_role(&state, role_id).await?;
    let draft = form.into_draft()?;
    ensure_role_name_free(&state, &draft.name, Some(role_id)).await?;

    let updated = state
        .repo
        .update_role(role_id, draft)
        .await
        .map_err(|e| taken_or("NAME", e))?;
    if !updated {
        return Err(AppError::not_found("Role"));
    }

    Ok(Redirect::to(&format!("/roles/{}", role_id)))
}

/// delete_role
///
/// Users holding the role are left without one. The admin role itself
/// cannot be deleted.
pub async fn delete_role(
    user: AuthUser,
    State(state): State<AppState>,
    Path(role_id): Path<i64>,
) -> AppResult<Json<StatusResponse>> {
    user.require_admin(caps::DELETE_ROLE)?;

    if role_id == ADMIN_ROLE_ID {
        return Err(AppError::Validation(
            "The admin role cannot be deleted.".to_string(),
        ));
    }

    if !state.repo.delete_role(role_id).await? {
        return Err(AppError::not_found("Role"));
    }

    Ok(success())
}

/// update_permissions
///
/// Replaces the role's capability set with the checked boxes. No boxes clears it;
/// an id that names no capability is rejected.
pub async fn update_permissions(
    user: AuthUser,
    State(state): State<AppState>,
    Path(role_id): Path<i64>,
    axum_extra::extract::Form(form): axum_extra::extract::Form<PermissionsForm>,
) -> AppResult<Redirect> {
    user.require_admin(caps::UPDATE_PERMISSIONS)?;

    find_role(&state, role_id).await?;

    let known: BTreeSet<i64> = state
        .repo
        .list_capabilities()
        .await?
        .into_iter()
        .map(|c| c.id)
        .collect();
    if let Some(unknown) = form.permissions.iter().find(|id| !known.contains(id)) {
        return Err(AppError::Validation(format!(
            "Capability {} does not exist.",
            unknown
        )));
    }

    let count = form.permissions.len();
    state
        .repo
        .set_role_permissions(role_id, form.permissions)
        .await?;
    tracing::info!(role_id, capabilities = count, "role permissions replaced");

    Ok(Redirect::to(&format!("/roles/{}", role_id)))
}
