use axum::{
    Form,
    extract::{Multipart, Path, State},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::CookieJar;
use serde_json::json;

use super::{HtmlResult, Registration, create_account};
use crate::{
    AppState,
    auth::{AuthUser, expired_session_cookie, session_cookie, session_id, verify_password},
    error::{AppError, AppResult},
    models::LoginForm,
    views::Page,
};

/// Roles with a seeded `{role}_demo` account.
pub const DEMO_ROLES: [&str; 4] = ["admin", "manager", "qa", "developer"];

/// home
///
/// Landing page. Lists the demo logins when they are enabled.
pub async fn home(user: Option<AuthUser>, State(state): State<AppState>) -> HtmlResult {
    let demo_roles: &[&str] = if state.config.demo_logins { &DEMO_ROLES } else { &[] };
    let page = Page::new("Issue Tracker", json!({ "demo_roles": demo_roles }), user.as_ref());
    state.views.render("home", &page)
}

pub async fn show_login_form(
    user: Option<AuthUser>,
    State(state): State<AppState>,
) -> AppResult<Response> {
    if user.is_some() {
        return Ok(Redirect::to("/dashboard").into_response());
    }
    let page = Page::new("Login", json!({}), None);
    Ok(state.views.render("auth/login", &page)?.into_response())
}

/// login
///
/// Verifies the bcrypt hash, opens a fresh session and sets the cookie.
/// Unknown users and wrong passwords are indistinguishable (401).
pub async fn login(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> AppResult<Response> {
    let credentials = state
        .repo
        .find_credentials(form.username.trim())
        .await?
        .ok_or(AppError::Unauthorized)?;

    if !verify_password(&form.password, &credentials.password) {
        tracing::info!(username = %form.username, "login rejected");
        return Err(AppError::Unauthorized);
    }

    start_session(&state, credentials.id).await
}

pub async fn show_registration_form(
    user: Option<AuthUser>,
    State(state): State<AppState>,
) -> AppResult<Response> {
    if user.is_some() {
        return Ok(Redirect::to("/dashboard").into_response());
    }
    let page = Page::new("Register", json!({}), None);
    Ok(state.views.render("auth/register", &page)?.into_response())
}

/// register
///
/// Creates the account and logs the new user straight in.
pub async fn register(State(state): State<AppState>, multipart: Multipart) -> AppResult<Response> {
    let registration = Registration::from_multipart(multipart).await?;
    let user_id = create_account(&state, registration).await?;
    start_session(&state, user_id).await
}

/// logout
///
/// Drops the server-side session and expires the cookie.
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> AppResult<Response> {
    let Some(session) = session_id(&jar, &state.config) else {
        return Ok(Redirect::to("/login").into_response());
    };

    state.repo.delete_session(session).await?;

    Ok((expired_session_cookie(&state.config), Redirect::to("/")).into_response())
}

/// demo_login
///
/// Password-less login as one of the seeded demo accounts.
pub async fn demo_login(
    State(state): State<AppState>,
    Path(role): Path<String>,
) -> AppResult<Response> {
    if !state.config.demo_logins || !DEMO_ROLES.contains(&role.as_str()) {
        return Err(AppError::not_found("Demo account"));
    }

    let user = state
        .repo
        .find_user_by_username(&format!("{}_demo", role))
        .await?
        .ok_or_else(|| AppError::not_found("Demo account"))?;

    tracing::info!(user_id = user.id, role = %role, "demo login");
    start_session(&state, user.id).await
}

async fn start_session(state: &AppState, user_id: i64) -> AppResult<Response> {
    let session = state.repo.create_session(user_id).await?;
    tracing::info!(user_id, "session opened");

    Ok((session_cookie(&state.config, session), Redirect::to("/dashboard")).into_response())
}
