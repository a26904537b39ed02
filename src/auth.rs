use axum::{
    extract::{FromRef, FromRequestParts, OptionalFromRequestParts},
    http::{header, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::CookieJar;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    config::AppConfig,
    error::{AppError, AppResult},
    models::User,
    permissions::{ADMIN_ROLE_ID, Permissions},
    repository::RepositoryState,
};

/// AuthUser
///
/// The resolved identity of a logged-in request: the user row plus the
/// capability set of their role. Built once per request by the extractor and
/// handed to templates as `auth_user`.
#[derive(Debug, Clone, Serialize, Default)]
pub struct AuthUser {
    pub id: i64,
    pub name: String,
    pub username: String,
    pub email: String,
    pub photo_url: Option<String>,
    pub role_id: Option<i64>,
    pub is_admin: bool,
    pub permissions: Permissions,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login: DateTime<Utc>,
}

impl AuthUser {
    pub fn new(user: User, permissions: Permissions) -> Self {
        Self {
            is_admin: user.role_id == Some(ADMIN_ROLE_ID),
            id: user.id,
            name: user.name,
            username: user.username,
            email: user.email,
            photo_url: user.photo_url,
            role_id: user.role_id,
            permissions,
            created_at: user.created_at,
            updated_at: user.updated_at,
            last_login: user.last_login,
        }
    }

    /// A user without a role can do nothing, not even pass an empty check.
    pub fn can(&self, capabilities: &[&str]) -> bool {
        self.role_id.is_some() && self.permissions.can(capabilities)
    }

    /// Forbidden unless every capability is held.
    pub fn require(&self, capabilities: &[&str]) -> AppResult<()> {
        if self.can(capabilities) {
            Ok(())
        } else {
            tracing::warn!(user_id = self.id, ?capabilities, "capability check failed");
            Err(AppError::Forbidden)
        }
    }

    /// Ownership-scoped variant of `require`.
    pub fn require_on(&self, owners: &[Option<i64>], mine: &str, others: &str) -> AppResult<()> {
        if self.role_id.is_some() && self.permissions.can_on(owners, self.id, mine, others) {
            Ok(())
        } else {
            tracing::warn!(user_id = self.id, mine, others, "ownership check failed");
            Err(AppError::Forbidden)
        }
    }

    /// Admin-panel checks: the admin role passes regardless of its set.
    pub fn require_admin(&self, capability: &str) -> AppResult<()> {
        if self.is_admin {
            return Ok(());
        }
        self.require(&[capability])
    }
}

/// Reads the session cookie and resolves it to a user. `Ok(None)` covers every
/// "not logged in" case: no cookie, garbage cookie, expired or unknown session,
/// deleted user.
async fn resolve_session<S>(parts: &Parts, state: &S) -> AppResult<Option<AuthUser>>
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    // Already resolved by the session middleware.
    if let Some(user) = parts.extensions.get::<AuthUser>() {
        return Ok(Some(user.clone()));
    }

    let config = AppConfig::from_ref(state);

    let Some(session) = session_id(&CookieJar::from_headers(&parts.headers), &config) else {
        return Ok(None);
    };

    let repo = RepositoryState::from_ref(state);
    let Some(user) = repo
        .find_session_user(session, config.session_ttl_secs)
        .await?
    else {
        return Ok(None);
    };

    let permissions = match user.role_id {
        Some(role_id) => repo.role_permissions(role_id).await?.into_iter().collect(),
        None => Permissions::new(),
    };

    Ok(Some(AuthUser::new(user, permissions)))
}

/// AuthUser Extractor Implementation
///
/// Guarded handlers take `AuthUser` directly. Any failure to resolve a session
/// redirects the browser to `/login`; database failures surface as 500.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match resolve_session(parts, state).await {
            Ok(Some(user)) => Ok(user),
            Ok(None) => Err(Redirect::to("/login").into_response()),
            Err(e) => Err(e.into_response()),
        }
    }
}

/// Public pages take `Option<AuthUser>` to adapt to the visitor.
impl<S> OptionalFromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        resolve_session(parts, state)
            .await
            .map_err(IntoResponse::into_response)
    }
}

/// Session uuid carried by the request, if any.
pub fn session_id(jar: &CookieJar, config: &AppConfig) -> Option<Uuid> {
    jar.get(&config.session_cookie)
        .and_then(|cookie| Uuid::parse_str(cookie.value()).ok())
}

/// `Set-Cookie` header opening a session.
pub fn session_cookie(config: &AppConfig, session: Uuid) -> [(header::HeaderName, String); 1] {
    [(
        header::SET_COOKIE,
        cookie_value(config, &session.to_string(), config.session_ttl_secs),
    )]
}

/// `Set-Cookie` header that makes the browser drop the session cookie.
pub fn expired_session_cookie(config: &AppConfig) -> [(header::HeaderName, String); 1] {
    [(header::SET_COOKIE, cookie_value(config, "", 0))]
}

fn cookie_value(config: &AppConfig, value: &str, max_age: i64) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        config.session_cookie, value, max_age
    );
    if config.secure_cookies {
        cookie.push_str("; Secure");
    }
    cookie
}

pub fn hash_password(password: &str, cost: u32) -> AppResult<String> {
    Ok(bcrypt::hash(password, cost)?)
}

/// A malformed stored hash counts as a mismatch.
pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}
