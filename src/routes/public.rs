use crate::{AppState, handlers::auth};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Pages that adapt to an optional session. The login and registration forms
/// bounce logged-in users to `/dashboard`.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // Liveness probe for load balancers.
        .route("/health", get(|| async { "ok" }))
        .route("/", get(auth::home))
        .route("/login", get(auth::show_login_form))
        .route("/login-user", post(auth::login))
        .route("/register", get(auth::show_registration_form))
        // Multipart: name, username, email, password, optional `pic`.
        .route("/register-user", post(auth::register))
        .route("/logout", get(auth::logout))
        // Disabled unless DEMO_LOGINS is on.
        .route("/demo/{role}", get(auth::demo_login))
}
