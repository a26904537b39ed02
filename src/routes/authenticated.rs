use crate::{
    AppState,
    handlers::{
        admin, features,
        issues::{self, Bug, Story},
        projects, users,
    },
};
use axum::{
    Router,
    routing::{get, post},
};

/// Authenticated Router Module
///
/// Every route here sits behind the session middleware. Handlers receive the
/// resolved `AuthUser` and run their own capability checks. DELETE endpoints
/// answer JSON; everything else renders HTML or redirects.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        .route("/dashboard", get(users::dashboard))
        // --- Projects ---
        .route("/projects", get(projects::index).post(projects::store))
        .route("/projects/new", get(projects::create))
        .route("/projects/{id}", get(projects::show).delete(projects::destroy))
        .route("/projects/{id}/edit", get(projects::edit))
        .route("/projects/{id}/update", post(projects::update))
        // --- Features ---
        // Sibling routes share the `{id}` parameter name; the router rejects
        // differently named parameters at the same position.
        .route("/features", get(features::all))
        .route(
            "/projects/{id}/features",
            get(features::index).post(features::store),
        )
        .route("/projects/{id}/features/new", get(features::create))
        .route("/features/{id}", get(features::show).delete(features::destroy))
        .route("/features/{id}/edit", get(features::edit))
        .route("/features/{id}/update", post(features::update))
        // --- Stories ---
        .route("/stories", get(issues::all::<Story>))
        .route(
            "/features/{id}/stories",
            get(issues::index::<Story>).post(issues::store::<Story>),
        )
        .route("/features/{id}/stories/new", get(issues::create::<Story>))
        .route(
            "/stories/{id}",
            get(issues::show::<Story>).delete(issues::destroy::<Story>),
        )
        .route("/stories/{id}/edit", get(issues::edit::<Story>))
        .route("/stories/{id}/update", post(issues::update::<Story>))
        // --- Bugs ---
        .route("/bugs", get(issues::all::<Bug>))
        .route(
            "/features/{id}/bugs",
            get(issues::index::<Bug>).post(issues::store::<Bug>),
        )
        .route("/features/{id}/bugs/new", get(issues::create::<Bug>))
        .route(
            "/bugs/{id}",
            get(issues::show::<Bug>).delete(issues::destroy::<Bug>),
        )
        .route("/bugs/{id}/edit", get(issues::edit::<Bug>))
        .route("/bugs/{id}/update", post(issues::update::<Bug>))
        // --- Users ---
        // Multipart, same fields as registration.
        .route("/users", post(users::store))
        .route("/users/{id}", get(users::show).delete(users::destroy))
        .route("/users/{id}/projects", get(users::projects))
        .route("/users/{id}/features", get(users::features))
        .route("/users/{id}/stories", get(users::issues::<Story>))
        .route("/users/{id}/bugs", get(users::issues::<Bug>))
        // --- Roles ---
        // Role pages live outside /admin but are still admin-gated.
        .route("/roles", post(admin::store_role))
        .route(
            "/roles/{role_id}",
            get(admin::show_role).delete(admin::delete_role),
        )
        .route("/roles/{role_id}/edit", get(admin::edit_role))
        .route("/roles/{role_id}/update", post(admin::update_role))
}
