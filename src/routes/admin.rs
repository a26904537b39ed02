use crate::{AppState, handlers::admin};
use axum::{
    Router,
    routing::{get, post},
};

/// Admin Router Module
///
/// Each handler checks `is_admin || can([capability])`, so a non-admin role
/// can be granted single panel pages.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(admin::index))
        .route("/users", get(admin::users))
        // JSON {user_id, role_id}; ids may be numbers or strings.
        .route("/setUserRole", post(admin::set_user_role))
        .route("/roles", get(admin::roles))
        .route("/roles/new", get(admin::new_role))
        // Repeated `permissions` fields, one per checked capability.
        .route("/permissions/{role_id}", post(admin::update_permissions))
}
