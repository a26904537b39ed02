//! Route tables, split by who may reach them. The authenticated and admin
//! tables are wrapped by the session middleware in `create_router`; finer
//! capability checks happen inside each handler.

/// Reachable without a session: landing, login, registration, demo logins.
pub mod public;

/// Everything behind the session cookie.
pub mod authenticated;

/// The admin panel, nested under `/admin`.
pub mod admin;
