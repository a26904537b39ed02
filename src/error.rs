//! Error type shared by every handler.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),

    /// Logged in, but the role lacks a capability.
    #[error("Unauthorized")]
    Forbidden,

    /// Bad credentials.
    #[error("Unauthorized")]
    Unauthorized,

    #[error("{0}")]
    Validation(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("template error: {0}")]
    Template(#[from] handlebars::RenderError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("password hashing error: {0}")]
    Password(#[from] bcrypt::BcryptError),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn not_found(what: &str) -> Self {
        AppError::NotFound(format!("{} not found.", what))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Database(_)
            | AppError::Template(_)
            | AppError::Storage(_)
            | AppError::Password(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Internal details stay in the logs.
        let body = if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
            "Error".to_string()
        } else {
            self.to_string()
        };

        (status, body).into_response()
    }
}
