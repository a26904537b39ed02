//! HTTP handlers, one module per resource. Every handler follows the same
//! shape: resolve the user, check capabilities, hit the repository, render.

use axum::{Json, extract::Multipart, response::Html};
use std::collections::HashMap;

use crate::{
    AppState,
    auth::hash_password,
    error::{AppError, AppResult},
    models::{NewUser, StatusResponse, required},
};

pub mod admin;
pub mod auth;
pub mod features;
pub mod issues;
pub mod projects;
pub mod users;

pub type HtmlResult = AppResult<Html<String>>;

/// JSON body returned by the DELETE endpoints and `setUserRole`.
pub fn success() -> Json<StatusResponse> {
    Json(StatusResponse::success())
}

/// Upload
///
/// A file part of a multipart form, fully buffered.
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Registration
///
/// Multipart payload shared by self-registration and admin user creation.
/// `pic` is optional; every text field is mandatory.
#[derive(Debug, Clone)]
pub struct Registration {
    pub name: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub photo: Option<Upload>,
}

impl Registration {
    pub async fn from_multipart(mut multipart: Multipart) -> AppResult<Self> {
        let mut fields: HashMap<String, String> = HashMap::new();
        let mut photo = None;

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::Validation(e.body_text()))?
        {
            let Some(name) = field.name().map(str::to_owned) else {
                continue;
            };

            if name == "pic" {
                let filename = field.file_name().unwrap_or_default().to_owned();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(e.body_text()))?;

                // Browsers send an empty part when no file was picked.
                if !filename.is_empty() && !bytes.is_empty() {
                    photo = Some(Upload {
                        filename,
                        bytes: bytes.to_vec(),
                    });
                }
                continue;
            }

            let text = field
                .text()
                .await
                .map_err(|e| AppError::Validation(e.body_text()))?;
            fields.insert(name, text);
        }

        let field = |key: &str| fields.get(key).map(String::as_str).unwrap_or_default();

        Ok(Self {
            name: required("NAME", field("name"))?,
            username: required("USERNAME", field("username"))?,
            email: required("EMAIL", field("email"))?,
            // Passwords are taken verbatim; only emptiness is rejected.
            password: match field("password") {
                "" => return Err(AppError::Validation("PASSWORD is required.".to_string())),
                p => p.to_string(),
            },
            photo,
        })
    }
}

/// Hashes the password, stores the optional photo and inserts the user. A
/// photo stored for an insert that fails is removed again.
pub async fn create_account(state: &AppState, registration: Registration) -> AppResult<i64> {
    let password_hash = hash_password(&registration.password, state.config.bcrypt_cost)?;

    let photo_url = match &registration.photo {
        Some(upload) => Some(
            state
                .storage
                .save_user_photo(&upload.filename, &upload.bytes)
                .await?,
        ),
        None => None,
    };

    let new_user = NewUser {
        name: registration.name,
        username: registration.username,
        email: registration.email,
        password_hash,
        photo_url: photo_url.clone(),
    };

    let result = state.repo.create_user(new_user).await;

    if let (Err(_), Some(key)) = (&result, &photo_url) {
        if let Err(e) = state.storage.delete_user_photo(key).await {
            tracing::warn!(photo = %key, error = %e, "failed to remove orphaned photo");
        }
    }

    match result {
        Ok(id) => {
            tracing::info!(user_id = id, "user created");
            Ok(id)
        }
        Err(e) => Err(taken_or("USERNAME", e)),
    }
}

/// Maps a unique violation to `{FIELD} is already taken.`, anything else to a
/// database error.
pub fn taken_or(field: &str, err: sqlx::Error) -> AppError {
    match err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::Validation(format!("{} is already taken.", field))
        }
        e => e.into(),
    }
}
