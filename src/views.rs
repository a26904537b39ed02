use axum::response::Html;
use handlebars::{DirectorySourceOptions, Handlebars, TemplateError, handlebars_helper};
use serde::Serialize;
use serde_json::json;
use std::path::Path;

use crate::{auth::AuthUser, error::AppResult};

const LAYOUT: &str = "layouts/dashboard";

handlebars_helper!(to_json: |value: Json| value.to_string());

/// Page
///
/// The data every template receives: a title, the page-specific payload under
/// `data`, and the logged-in user (if any).
#[derive(Debug, Serialize)]
pub struct Page<'a, T: Serialize> {
    pub title: String,
    pub data: T,
    pub auth_user: Option<&'a AuthUser>,
    pub is_logged_in: bool,
}

impl<'a, T: Serialize> Page<'a, T> {
    pub fn new(title: impl Into<String>, data: T, auth_user: Option<&'a AuthUser>) -> Self {
        Self {
            title: title.into(),
            data,
            is_logged_in: auth_user.is_some(),
            auth_user,
        }
    }
}

/// Views
///
/// The Handlebars registry, loaded once at startup. Templates are named by
/// their path below the templates root without the `.hbs` extension
/// (`projects/index`).
pub struct Views {
    registry: Handlebars<'static>,
}

impl Views {
    pub fn load(dir: impl AsRef<Path>) -> Result<Self, TemplateError> {
        let mut registry = Handlebars::new();
        registry.register_helper("to_json", Box::new(to_json));
        registry.register_templates_directory(dir.as_ref(), DirectorySourceOptions::default())?;

        tracing::debug!(
            templates = registry.get_templates().len(),
            dir = %dir.as_ref().display(),
            "templates loaded"
        );
        Ok(Self { registry })
    }

    pub fn has_template(&self, name: &str) -> bool {
        self.registry.has_template(name)
    }

    /// Renders `template` and wraps the result in the dashboard layout.
    pub fn render<T: Serialize>(&self, template: &str, page: &Page<'_, T>) -> AppResult<Html<String>> {
        let content = self.registry.render(template, page).inspect_err(|e| {
            tracing::error!("render {} error: {:?}", template, e);
        })?;

        let layout = json!({
            "title": page.title,
            "auth_user": page.auth_user,
            "is_logged_in": page.is_logged_in,
            "content": content,
        });

        let html = self.registry.render(LAYOUT, &layout).inspect_err(|e| {
            tracing::error!("render {} error: {:?}", LAYOUT, e);
        })?;

        Ok(Html(html))
    }

    /// Notice shown in place of a listing whose parent has been soft-deleted.
    pub fn deleted_entity(
        &self,
        message: &str,
        auth_user: Option<&AuthUser>,
    ) -> AppResult<Html<String>> {
        let page = Page::new("Deleted", json!({ "message": message }), auth_user);
        self.render("shared/deleted", &page)
    }
}
