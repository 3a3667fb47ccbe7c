//! Full-page rendering with the shared layout context.

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use serde::Serialize;
use tower_sessions::Session;

use super::{AppState, WebError, flash};
use crate::forms::FormErrors;
use crate::models::user::User;

pub struct Page {
    template: &'static str,
    context: tera::Context,
    status: StatusCode,
}

impl Page {
    pub fn new(template: &'static str, title: impl Into<String>) -> Self {
        let mut context = tera::Context::new();
        context.insert("title", &title.into());
        context.insert("errors", &FormErrors::new());

        Self {
            template,
            context,
            status: StatusCode::OK,
        }
    }

    #[must_use]
    pub fn with<T: Serialize + ?Sized>(mut self, key: &str, value: &T) -> Self {
        self.context.insert(key, value);
        self
    }

    /// Re-renders a rejected form with its field errors.
    #[must_use]
    pub fn invalid(self, errors: &FormErrors) -> Self {
        self.with("errors", errors)
            .status(StatusCode::UNPROCESSABLE_ENTITY)
    }

    #[must_use]
    pub const fn status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub async fn render(
        mut self,
        state: &AppState,
        session: &Session,
        user: Option<&User>,
    ) -> Result<Response, WebError> {
        self.context.insert("current_user", &user);
        self.context.insert("flashes", &flash::take(session).await?);

        let html = state.templates().render(self.template, &self.context)?;
        Ok((self.status, Html(html)).into_response())
    }
}
