use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::fmt;
use std::sync::Arc;
use tower_sessions::Session;

use super::AppState;
use super::auth::session_user;
use super::pages::Page;
use crate::services::{AuthError, ProjectError, UserError};

#[derive(Debug)]
pub enum WebError {
    NotFound(String),

    Forbidden(String),

    BadRequest(String),

    DatabaseError(String),

    InternalError(String),
}

impl fmt::Display for WebError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebError::NotFound(msg) => write!(f, "Not found: {}", msg),
            WebError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            WebError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            WebError::DatabaseError(msg) => write!(f, "Database error: {}", msg),
            WebError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for WebError {}

/// Marker left on error responses so `render_error_pages` can swap in the HTML page.
#[derive(Debug, Clone)]
struct ErrorPage {
    status: StatusCode,
    message: String,
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            WebError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            WebError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            WebError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            WebError::DatabaseError(msg) => {
                tracing::error!("Database error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "A database error occurred".to_string(),
                )
            }
            WebError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal error occurred".to_string(),
                )
            }
        };

        let mut response = (status, message.clone()).into_response();
        response
            .extensions_mut()
            .insert(ErrorPage { status, message });
        response
    }
}

impl From<anyhow::Error> for WebError {
    fn from(err: anyhow::Error) -> Self {
        WebError::InternalError(format!("{err:#}"))
    }
}

impl From<tower_sessions::session::Error> for WebError {
    fn from(err: tower_sessions::session::Error) -> Self {
        WebError::InternalError(format!("Session error: {err}"))
    }
}

impl From<AuthError> for WebError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials | AuthError::InvalidToken => {
                WebError::BadRequest(err.to_string())
            }
            AuthError::Validation(errors) => WebError::BadRequest(errors.to_string()),
            AuthError::Database(msg) => WebError::DatabaseError(msg),
            AuthError::Internal(msg) => WebError::InternalError(msg),
        }
    }
}

impl From<UserError> for WebError {
    fn from(err: UserError) -> Self {
        match err {
            UserError::NotFound(_) => WebError::NotFound(err.to_string()),
            UserError::SelfFollow | UserError::SelfUnfollow => {
                WebError::BadRequest(err.to_string())
            }
            UserError::Validation(errors) => WebError::BadRequest(errors.to_string()),
            UserError::Database(msg) => WebError::DatabaseError(msg),
            UserError::Internal(msg) => WebError::InternalError(msg),
        }
    }
}

impl From<ProjectError> for WebError {
    fn from(err: ProjectError) -> Self {
        match err {
            ProjectError::NotFound(_) | ProjectError::TodoNotFound(_) => {
                WebError::NotFound(err.to_string())
            }
            ProjectError::Forbidden => WebError::Forbidden(err.to_string()),
            ProjectError::Validation(errors) => WebError::BadRequest(errors.to_string()),
            ProjectError::Storage(msg) | ProjectError::Internal(msg) => {
                WebError::InternalError(msg)
            }
            ProjectError::Database(msg) => WebError::DatabaseError(msg),
        }
    }
}

impl WebError {
    pub fn not_found(resource: &str, id: impl fmt::Display) -> Self {
        WebError::NotFound(format!("{} {} not found", resource, id))
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        WebError::BadRequest(msg.into())
    }
}

/// Fallback for unknown paths.
pub async fn not_found() -> WebError {
    WebError::NotFound("The page you asked for does not exist".to_string())
}

/// Replaces plain-text error bodies with the themed error page.
pub async fn render_error_pages(
    State(state): State<Arc<AppState>>,
    session: Session,
    request: Request,
    next: Next,
) -> Response {
    let response = next.run(request).await;

    let Some(page) = response.extensions().get::<ErrorPage>().cloned() else {
        return response;
    };

    let user = session_user(&state, &session).await.ok().flatten();
    let title = page
        .status
        .canonical_reason()
        .unwrap_or("Error")
        .to_string();

    let rendered = Page::new("error.html", title)
        .with("status", &page.status.as_u16())
        .with("message", &page.message)
        .status(page.status)
        .render(&state, &session, user.as_ref())
        .await;

    match rendered {
        Ok(html) => html,
        Err(e) => {
            tracing::error!("Failed to render error page: {e}");
            response
        }
    }
}
