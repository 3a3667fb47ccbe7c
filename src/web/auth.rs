use axum::{
    Form,
    extract::{Path, Query, Request, State},
    http::Uri,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use std::sync::Arc;
use tower_sessions::{Expiry, Session};
use tracing::{info, warn};
use url::Url;

use super::pages::Page;
use super::{AppState, WebError, flash};
use crate::forms::{LoginForm, RegistrationForm, ResetPasswordForm, ResetPasswordRequestForm};
use crate::models::user::User;
use crate::services::AuthError;

const USER_KEY: &str = "user_id";
const HOME: &str = "/index";
const LOCAL_ORIGIN: &str = "http://trackr.invalid/";

/// The signed-in user, placed in request extensions by [`require_login`].
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

#[derive(Debug, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

// ============================================================================
// Middleware
// ============================================================================

/// Resolves the session's user and stamps their `last_seen`.
pub async fn session_user(state: &AppState, session: &Session) -> Result<Option<User>, WebError> {
    let Some(user_id) = session.get::<i32>(USER_KEY).await? else {
        return Ok(None);
    };

    let Some(user) = state.users().get(user_id).await? else {
        // Account vanished under a live session.
        session.flush().await?;
        return Ok(None);
    };

    if let Err(e) = state.users().touch(user.id).await {
        warn!(user_id = user.id, "Failed to update last_seen: {e}");
    }

    Ok(Some(user))
}

/// Redirects anonymous requests to the login page, remembering where they were going.
pub async fn require_login(
    State(state): State<Arc<AppState>>,
    session: Session,
    mut request: Request,
    next: Next,
) -> Result<Response, WebError> {
    match session_user(&state, &session).await? {
        Some(user) => {
            tracing::Span::current().record("user_id", user.id);
            request.extensions_mut().insert(CurrentUser(user));
            Ok(next.run(request).await)
        }
        None => Ok(login_redirect(request.uri())),
    }
}

fn login_redirect(uri: &Uri) -> Response {
    let next = uri.path_and_query().map_or("/", |pq| pq.as_str());
    Redirect::to(&format!("/login?next={}", urlencoding::encode(next))).into_response()
}

/// Where to go after login: `next` when it is a path on this site, the index otherwise.
#[must_use]
pub fn safe_next(next: Option<&str>) -> String {
    let Some(next) = next.map(str::trim).filter(|n| !n.is_empty()) else {
        return HOME.to_string();
    };

    let off_site = !next.starts_with('/')
        || next.starts_with("//")
        || next.contains('\\')
        || next.chars().any(char::is_control)
        || !stays_on_site(next);

    if off_site {
        HOME.to_string()
    } else {
        next.to_string()
    }
}

/// Resolves `next` against a placeholder origin the way a browser would and
/// checks the origin did not change.
fn stays_on_site(next: &str) -> bool {
    let Ok(base) = Url::parse(LOCAL_ORIGIN) else {
        return false;
    };

    base.join(next)
        .is_ok_and(|resolved| resolved.origin() == base.origin())
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /login
pub async fn login_page(
    State(state): State<Arc<AppState>>,
    session: Session,
    Query(query): Query<NextQuery>,
) -> Result<Response, WebError> {
    if session_user(&state, &session).await?.is_some() {
        return Ok(Redirect::to(HOME).into_response());
    }

    Page::new("login.html", "Sign In")
        .with("form", &LoginForm::default())
        .with("next", &query.next)
        .render(&state, &session, None)
        .await
}

/// POST /login
pub async fn login(
    State(state): State<Arc<AppState>>,
    session: Session,
    Query(query): Query<NextQuery>,
    Form(form): Form<LoginForm>,
) -> Result<Response, WebError> {
    if session_user(&state, &session).await?.is_some() {
        return Ok(Redirect::to(HOME).into_response());
    }

    match state.auth().authenticate(&form).await {
        Ok(user) => {
            session.cycle_id().await?;
            session.insert(USER_KEY, user.id).await?;

            if form.remember() {
                let days = state.config().server.remember_me_days;
                session.set_expiry(Some(Expiry::AtDateTime(
                    time::OffsetDateTime::now_utc() + time::Duration::days(days),
                )));
            }

            info!(user_id = user.id, "User logged in");
            Ok(Redirect::to(&safe_next(query.next.as_deref())).into_response())
        }
        Err(AuthError::InvalidCredentials) => {
            warn!(username = %form.username, "Failed login attempt");
            flash::danger(&session, "Invalid username or password").await?;

            let target = match query.next.as_deref() {
                Some(next) => format!("/login?next={}", urlencoding::encode(next)),
                None => "/login".to_string(),
            };
            Ok(Redirect::to(&target).into_response())
        }
        Err(AuthError::Validation(errors)) => {
            Page::new("login.html", "Sign In")
                .with("form", &form)
                .with("next", &query.next)
                .invalid(&errors)
                .render(&state, &session, None)
                .await
        }
        Err(e) => Err(e.into()),
    }
}

/// GET /logout
pub async fn logout(session: Session) -> Result<Response, WebError> {
    session.flush().await?;
    Ok(Redirect::to(HOME).into_response())
}

/// GET /register
pub async fn register_page(
    State(state): State<Arc<AppState>>,
    session: Session,
) -> Result<Response, WebError> {
    if session_user(&state, &session).await?.is_some() {
        return Ok(Redirect::to(HOME).into_response());
    }

    Page::new("register.html", "Register")
        .with("form", &RegistrationForm::default())
        .render(&state, &session, None)
        .await
}

/// POST /register
pub async fn register(
    State(state): State<Arc<AppState>>,
    session: Session,
    Form(form): Form<RegistrationForm>,
) -> Result<Response, WebError> {
    if session_user(&state, &session).await?.is_some() {
        return Ok(Redirect::to(HOME).into_response());
    }

    match state.auth().register(&form).await {
        Ok(_) => {
            flash::success(&session, "Congratulations, you are now a registered user!").await?;
            Ok(Redirect::to("/login").into_response())
        }
        Err(AuthError::Validation(errors)) => {
            Page::new("register.html", "Register")
                .with("form", &form)
                .invalid(&errors)
                .render(&state, &session, None)
                .await
        }
        Err(e) => Err(e.into()),
    }
}

/// GET /reset_password_request
pub async fn reset_request_page(
    State(state): State<Arc<AppState>>,
    session: Session,
) -> Result<Response, WebError> {
    if session_user(&state, &session).await?.is_some() {
        return Ok(Redirect::to(HOME).into_response());
    }

    Page::new("reset_password_request.html", "Reset Password")
        .with("form", &ResetPasswordRequestForm::default())
        .render(&state, &session, None)
        .await
}

/// POST /reset_password_request
pub async fn reset_request(
    State(state): State<Arc<AppState>>,
    session: Session,
    Form(form): Form<ResetPasswordRequestForm>,
) -> Result<Response, WebError> {
    if session_user(&state, &session).await?.is_some() {
        return Ok(Redirect::to(HOME).into_response());
    }

    match state.auth().request_password_reset(&form).await {
        Ok(()) => {
            flash::info(
                &session,
                "Check your email for the instructions to reset your password",
            )
            .await?;
            Ok(Redirect::to("/login").into_response())
        }
        Err(AuthError::Validation(errors)) => {
            Page::new("reset_password_request.html", "Reset Password")
                .with("form", &form)
                .invalid(&errors)
                .render(&state, &session, None)
                .await
        }
        Err(e) => Err(e.into()),
    }
}

/// GET /reset_password/{token}
pub async fn reset_password_page(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path(token): Path<String>,
) -> Result<Response, WebError> {
    if session_user(&state, &session).await?.is_some() {
        return Ok(Redirect::to(HOME).into_response());
    }

    match state.auth().verify_reset_token(&token).await {
        Ok(_) => {
            Page::new("reset_password.html", "Reset Password")
                .with("token", &token)
                .render(&state, &session, None)
                .await
        }
        Err(AuthError::InvalidToken) => Ok(Redirect::to(HOME).into_response()),
        Err(e) => Err(e.into()),
    }
}

/// POST /reset_password/{token}
pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path(token): Path<String>,
    Form(form): Form<ResetPasswordForm>,
) -> Result<Response, WebError> {
    if session_user(&state, &session).await?.is_some() {
        return Ok(Redirect::to(HOME).into_response());
    }

    match state.auth().reset_password(&token, &form).await {
        Ok(_) => {
            flash::success(&session, "Your password has been reset.").await?;
            Ok(Redirect::to("/login").into_response())
        }
        Err(AuthError::InvalidToken) => Ok(Redirect::to(HOME).into_response()),
        Err(AuthError::Validation(errors)) => {
            Page::new("reset_password.html", "Reset Password")
                .with("token", &token)
                .invalid(&errors)
                .render(&state, &session, None)
                .await
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_next_accepts_local_paths() {
        assert_eq!(safe_next(Some("/projects/3")), "/projects/3");
        assert_eq!(safe_next(Some("/user/ana?tab=projects")), "/user/ana?tab=projects");
    }

    #[test]
    fn test_safe_next_rejects_off_site() {
        assert_eq!(safe_next(Some("https://evil.example.com/")), HOME);
        assert_eq!(safe_next(Some("//evil.example.com/path")), HOME);
        assert_eq!(safe_next(Some("javascript:alert(1)")), HOME);
        assert_eq!(safe_next(Some("/\\evil.example.com")), HOME);
        assert_eq!(safe_next(Some("relative/path")), HOME);
    }

    #[test]
    fn test_safe_next_rejects_control_characters() {
        assert_eq!(safe_next(Some("/\t/evil.example.com")), HOME);
        assert_eq!(safe_next(Some("/\r\n/evil.example.com")), HOME);
        assert_eq!(safe_next(Some("/index\nx")), HOME);
        assert_eq!(safe_next(Some("/projects/\u{7f}")), HOME);
    }

    #[test]
    fn test_safe_next_defaults_to_index() {
        assert_eq!(safe_next(None), HOME);
        assert_eq!(safe_next(Some("  ")), HOME);
    }

    #[test]
    fn test_login_redirect_keeps_query() {
        let uri: Uri = "/projects/7?x=1".parse().unwrap();
        let response = login_redirect(&uri);
        let location = response.headers()["location"].to_str().unwrap();
        assert_eq!(location, "/login?next=%2Fprojects%2F7%3Fx%3D1");
    }
}
