use axum::{
    Extension, Form,
    extract::{Path, State},
    response::{IntoResponse, Redirect, Response},
};
use std::sync::Arc;
use tower_sessions::Session;

use super::auth::CurrentUser;
use super::pages::Page;
use super::{AppState, WebError, flash};
use crate::forms::EditProfileForm;
use crate::services::UserError;

pub fn profile_path(username: &str) -> String {
    format!("/user/{}", urlencoding::encode(username))
}

/// GET /user/{username}
pub async fn profile(
    State(state): State<Arc<AppState>>,
    session: Session,
    Extension(CurrentUser(viewer)): Extension<CurrentUser>,
    Path(username): Path<String>,
) -> Result<Response, WebError> {
    let profile = state.users().profile(&viewer, &username).await?;
    let projects = state.projects().owned_by(profile.user.id).await?;

    Page::new("user.html", "Profile")
        .with("profile", &profile)
        .with("projects", &projects)
        .render(&state, &session, Some(&viewer))
        .await
}

/// GET /edit_profile
pub async fn edit_profile_page(
    State(state): State<Arc<AppState>>,
    session: Session,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Response, WebError> {
    Page::new("edit_profile.html", "Edit Profile")
        .with("form", &EditProfileForm::from_user(&user))
        .render(&state, &session, Some(&user))
        .await
}

/// POST /edit_profile
pub async fn edit_profile(
    State(state): State<Arc<AppState>>,
    session: Session,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Form(form): Form<EditProfileForm>,
) -> Result<Response, WebError> {
    match state.users().update_profile(&user, &form).await {
        Ok(updated) => {
            flash::success(&session, "Your changes have been saved.").await?;
            Ok(Redirect::to(&profile_path(&updated.username)).into_response())
        }
        Err(UserError::Validation(errors)) => {
            Page::new("edit_profile.html", "Edit Profile")
                .with("form", &form)
                .invalid(&errors)
                .render(&state, &session, Some(&user))
                .await
        }
        Err(e) => Err(e.into()),
    }
}

/// POST /follow/{username}
pub async fn follow(
    State(state): State<Arc<AppState>>,
    session: Session,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(username): Path<String>,
) -> Result<Response, WebError> {
    let outcome = state.users().follow(&user, &username).await;
    follow_outcome(&session, &username, outcome.map(|_| format!("You are following {username}!")))
        .await
}

/// POST /unfollow/{username}
pub async fn unfollow(
    State(state): State<Arc<AppState>>,
    session: Session,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(username): Path<String>,
) -> Result<Response, WebError> {
    let outcome = state.users().unfollow(&user, &username).await;
    follow_outcome(&session, &username, outcome.map(|_| format!("You are not following {username}.")))
        .await
}

/// Unknown users send the caller home; every other outcome lands on the profile.
async fn follow_outcome(
    session: &Session,
    username: &str,
    outcome: Result<String, UserError>,
) -> Result<Response, WebError> {
    match outcome {
        Ok(message) => {
            flash::success(session, message).await?;
            Ok(Redirect::to(&profile_path(username)).into_response())
        }
        Err(err @ UserError::NotFound(_)) => {
            flash::danger(session, err.to_string()).await?;
            Ok(Redirect::to("/index").into_response())
        }
        Err(err @ (UserError::SelfFollow | UserError::SelfUnfollow)) => {
            flash::danger(session, err.to_string()).await?;
            Ok(Redirect::to(&profile_path(username)).into_response())
        }
        Err(e) => Err(e.into()),
    }
}
