//! Domain service for profiles and the follow graph.

use thiserror::Error;

use crate::forms::{EditProfileForm, FormError, FormErrors};
use crate::models::user::{User, UserProfile};

#[derive(Debug, Error)]
pub enum UserError {
    #[error("User {0} not found.")]
    NotFound(String),

    #[error("You cannot follow yourself!")]
    SelfFollow,

    #[error("You cannot unfollow yourself!")]
    SelfUnfollow,

    #[error("Validation failed: {0}")]
    Validation(FormErrors),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for UserError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for UserError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(format!("{err:#}"))
    }
}

impl From<FormError> for UserError {
    fn from(err: FormError) -> Self {
        match err {
            FormError::Invalid(errors) => Self::Validation(errors),
            FormError::Store(e) => e.into(),
        }
    }
}

#[async_trait::async_trait]
pub trait UserService: Send + Sync {
    /// Looks up the user behind a session.
    async fn get(&self, id: i32) -> Result<Option<User>, UserError>;

    /// Stamps `last_seen` with the current time.
    async fn touch(&self, id: i32) -> Result<(), UserError>;

    /// Profile of `username` as seen by `viewer`.
    async fn profile(&self, viewer: &User, username: &str) -> Result<UserProfile, UserError>;

    async fn update_profile(&self, user: &User, form: &EditProfileForm)
    -> Result<User, UserError>;

    /// Follows `username`. Following someone twice is a no-op.
    async fn follow(&self, viewer: &User, username: &str) -> Result<User, UserError>;

    async fn unfollow(&self, viewer: &User, username: &str) -> Result<User, UserError>;
}
