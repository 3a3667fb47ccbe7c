//! Domain service for sign-up, sign-in and password resets.

use thiserror::Error;

use crate::forms::{
    FormError, FormErrors, LoginForm, RegistrationForm, ResetPasswordForm,
    ResetPasswordRequestForm,
};
use crate::models::user::User;

/// Errors specific to authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Reset token is invalid or has expired")]
    InvalidToken,

    #[error("Validation failed: {0}")]
    Validation(FormErrors),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for AuthError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(format!("{err:#}"))
    }
}

impl From<FormError> for AuthError {
    fn from(err: FormError) -> Self {
        match err {
            FormError::Invalid(errors) => Self::Validation(errors),
            FormError::Store(e) => e.into(),
        }
    }
}

/// Domain service trait for authentication.
#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    /// Creates an account from a registration form.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Validation`] when a field is invalid or the
    /// username/email is already taken.
    async fn register(&self, form: &RegistrationForm) -> Result<User, AuthError>;

    /// Verifies credentials.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidCredentials`] for an unknown user or a wrong password.
    async fn authenticate(&self, form: &LoginForm) -> Result<User, AuthError>;

    /// Mails a reset link when the address belongs to a user. Succeeds either way.
    async fn request_password_reset(&self, form: &ResetPasswordRequestForm)
    -> Result<(), AuthError>;

    /// Resolves a reset token to its user.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidToken`] for forged, expired or orphaned tokens.
    async fn verify_reset_token(&self, token: &str) -> Result<User, AuthError>;

    /// Sets a new password for the token's user.
    async fn reset_password(
        &self,
        token: &str,
        form: &ResetPasswordForm,
    ) -> Result<User, AuthError>;
}
