//! `SeaORM` implementation of the `AuthService` trait.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};

use crate::config::Config;
use crate::db::{Store, unique_violation};
use crate::forms::{
    FormErrors, LoginForm, RegistrationForm, ResetPasswordForm, ResetPasswordRequestForm,
};
use crate::mail::{Mailer, OutgoingMail};
use crate::models::user::User;
use crate::services::auth_service::{AuthError, AuthService};
use crate::services::reset_token::ResetTokens;
use crate::templates::Templates;

pub struct SeaOrmAuthService {
    store: Store,
    config: Arc<Config>,
    tokens: ResetTokens,
    templates: Arc<Templates>,
    mailer: Arc<dyn Mailer>,
}

impl SeaOrmAuthService {
    #[must_use]
    pub fn new(
        store: Store,
        config: Arc<Config>,
        templates: Arc<Templates>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        let tokens = ResetTokens::new(
            &config.security.secret_key,
            config.security.reset_token_ttl_seconds,
        );

        Self {
            store,
            config,
            tokens,
            templates,
            mailer,
        }
    }

    fn reset_mail(&self, user: &User, token: &str) -> Result<OutgoingMail, AuthError> {
        let reset_url = format!(
            "{}/reset_password/{}",
            self.config.server.base_url.trim_end_matches('/'),
            token
        );

        let mut context = tera::Context::new();
        context.insert("username", &user.username);
        context.insert("reset_url", &reset_url);

        Ok(OutgoingMail {
            to: vec![user.email.clone()],
            subject: "[trackr] Reset Your Password".to_string(),
            text_body: self
                .templates
                .render("email/reset_password.txt", &context)?,
            html_body: self
                .templates
                .render("email/reset_password.html", &context)?,
        })
    }
}

/// Field errors for a registration that lost a race on the username or email index.
fn registration_conflict(violation: &str) -> FormErrors {
    let mut errors = FormErrors::new();
    if violation.contains("email") {
        errors.add("email", "Please use a different email address.");
    } else {
        errors.add("username", "Please use a different username.");
    }
    errors
}

#[async_trait]
impl AuthService for SeaOrmAuthService {
    async fn register(&self, form: &RegistrationForm) -> Result<User, AuthError> {
        let registration = form.clean(&self.store).await?;

        let user = self
            .store
            .create_user(
                &registration.username,
                &registration.email,
                &registration.password,
                &self.config.security,
            )
            .await
            .map_err(|e| match unique_violation(&e) {
                Some(message) => AuthError::Validation(registration_conflict(&message)),
                None => e.into(),
            })?;

        info!(user_id = user.id, username = %user.username, "User registered");
        Ok(user)
    }

    async fn authenticate(&self, form: &LoginForm) -> Result<User, AuthError> {
        form.clean()?;

        self.store
            .verify_user_password(form.username.trim(), &form.password)
            .await?
            .ok_or(AuthError::InvalidCredentials)
    }

    async fn request_password_reset(
        &self,
        form: &ResetPasswordRequestForm,
    ) -> Result<(), AuthError> {
        let email = form.clean()?;

        let Some(user) = self.store.get_user_by_email(&email).await? else {
            info!("Password reset requested for unknown address");
            return Ok(());
        };

        let token = self.tokens.issue(user.id)?;
        let mail = self.reset_mail(&user, &token)?;

        if let Err(e) = self.mailer.send(mail).await {
            error!(user_id = user.id, "Failed to send password reset mail: {e:#}");
        } else {
            info!(user_id = user.id, "Password reset mail sent");
        }

        Ok(())
    }

    async fn verify_reset_token(&self, token: &str) -> Result<User, AuthError> {
        let user_id = self.tokens.verify(token).ok_or(AuthError::InvalidToken)?;

        self.store
            .get_user(user_id)
            .await?
            .ok_or(AuthError::InvalidToken)
    }

    async fn reset_password(
        &self,
        token: &str,
        form: &ResetPasswordForm,
    ) -> Result<User, AuthError> {
        let user = self.verify_reset_token(token).await?;
        let password = form.clean()?;

        self.store
            .update_user_password(user.id, &password, &self.config.security)
            .await?;

        info!(user_id = user.id, "Password reset");
        Ok(user)
    }
}
