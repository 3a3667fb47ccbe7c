use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{FormError, FormErrors};
use crate::db::Store;

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct LoginForm {
    #[validate(length(min = 1, message = "This field is required."))]
    pub username: String,

    #[serde(skip_serializing)]
    #[validate(length(min = 1, message = "This field is required."))]
    pub password: String,

    pub remember_me: Option<String>,
}

impl LoginForm {
    pub fn clean(&self) -> Result<(), FormError> {
        FormErrors::from_result(self.validate()).finish(())
    }

    #[must_use]
    pub fn remember(&self) -> bool {
        super::checkbox(self.remember_me.as_deref())
    }
}

/// Cleaned registration data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct RegistrationForm {
    #[validate(length(min = 1, max = 64, message = "Username must be between 1 and 64 characters."))]
    pub username: String,

    #[validate(
        length(min = 1, max = 120, message = "Email must be between 1 and 120 characters."),
        email(message = "Invalid email address.")
    )]
    pub email: String,

    #[serde(skip_serializing)]
    #[validate(length(min = 1, message = "This field is required."))]
    pub password: String,

    #[serde(skip_serializing)]
    #[validate(must_match(other = "password", message = "Field must be equal to password."))]
    pub password2: String,
}

impl RegistrationForm {
    /// Username and email without surrounding whitespace; passwords are kept verbatim.
    #[must_use]
    pub fn normalized(&self) -> Self {
        Self {
            username: self.username.trim().to_string(),
            email: self.email.trim().to_string(),
            ..self.clone()
        }
    }

    /// Field rules, then username/email uniqueness against the store.
    pub async fn clean(&self, store: &Store) -> Result<Registration, FormError> {
        let form = self.normalized();
        let mut errors = FormErrors::from_result(form.validate());
        let username = form.username.as_str();
        let email = form.email.as_str();

        if !errors.has("username") && store.username_exists(username).await? {
            errors.add("username", "Please use a different username.");
        }

        if !errors.has("email") && store.email_exists(email).await? {
            errors.add("email", "Please use a different email address.");
        }

        errors.finish(Registration {
            username: username.to_string(),
            email: email.to_string(),
            password: self.password.clone(),
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ResetPasswordRequestForm {
    #[validate(
        length(min = 1, message = "This field is required."),
        email(message = "Invalid email address.")
    )]
    pub email: String,
}

impl ResetPasswordRequestForm {
    pub fn clean(&self) -> Result<String, FormError> {
        FormErrors::from_result(self.validate()).finish(self.email.trim().to_string())
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default)]
pub struct ResetPasswordForm {
    #[validate(length(min = 1, message = "This field is required."))]
    pub password: String,

    #[validate(must_match(other = "password", message = "Field must be equal to password."))]
    pub password2: String,
}

impl ResetPasswordForm {
    pub fn clean(&self) -> Result<String, FormError> {
        FormErrors::from_result(self.validate()).finish(self.password.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invalid(result: Result<impl std::fmt::Debug, FormError>) -> FormErrors {
        match result {
            Err(FormError::Invalid(errors)) => errors,
            other => panic!("expected validation errors, got {other:?}"),
        }
    }

    #[test]
    fn test_login_requires_fields() {
        let errors = invalid(LoginForm::default().clean());
        assert!(errors.has("username"));
        assert!(errors.has("password"));

        let form = LoginForm {
            username: "ana".into(),
            password: "pw".into(),
            remember_me: Some("y".into()),
        };
        assert!(form.clean().is_ok());
        assert!(form.remember());
    }

    #[test]
    fn test_reset_password_must_match() {
        let form = ResetPasswordForm {
            password: "new-secret".into(),
            password2: "other".into(),
        };
        let errors = invalid(form.clean());
        assert!(errors.has("password2"));
        assert!(!errors.has("password"));
    }

    #[test]
    fn test_reset_request_needs_valid_email() {
        let form = ResetPasswordRequestForm {
            email: "not-an-email".into(),
        };
        assert!(invalid(form.clean()).has("email"));

        let form = ResetPasswordRequestForm {
            email: "ana@example.com".into(),
        };
        assert_eq!(form.clean().unwrap(), "ana@example.com");
    }

    #[test]
    fn test_blank_username_rejected() {
        let form = RegistrationForm {
            username: "    ".into(),
            email: " ana@example.com ".into(),
            password: "secret".into(),
            password2: "secret".into(),
        }
        .normalized();

        let errors = FormErrors::from_result(form.validate());
        assert!(errors.has("username"));
        assert!(!errors.has("email"));
        assert_eq!(form.email, "ana@example.com");
    }

    #[test]
    fn test_password_not_serialized() {
        let form = RegistrationForm {
            username: "ana".into(),
            email: "ana@example.com".into(),
            password: "secret".into(),
            password2: "secret".into(),
        };
        let json = serde_json::to_value(&form).unwrap();
        assert!(json.get("password").is_none());
        assert_eq!(json["username"], "ana");
    }
}
