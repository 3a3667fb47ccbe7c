//! Form parsing and validation.
//!
//! Each form deserializes from the submitted fields, checks field rules with
//! `validator`, then runs cross-field and persistence checks in `clean`.
//! A form either yields typed input for the services or a per-field error map;
//! nothing is written until `clean` succeeds.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

pub mod auth;
pub mod profile;
pub mod project;
pub mod project_items;

pub use auth::{LoginForm, RegistrationForm, ResetPasswordForm, ResetPasswordRequestForm};
pub use profile::EditProfileForm;
pub use project::ProjectForm;
pub use project_items::{ArtifactForm, CommentForm, TodoForm};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Field name to messages, in field order for stable rendering.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FormErrors(BTreeMap<String, Vec<String>>);

impl FormErrors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn has(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    #[must_use]
    pub fn get(&self, field: &str) -> &[String] {
        self.0.get(field).map_or(&[], Vec::as_slice)
    }

    /// Starts from the `validator` result, empty when it passed.
    #[must_use]
    pub fn from_result(result: Result<(), ValidationErrors>) -> Self {
        result.err().map(Self::from).unwrap_or_default()
    }

    pub fn finish<T>(self, value: T) -> Result<T, FormError> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(FormError::Invalid(self))
        }
    }
}

impl From<ValidationErrors> for FormErrors {
    fn from(errors: ValidationErrors) -> Self {
        let mut out = Self::new();
        for (field, errs) in errors.field_errors() {
            for err in errs {
                let message = err
                    .message
                    .as_ref()
                    .map_or_else(|| format!("Invalid value ({})", err.code), ToString::to_string);
                out.add(field.as_ref(), message);
            }
        }
        out
    }
}

impl fmt::Display for FormErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|(field, msgs)| format!("{field}: {}", msgs.join(" ")))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

#[derive(Debug, Error)]
pub enum FormError {
    #[error("Invalid submission: {0}")]
    Invalid(FormErrors),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// HTML checkboxes are absent when unticked and carry any value when ticked.
#[must_use]
pub fn checkbox(value: Option<&str>) -> bool {
    value.is_some_and(|v| !matches!(v, "" | "0" | "false" | "off"))
}

/// Parses a `YYYY-MM-DD` date field, recording an error when missing or malformed.
pub fn parse_date(
    errors: &mut FormErrors,
    field: &str,
    value: &str,
    missing_message: &str,
) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        errors.add(field, missing_message);
        return None;
    }

    match NaiveDate::parse_from_str(value, DATE_FORMAT) {
        Ok(date) => Some(date),
        Err(_) => {
            errors.add(field, "Not a valid date value.");
            None
        }
    }
}
