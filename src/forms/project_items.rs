//! The three forms that share the project page.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{FormError, FormErrors, checkbox, parse_date};
use crate::entities::projects;
use crate::models::project::{TodoInput, Upload};
use crate::storage::FileStore;

fn field(fields: &HashMap<String, String>, name: &str) -> String {
    fields.get(name).cloned().unwrap_or_default()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct CommentForm {
    #[validate(length(min = 1, max = 300, message = "Comment must be between 1 and 300 characters."))]
    pub body: String,
}

impl CommentForm {
    #[must_use]
    pub fn from_fields(fields: &HashMap<String, String>) -> Self {
        Self {
            body: field(fields, "body"),
        }
    }

    pub fn clean(&self) -> Result<String, FormError> {
        let body = self.body.trim().to_string();
        let form = Self { body };
        FormErrors::from_result(form.validate()).finish(form.body)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct TodoForm {
    #[validate(length(min = 1, max = 140, message = "Task must be between 1 and 140 characters."))]
    pub task: String,

    pub edate: String,

    pub is_done: bool,
}

impl TodoForm {
    #[must_use]
    pub fn from_fields(fields: &HashMap<String, String>) -> Self {
        Self {
            task: field(fields, "task"),
            edate: field(fields, "edate"),
            is_done: checkbox(fields.get("is_done").map(String::as_str)),
        }
    }

    /// The deadline must fall inside the project's window, bounds included.
    pub fn clean(&self, project: &projects::Model) -> Result<TodoInput, FormError> {
        let form = Self {
            task: self.task.trim().to_string(),
            edate: self.edate.trim().to_string(),
            is_done: self.is_done,
        };
        let mut errors = FormErrors::from_result(form.validate());
        let edate = parse_date(&mut errors, "edate", &form.edate, "Please select end date");

        if let Some(date) = edate
            && (date < project.sdate || date > project.edate)
        {
            errors.add(
                "edate",
                format!(
                    "Task end date must fall between {} and {}.",
                    project.sdate, project.edate
                ),
            );
        }

        let Some(edate) = edate else {
            return Err(FormError::Invalid(errors));
        };

        errors.finish(TodoInput {
            task: form.task,
            edate,
            is_done: form.is_done,
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ArtifactForm {
    #[validate(length(min = 1, max = 64, message = "Name must be between 1 and 64 characters."))]
    pub name: String,
}

impl ArtifactForm {
    #[must_use]
    pub fn from_fields(fields: &HashMap<String, String>) -> Self {
        Self {
            name: field(fields, "name"),
        }
    }

    /// Requires a non-empty upload whose extension the store accepts.
    pub fn clean(&self, upload: Option<&Upload>, files: &FileStore) -> Result<String, FormError> {
        let form = Self {
            name: self.name.trim().to_string(),
        };
        let mut errors = FormErrors::from_result(form.validate());

        match upload {
            Some(upload) if !upload.filename.trim().is_empty() => {
                if !files.allowed_file(&upload.filename) {
                    errors.add("file", "File type not allowed.");
                }
            }
            _ => errors.add("file", "Please choose a file."),
        }

        errors.finish(form.name)
    }
}
