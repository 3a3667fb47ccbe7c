//! Domain service for projects and the comments, todos and artifacts hung off them.
//!
//! Every mutation other than commenting is restricted to the project's owner.

use thiserror::Error;

use crate::forms::{ArtifactForm, CommentForm, FormError, FormErrors, ProjectForm, TodoForm};
use crate::models::project::{ProjectDetail, ProjectSummary, Upload};
use crate::models::user::User;
use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("Project {0} not found")]
    NotFound(i32),

    #[error("Task {0} not found")]
    TodoNotFound(i32),

    #[error("Only the project owner can do that")]
    Forbidden,

    #[error("Validation failed: {0}")]
    Validation(FormErrors),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for ProjectError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for ProjectError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(format!("{err:#}"))
    }
}

impl From<FormError> for ProjectError {
    fn from(err: FormError) -> Self {
        match err {
            FormError::Invalid(errors) => Self::Validation(errors),
            FormError::Store(e) => e.into(),
        }
    }
}

impl From<StorageError> for ProjectError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Io(e) => Self::Storage(format!("{e:#}")),
            rejected => {
                let mut errors = FormErrors::new();
                errors.add("file", rejected.to_string());
                Self::Validation(errors)
            }
        }
    }
}

#[async_trait::async_trait]
pub trait ProjectService: Send + Sync {
    /// Projects by the users `user` follows plus their own, newest first.
    async fn feed(&self, user: &User) -> Result<Vec<ProjectSummary>, ProjectError>;

    /// Every project, newest first.
    async fn explore(&self) -> Result<Vec<ProjectSummary>, ProjectError>;

    async fn owned_by(&self, owner_id: i32) -> Result<Vec<ProjectSummary>, ProjectError>;

    async fn create(&self, owner: &User, form: &ProjectForm)
    -> Result<ProjectSummary, ProjectError>;

    /// The project, provided `user` owns it.
    async fn editable(&self, user: &User, id: i32) -> Result<ProjectSummary, ProjectError>;

    async fn update(
        &self,
        user: &User,
        id: i32,
        form: &ProjectForm,
    ) -> Result<ProjectSummary, ProjectError>;

    /// Deletes the project with its children and stored files.
    async fn delete(&self, user: &User, id: i32) -> Result<(), ProjectError>;

    async fn detail(&self, id: i32) -> Result<ProjectDetail, ProjectError>;

    async fn add_comment(
        &self,
        user: &User,
        project_id: i32,
        form: &CommentForm,
    ) -> Result<(), ProjectError>;

    async fn add_todo(
        &self,
        user: &User,
        project_id: i32,
        form: &TodoForm,
    ) -> Result<(), ProjectError>;

    /// Flips `is_done` and returns the owning project's id.
    async fn toggle_todo(&self, user: &User, todo_id: i32) -> Result<i32, ProjectError>;

    async fn add_artifact(
        &self,
        user: &User,
        project_id: i32,
        form: &ArtifactForm,
        upload: Option<Upload>,
    ) -> Result<(), ProjectError>;
}
