use chrono::NaiveDate;
use serde::Serialize;

use super::user::display_timestamp;
use crate::entities::sea_orm_active_enums::ProjectStatus;
use crate::entities::{artifacts, comments, projects, todos, users};

/// Validated project fields, shared by create and edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectInput {
    pub title: String,
    pub body: String,
    pub status: ProjectStatus,
    pub sdate: NaiveDate,
    pub edate: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TodoInput {
    pub task: String,
    pub edate: NaiveDate,
    pub is_done: bool,
}

/// An uploaded file as received from the client.
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectSummary {
    pub id: i32,
    pub title: String,
    pub body: String,
    pub status: i32,
    pub status_label: &'static str,
    pub sdate: NaiveDate,
    pub edate: NaiveDate,
    pub owner_id: i32,
    pub owner: String,
    pub created_at: String,
}

impl ProjectSummary {
    #[must_use]
    pub fn new(project: projects::Model, owner: Option<&users::Model>) -> Self {
        Self {
            id: project.id,
            title: project.title,
            body: project.body,
            status: project.status.code(),
            status_label: project.status.label(),
            sdate: project.sdate,
            edate: project.edate,
            owner_id: project.user_id,
            owner: owner.map(|u| u.username.clone()).unwrap_or_default(),
            created_at: display_timestamp(&project.created_at),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CommentView {
    pub id: i32,
    pub body: String,
    pub author: String,
    pub created_at: String,
}

impl From<(comments::Model, Option<users::Model>)> for CommentView {
    fn from((comment, author): (comments::Model, Option<users::Model>)) -> Self {
        Self {
            id: comment.id,
            body: comment.body,
            author: author.map(|u| u.username).unwrap_or_default(),
            created_at: display_timestamp(&comment.created_at),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TodoView {
    pub id: i32,
    pub task: String,
    pub edate: NaiveDate,
    pub is_done: bool,
}

impl From<todos::Model> for TodoView {
    fn from(todo: todos::Model) -> Self {
        Self {
            id: todo.id,
            task: todo.task,
            edate: todo.edate,
            is_done: todo.is_done,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ArtifactView {
    pub id: i32,
    pub name: String,
    pub file: String,
}

impl From<artifacts::Model> for ArtifactView {
    fn from(artifact: artifacts::Model) -> Self {
        Self {
            id: artifact.id,
            name: artifact.name,
            file: artifact.file,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectDetail {
    pub project: ProjectSummary,
    pub comments: Vec<CommentView>,
    pub todos: Vec<TodoView>,
    pub artifacts: Vec<ArtifactView>,
}
