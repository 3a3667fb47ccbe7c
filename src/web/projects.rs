use axum::{
    Extension, Form,
    extract::{Multipart, Path, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tower_sessions::Session;

use super::auth::CurrentUser;
use super::pages::Page;
use super::{AppState, WebError, flash};
use crate::entities::sea_orm_active_enums::ProjectStatus;
use crate::forms::{ArtifactForm, CommentForm, FormErrors, ProjectForm, TodoForm};
use crate::models::project::Upload;
use crate::models::user::User;
use crate::services::ProjectError;

#[derive(Serialize)]
struct StatusChoice {
    code: String,
    label: &'static str,
}

fn status_choices() -> Vec<StatusChoice> {
    ProjectStatus::ALL
        .iter()
        .map(|s| StatusChoice {
            code: s.code().to_string(),
            label: s.label(),
        })
        .collect()
}

fn project_path(id: i32) -> String {
    format!("/projects/{id}")
}

/// GET /, /index
pub async fn index(
    State(state): State<Arc<AppState>>,
    session: Session,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Response, WebError> {
    let projects = state.projects().feed(&user).await?;

    Page::new("index.html", "Home")
        .with("projects", &projects)
        .render(&state, &session, Some(&user))
        .await
}

/// GET /explore
pub async fn explore(
    State(state): State<Arc<AppState>>,
    session: Session,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Response, WebError> {
    let projects = state.projects().explore().await?;

    Page::new("index.html", "Explore")
        .with("projects", &projects)
        .render(&state, &session, Some(&user))
        .await
}

fn project_form_page(title: &str, action: &str, form: &ProjectForm) -> Page {
    Page::new("project_form.html", title)
        .with("form", form)
        .with("action", action)
        .with("statuses", &status_choices())
}

/// GET /projects/new
pub async fn new_project_page(
    State(state): State<Arc<AppState>>,
    session: Session,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Response, WebError> {
    let form = ProjectForm {
        status: ProjectStatus::Open.code().to_string(),
        ..ProjectForm::default()
    };

    project_form_page("New project", "/projects/new", &form)
        .render(&state, &session, Some(&user))
        .await
}

/// POST /projects/new
pub async fn create_project(
    State(state): State<Arc<AppState>>,
    session: Session,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Form(form): Form<ProjectForm>,
) -> Result<Response, WebError> {
    match state.projects().create(&user, &form).await {
        Ok(project) => {
            flash::success(&session, "Project created successfully").await?;
            Ok(Redirect::to(&project_path(project.id)).into_response())
        }
        Err(ProjectError::Validation(errors)) => {
            project_form_page("New project", "/projects/new", &form)
                .invalid(&errors)
                .render(&state, &session, Some(&user))
                .await
        }
        Err(e) => Err(e.into()),
    }
}

/// GET /projects/{id}/edit
pub async fn edit_project_page(
    State(state): State<Arc<AppState>>,
    session: Session,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<i32>,
) -> Result<Response, WebError> {
    let project = state.projects().editable(&user, id).await?;
    let action = format!("{}/edit", project_path(id));

    project_form_page("Edit project", &action, &ProjectForm::from_project(&project))
        .render(&state, &session, Some(&user))
        .await
}

/// POST /projects/{id}/edit
pub async fn update_project(
    State(state): State<Arc<AppState>>,
    session: Session,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<i32>,
    Form(form): Form<ProjectForm>,
) -> Result<Response, WebError> {
    match state.projects().update(&user, id, &form).await {
        Ok(_) => {
            flash::success(&session, "Project updated successfully!").await?;
            Ok(Redirect::to(&project_path(id)).into_response())
        }
        Err(ProjectError::Validation(errors)) => {
            let action = format!("{}/edit", project_path(id));
            project_form_page("Edit project", &action, &form)
                .invalid(&errors)
                .render(&state, &session, Some(&user))
                .await
        }
        Err(e) => Err(e.into()),
    }
}

/// POST /projects/{id}/delete
pub async fn delete_project(
    State(state): State<Arc<AppState>>,
    session: Session,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<i32>,
) -> Result<Response, WebError> {
    state.projects().delete(&user, id).await?;
    flash::success(&session, "Project deleted successfully!").await?;
    Ok(Redirect::to("/index").into_response())
}

/// Which of the three project-page forms was submitted, with its input.
enum Submission {
    Comment(CommentForm),
    Todo(TodoForm),
    Artifact(ArtifactForm, Option<Upload>),
    Unrecognised,
}

impl Submission {
    fn from_parts(fields: &HashMap<String, String>, upload: Option<Upload>) -> Self {
        if fields.contains_key("csubmit") {
            Self::Comment(CommentForm::from_fields(fields))
        } else if fields.contains_key("tsubmit") {
            Self::Todo(TodoForm::from_fields(fields))
        } else if fields.contains_key("asubmit") {
            Self::Artifact(ArtifactForm::from_fields(fields), upload)
        } else {
            Self::Unrecognised
        }
    }
}

/// Forms and errors shown on the project page; one of them may carry a rejected submission.
#[derive(Default)]
struct ProjectPageForms {
    comment: CommentForm,
    todo: TodoForm,
    artifact: ArtifactForm,
    comment_errors: FormErrors,
    todo_errors: FormErrors,
    artifact_errors: FormErrors,
}

async fn render_project_page(
    state: &AppState,
    session: &Session,
    user: &User,
    id: i32,
    forms: ProjectPageForms,
    invalid: bool,
) -> Result<Response, WebError> {
    let detail = state.projects().detail(id).await?;
    let is_owner = detail.project.owner_id == user.id;
    let title = detail.project.title.clone();

    let mut page = Page::new("view_project.html", title)
        .with("detail", &detail)
        .with("is_owner", &is_owner)
        .with("comment_form", &forms.comment)
        .with("todo_form", &forms.todo)
        .with("artifact_form", &forms.artifact)
        .with("comment_errors", &forms.comment_errors)
        .with("todo_errors", &forms.todo_errors)
        .with("artifact_errors", &forms.artifact_errors);

    if invalid {
        page = page.status(axum::http::StatusCode::UNPROCESSABLE_ENTITY);
    }

    page.render(state, session, Some(user)).await
}

/// GET /projects/{id}
pub async fn view_project(
    State(state): State<Arc<AppState>>,
    session: Session,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<i32>,
) -> Result<Response, WebError> {
    render_project_page(&state, &session, &user, id, ProjectPageForms::default(), false).await
}

/// POST /projects/{id}
///
/// The comment, task and artifact forms all post here; the submit button
/// present in the body decides which one is handled.
pub async fn submit_project_form(
    State(state): State<Arc<AppState>>,
    session: Session,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<i32>,
    multipart: Multipart,
) -> Result<Response, WebError> {
    let (fields, upload) = read_multipart(multipart).await?;
    let projects = state.projects();

    let mut forms = ProjectPageForms::default();
    let outcome = match Submission::from_parts(&fields, upload) {
        Submission::Comment(form) => {
            let result = projects.add_comment(&user, id, &form).await;
            forms.comment = form;
            result.map(|()| "Your comment has been submitted successfully")
        }
        Submission::Todo(form) => {
            let result = projects.add_todo(&user, id, &form).await;
            forms.todo = form;
            result.map(|()| "Task has been added successfully")
        }
        Submission::Artifact(form, upload) => {
            let result = projects.add_artifact(&user, id, &form, upload).await;
            forms.artifact = form;
            result.map(|()| "Artifact saved successfully")
        }
        Submission::Unrecognised => {
            return render_project_page(&state, &session, &user, id, forms, false).await;
        }
    };

    match outcome {
        Ok(message) => {
            flash::success(&session, message).await?;
            Ok(Redirect::to(&project_path(id)).into_response())
        }
        Err(ProjectError::Validation(errors)) => {
            if fields.contains_key("csubmit") {
                forms.comment_errors = errors;
            } else if fields.contains_key("tsubmit") {
                forms.todo_errors = errors;
            } else {
                forms.artifact_errors = errors;
            }
            render_project_page(&state, &session, &user, id, forms, true).await
        }
        Err(e) => Err(e.into()),
    }
}

/// POST /todos/{id}
pub async fn toggle_todo(
    State(state): State<Arc<AppState>>,
    session: Session,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<i32>,
) -> Result<Response, WebError> {
    let project_id = state.projects().toggle_todo(&user, id).await?;
    flash::success(&session, "Task updated successfully").await?;
    Ok(Redirect::to(&project_path(project_id)).into_response())
}

/// Splits a multipart body into text fields and the `file` upload, if any.
async fn read_multipart(
    mut multipart: Multipart,
) -> Result<(HashMap<String, String>, Option<Upload>), WebError> {
    let mut fields = HashMap::new();
    let mut upload = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| WebError::bad_request(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();

        if let Some(filename) = field.file_name().map(ToString::to_string) {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| WebError::bad_request(e.body_text()))?;

            if name == "file" && !filename.is_empty() {
                upload = Some(Upload {
                    filename,
                    bytes: bytes.to_vec(),
                });
            }
        } else {
            let value = field
                .text()
                .await
                .map_err(|e| WebError::bad_request(e.body_text()))?;
            fields.insert(name, value);
        }
    }

    Ok((fields, upload))
}
