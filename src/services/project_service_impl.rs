//! `SeaORM` implementation of the `ProjectService` trait.

use async_trait::async_trait;
use tracing::{info, warn};

use crate::db::{ProjectWithOwner, Store, is_unique_violation};
use crate::entities::projects;
use crate::forms::{ArtifactForm, CommentForm, FormErrors, ProjectForm, TodoForm};
use crate::models::project::{ProjectDetail, ProjectSummary, Upload};
use crate::models::user::User;
use crate::services::project_service::{ProjectError, ProjectService};
use crate::storage::FileStore;

pub struct SeaOrmProjectService {
    store: Store,
    files: FileStore,
}

impl SeaOrmProjectService {
    #[must_use]
    pub const fn new(store: Store, files: FileStore) -> Self {
        Self { store, files }
    }

    async fn load(&self, id: i32) -> Result<projects::Model, ProjectError> {
        self.store
            .get_project(id)
            .await?
            .ok_or(ProjectError::NotFound(id))
    }

    async fn load_owned(&self, user: &User, id: i32) -> Result<projects::Model, ProjectError> {
        let project = self.load(id).await?;
        if project.user_id != user.id {
            warn!(project_id = id, user_id = user.id, "Rejected change by non-owner");
            return Err(ProjectError::Forbidden);
        }
        Ok(project)
    }

    fn title_conflict(err: anyhow::Error) -> ProjectError {
        if is_unique_violation(&err) {
            let mut errors = FormErrors::new();
            errors.add("title", "Please use a different project title.");
            ProjectError::Validation(errors)
        } else {
            err.into()
        }
    }
}

fn summaries(rows: Vec<ProjectWithOwner>) -> Vec<ProjectSummary> {
    rows.into_iter()
        .map(|(project, owner)| ProjectSummary::new(project, owner.as_ref()))
        .collect()
}

fn summary_for(project: projects::Model, owner: &User) -> ProjectSummary {
    let mut summary = ProjectSummary::new(project, None);
    summary.owner.clone_from(&owner.username);
    summary
}

#[async_trait]
impl ProjectService for SeaOrmProjectService {
    async fn feed(&self, user: &User) -> Result<Vec<ProjectSummary>, ProjectError> {
        let mut owners = self.store.followed_ids(user.id).await?;
        owners.push(user.id);

        let rows = self.store.list_projects_for_owners(owners).await?;
        Ok(summaries(rows))
    }

    async fn explore(&self) -> Result<Vec<ProjectSummary>, ProjectError> {
        Ok(summaries(self.store.list_recent_projects().await?))
    }

    async fn owned_by(&self, owner_id: i32) -> Result<Vec<ProjectSummary>, ProjectError> {
        let rows = self.store.list_projects_for_owners(vec![owner_id]).await?;
        Ok(summaries(rows))
    }

    async fn create(
        &self,
        owner: &User,
        form: &ProjectForm,
    ) -> Result<ProjectSummary, ProjectError> {
        let input = form.clean(&self.store, owner.id, None).await?;

        let project = self
            .store
            .create_project(owner.id, &input)
            .await
            .map_err(Self::title_conflict)?;

        info!(project_id = project.id, user_id = owner.id, "Project created");
        Ok(summary_for(project, owner))
    }

    async fn editable(&self, user: &User, id: i32) -> Result<ProjectSummary, ProjectError> {
        let project = self.load_owned(user, id).await?;
        Ok(summary_for(project, user))
    }

    async fn update(
        &self,
        user: &User,
        id: i32,
        form: &ProjectForm,
    ) -> Result<ProjectSummary, ProjectError> {
        let current = self.load_owned(user, id).await?;
        let input = form
            .clean(&self.store, user.id, Some(current.title.as_str()))
            .await?;

        let project = self
            .store
            .update_project(id, &input)
            .await
            .map_err(Self::title_conflict)?;

        info!(project_id = id, "Project updated");
        Ok(summary_for(project, user))
    }

    async fn delete(&self, user: &User, id: i32) -> Result<(), ProjectError> {
        self.load_owned(user, id).await?;

        let files = self
            .store
            .delete_project(id)
            .await?
            .ok_or(ProjectError::NotFound(id))?;

        for file in &files {
            self.files.remove(file).await;
        }

        info!(project_id = id, removed_files = files.len(), "Project deleted");
        Ok(())
    }

    async fn detail(&self, id: i32) -> Result<ProjectDetail, ProjectError> {
        let (project, owner) = self
            .store
            .get_project_with_owner(id)
            .await?
            .ok_or(ProjectError::NotFound(id))?;

        let comments = self.store.list_comments(id).await?;
        let todos = self.store.list_todos(id).await?;
        let artifacts = self.store.list_artifacts(id).await?;

        Ok(ProjectDetail {
            project: ProjectSummary::new(project, owner.as_ref()),
            comments: comments.into_iter().map(Into::into).collect(),
            todos: todos.into_iter().map(Into::into).collect(),
            artifacts: artifacts.into_iter().map(Into::into).collect(),
        })
    }

    async fn add_comment(
        &self,
        user: &User,
        project_id: i32,
        form: &CommentForm,
    ) -> Result<(), ProjectError> {
        self.load(project_id).await?;
        let body = form.clean()?;

        let comment = self.store.add_comment(user.id, project_id, &body).await?;
        info!(comment_id = comment.id, project_id, "Comment added");
        Ok(())
    }

    async fn add_todo(
        &self,
        user: &User,
        project_id: i32,
        form: &TodoForm,
    ) -> Result<(), ProjectError> {
        let project = self.load_owned(user, project_id).await?;
        let input = form.clean(&project)?;

        let todo = self.store.add_todo(project_id, &input).await?;
        info!(todo_id = todo.id, project_id, "Task added");
        Ok(())
    }

    async fn toggle_todo(&self, user: &User, todo_id: i32) -> Result<i32, ProjectError> {
        let todo = self
            .store
            .get_todo(todo_id)
            .await?
            .ok_or(ProjectError::TodoNotFound(todo_id))?;

        self.load_owned(user, todo.project_id).await?;

        let todo = self.store.toggle_todo(todo).await?;
        info!(todo_id, is_done = todo.is_done, "Task toggled");
        Ok(todo.project_id)
    }

    async fn add_artifact(
        &self,
        user: &User,
        project_id: i32,
        form: &ArtifactForm,
        upload: Option<Upload>,
    ) -> Result<(), ProjectError> {
        self.load_owned(user, project_id).await?;
        let name = form.clean(upload.as_ref(), &self.files)?;

        let Some(upload) = upload else {
            return Err(ProjectError::Internal("Upload vanished after validation".into()));
        };

        let stored = self.files.save(&upload.filename, &upload.bytes).await?;

        match self.store.add_artifact(project_id, &name, &stored).await {
            Ok(artifact) => {
                info!(artifact_id = artifact.id, project_id, file = %stored, "Artifact saved");
                Ok(())
            }
            Err(e) => {
                self.files.remove(&stored).await;
                Err(e.into())
            }
        }
    }
}
