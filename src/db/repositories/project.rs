use anyhow::{Context, Result};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use tracing::info;

use crate::entities::{artifacts, comments, prelude::*, projects, todos, users};
use crate::models::project::ProjectInput;

pub type ProjectWithOwner = (projects::Model, Option<users::Model>);

/// Repository for projects and their cascade
pub struct ProjectRepository {
    conn: DatabaseConnection,
}

impl ProjectRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn create(&self, owner_id: i32, input: &ProjectInput) -> Result<projects::Model> {
        let active = projects::ActiveModel {
            title: Set(input.title.clone()),
            body: Set(input.body.clone()),
            status: Set(input.status),
            sdate: Set(input.sdate),
            edate: Set(input.edate),
            user_id: Set(owner_id),
            created_at: Set(Utc::now()),
            ..Default::default()
        };

        let model = active
            .insert(&self.conn)
            .await
            .context("Failed to insert project")?;

        info!(project_id = model.id, owner_id, "Created project");
        Ok(model)
    }

    pub async fn get(&self, id: i32) -> Result<Option<projects::Model>> {
        Projects::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query project")
    }

    pub async fn get_with_owner(&self, id: i32) -> Result<Option<ProjectWithOwner>> {
        Projects::find_by_id(id)
            .find_also_related(Users)
            .one(&self.conn)
            .await
            .context("Failed to query project with owner")
    }

    pub async fn title_taken(&self, owner_id: i32, title: &str) -> Result<bool> {
        let count = Projects::find()
            .filter(projects::Column::UserId.eq(owner_id))
            .filter(projects::Column::Title.eq(title))
            .count(&self.conn)
            .await
            .context("Failed to count projects by title")?;

        Ok(count > 0)
    }

    pub async fn update(&self, id: i32, input: &ProjectInput) -> Result<projects::Model> {
        let project = Projects::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query project for update")?
            .ok_or_else(|| anyhow::anyhow!("Project not found: {id}"))?;

        let mut active: projects::ActiveModel = project.into();
        active.title = Set(input.title.clone());
        active.body = Set(input.body.clone());
        active.status = Set(input.status);
        active.sdate = Set(input.sdate);
        active.edate = Set(input.edate);

        active
            .update(&self.conn)
            .await
            .context("Failed to update project")
    }

    /// Deletes the project and its comments, todos and artifacts in one transaction.
    ///
    /// Returns the stored artifact filenames so the caller can remove them from disk,
    /// or `None` if no such project existed.
    pub async fn delete(&self, id: i32) -> Result<Option<Vec<String>>> {
        let txn = self.conn.begin().await?;

        let files: Vec<String> = Artifacts::find()
            .filter(artifacts::Column::ProjectId.eq(id))
            .all(&txn)
            .await?
            .into_iter()
            .map(|a| a.file)
            .collect();

        Comments::delete_many()
            .filter(comments::Column::ProjectId.eq(id))
            .exec(&txn)
            .await?;
        Todos::delete_many()
            .filter(todos::Column::ProjectId.eq(id))
            .exec(&txn)
            .await?;
        Artifacts::delete_many()
            .filter(artifacts::Column::ProjectId.eq(id))
            .exec(&txn)
            .await?;

        let res = Projects::delete_by_id(id).exec(&txn).await?;
        if res.rows_affected == 0 {
            txn.rollback().await?;
            return Ok(None);
        }

        txn.commit().await.context("Failed to commit project delete")?;
        info!(project_id = id, "Deleted project");
        Ok(Some(files))
    }

    pub async fn list_recent(&self) -> Result<Vec<ProjectWithOwner>> {
        Projects::find()
            .find_also_related(Users)
            .order_by_desc(projects::Column::CreatedAt)
            .order_by_desc(projects::Column::Id)
            .all(&self.conn)
            .await
            .context("Failed to list projects")
    }

    pub async fn list_for_owners(&self, owner_ids: Vec<i32>) -> Result<Vec<ProjectWithOwner>> {
        Projects::find()
            .filter(projects::Column::UserId.is_in(owner_ids))
            .find_also_related(Users)
            .order_by_desc(projects::Column::CreatedAt)
            .order_by_desc(projects::Column::Id)
            .all(&self.conn)
            .await
            .context("Failed to list projects for owners")
    }
}
