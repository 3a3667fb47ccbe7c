use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};

use crate::entities::{prelude::*, todos};
use crate::models::project::TodoInput;

pub struct TodoRepository {
    conn: DatabaseConnection,
}

impl TodoRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn add(&self, project_id: i32, input: &TodoInput) -> Result<todos::Model> {
        let active = todos::ActiveModel {
            task: Set(input.task.clone()),
            edate: Set(input.edate),
            is_done: Set(input.is_done),
            project_id: Set(project_id),
            ..Default::default()
        };

        active
            .insert(&self.conn)
            .await
            .context("Failed to insert todo")
    }

    pub async fn get(&self, id: i32) -> Result<Option<todos::Model>> {
        Todos::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query todo")
    }

    /// Flips `is_done` and returns the updated row.
    pub async fn toggle(&self, todo: todos::Model) -> Result<todos::Model> {
        let done = todo.is_done;
        let mut active: todos::ActiveModel = todo.into();
        active.is_done = Set(!done);

        active
            .update(&self.conn)
            .await
            .context("Failed to toggle todo")
    }

    /// Soonest deadline first.
    pub async fn list_for_project(&self, project_id: i32) -> Result<Vec<todos::Model>> {
        Todos::find()
            .filter(todos::Column::ProjectId.eq(project_id))
            .order_by_asc(todos::Column::Edate)
            .order_by_asc(todos::Column::Id)
            .all(&self.conn)
            .await
            .context("Failed to list todos")
    }
}
