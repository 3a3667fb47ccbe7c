use anyhow::{Context, Result};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};

use crate::entities::{comments, prelude::*, users};

pub struct CommentRepository {
    conn: DatabaseConnection,
}

impl CommentRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn add(&self, user_id: i32, project_id: i32, body: &str) -> Result<comments::Model> {
        let active = comments::ActiveModel {
            body: Set(body.to_string()),
            user_id: Set(user_id),
            project_id: Set(project_id),
            created_at: Set(Utc::now()),
            ..Default::default()
        };

        active
            .insert(&self.conn)
            .await
            .context("Failed to insert comment")
    }

    /// Oldest first, with the author of each comment.
    pub async fn list_for_project(
        &self,
        project_id: i32,
    ) -> Result<Vec<(comments::Model, Option<users::Model>)>> {
        Comments::find()
            .filter(comments::Column::ProjectId.eq(project_id))
            .find_also_related(Users)
            .order_by_asc(comments::Column::CreatedAt)
            .order_by_asc(comments::Column::Id)
            .all(&self.conn)
            .await
            .context("Failed to list comments")
    }
}
