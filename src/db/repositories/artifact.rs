use anyhow::{Context, Result};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};

use crate::entities::{artifacts, prelude::*};

pub struct ArtifactRepository {
    conn: DatabaseConnection,
}

impl ArtifactRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn add(&self, project_id: i32, name: &str, file: &str) -> Result<artifacts::Model> {
        let active = artifacts::ActiveModel {
            name: Set(name.to_string()),
            file: Set(file.to_string()),
            project_id: Set(project_id),
            created_at: Set(Utc::now()),
            ..Default::default()
        };

        active
            .insert(&self.conn)
            .await
            .context("Failed to insert artifact")
    }

    pub async fn list_for_project(&self, project_id: i32) -> Result<Vec<artifacts::Model>> {
        Artifacts::find()
            .filter(artifacts::Column::ProjectId.eq(project_id))
            .order_by_asc(artifacts::Column::CreatedAt)
            .order_by_asc(artifacts::Column::Id)
            .all(&self.conn)
            .await
            .context("Failed to list artifacts")
    }
}
