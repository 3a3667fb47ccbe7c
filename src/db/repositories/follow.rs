use anyhow::{Context, Result};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, Set,
    sea_query::OnConflict,
};

use crate::entities::{followers, prelude::*};

pub struct FollowRepository {
    conn: DatabaseConnection,
}

impl FollowRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Returns `false` when the edge already existed.
    pub async fn follow(&self, follower_id: i32, followed_id: i32) -> Result<bool> {
        let edge = followers::ActiveModel {
            follower_id: Set(follower_id),
            followed_id: Set(followed_id),
        };

        let inserted = Followers::insert(edge)
            .on_conflict(
                OnConflict::columns([
                    followers::Column::FollowerId,
                    followers::Column::FollowedId,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(&self.conn)
            .await
            .context("Failed to insert follow edge")?;

        Ok(inserted > 0)
    }

    /// Returns `false` when there was nothing to remove.
    pub async fn unfollow(&self, follower_id: i32, followed_id: i32) -> Result<bool> {
        let res = Followers::delete_many()
            .filter(followers::Column::FollowerId.eq(follower_id))
            .filter(followers::Column::FollowedId.eq(followed_id))
            .exec(&self.conn)
            .await
            .context("Failed to delete follow edge")?;

        Ok(res.rows_affected > 0)
    }

    pub async fn is_following(&self, follower_id: i32, followed_id: i32) -> Result<bool> {
        let edge = Followers::find_by_id((follower_id, followed_id))
            .one(&self.conn)
            .await
            .context("Failed to query follow edge")?;

        Ok(edge.is_some())
    }

    pub async fn follower_count(&self, user_id: i32) -> Result<u64> {
        Followers::find()
            .filter(followers::Column::FollowedId.eq(user_id))
            .count(&self.conn)
            .await
            .context("Failed to count followers")
    }

    pub async fn following_count(&self, user_id: i32) -> Result<u64> {
        Followers::find()
            .filter(followers::Column::FollowerId.eq(user_id))
            .count(&self.conn)
            .await
            .context("Failed to count followed users")
    }

    pub async fn followed_ids(&self, user_id: i32) -> Result<Vec<i32>> {
        let rows = Followers::find()
            .filter(followers::Column::FollowerId.eq(user_id))
            .all(&self.conn)
            .await
            .context("Failed to list followed users")?;

        Ok(rows.into_iter().map(|f| f.followed_id).collect())
    }
}
