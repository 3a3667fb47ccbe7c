//! `SeaORM` implementation of the `UserService` trait.

use async_trait::async_trait;
use tracing::info;

use crate::db::{Store, is_unique_violation};
use crate::forms::{EditProfileForm, FormErrors};
use crate::models::user::{User, UserProfile, display_timestamp};
use crate::services::user_service::{UserError, UserService};

pub struct SeaOrmUserService {
    store: Store,
}

impl SeaOrmUserService {
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }

    async fn find(&self, username: &str) -> Result<User, UserError> {
        self.store
            .get_user_by_username(username)
            .await?
            .ok_or_else(|| UserError::NotFound(username.to_string()))
    }
}

#[async_trait]
impl UserService for SeaOrmUserService {
    async fn get(&self, id: i32) -> Result<Option<User>, UserError> {
        Ok(self.store.get_user(id).await?)
    }

    async fn touch(&self, id: i32) -> Result<(), UserError> {
        Ok(self.store.touch_last_seen(id).await?)
    }

    async fn profile(&self, viewer: &User, username: &str) -> Result<UserProfile, UserError> {
        let user = self.find(username).await?;
        let is_self = user.id == viewer.id;

        let is_following = if is_self {
            false
        } else {
            self.store.is_following(viewer.id, user.id).await?
        };

        Ok(UserProfile {
            last_seen: user.last_seen.as_ref().map(display_timestamp),
            followers: self.store.follower_count(user.id).await?,
            following: self.store.following_count(user.id).await?,
            is_self,
            is_following,
            user,
        })
    }

    async fn update_profile(
        &self,
        user: &User,
        form: &EditProfileForm,
    ) -> Result<User, UserError> {
        let update = form.clean(&self.store, &user.username).await?;

        let updated = self
            .store
            .update_user_profile(user.id, &update.username, update.about_me)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    let mut errors = FormErrors::new();
                    errors.add("username", "Please use a different username.");
                    UserError::Validation(errors)
                } else {
                    e.into()
                }
            })?;

        info!(user_id = user.id, "Profile updated");
        Ok(updated)
    }

    async fn follow(&self, viewer: &User, username: &str) -> Result<User, UserError> {
        let target = self.find(username).await?;
        if target.id == viewer.id {
            return Err(UserError::SelfFollow);
        }

        if self.store.follow(viewer.id, target.id).await? {
            info!(follower = viewer.id, followed = target.id, "Follow added");
        }
        Ok(target)
    }

    async fn unfollow(&self, viewer: &User, username: &str) -> Result<User, UserError> {
        let target = self.find(username).await?;
        if target.id == viewer.id {
            return Err(UserError::SelfUnfollow);
        }

        if self.store.unfollow(viewer.id, target.id).await? {
            info!(follower = viewer.id, followed = target.id, "Follow removed");
        }
        Ok(target)
    }
}
