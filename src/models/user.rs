use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::entities::users;

/// User data handed to services and templates (never carries the password hash).
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub about_me: Option<String>,
    pub last_seen: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<users::Model> for User {
    fn from(model: users::Model) -> Self {
        Self {
            id: model.id,
            username: model.username,
            email: model.email,
            about_me: model.about_me,
            last_seen: model.last_seen,
            created_at: model.created_at,
        }
    }
}

/// Everything the profile page shows about one user, relative to the viewer.
#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    pub user: User,
    pub last_seen: Option<String>,
    pub followers: u64,
    pub following: u64,
    pub is_self: bool,
    pub is_following: bool,
}

#[must_use]
pub fn display_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M UTC").to_string()
}
