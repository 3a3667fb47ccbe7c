use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{FormError, FormErrors};
use crate::db::Store;
use crate::models::user::User;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub username: String,
    pub about_me: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct EditProfileForm {
    #[validate(length(min = 1, max = 64, message = "Username must be between 1 and 64 characters."))]
    pub username: String,

    #[validate(length(max = 140, message = "Field cannot be longer than 140 characters."))]
    pub about_me: String,
}

impl EditProfileForm {
    #[must_use]
    pub fn from_user(user: &User) -> Self {
        Self {
            username: user.username.clone(),
            about_me: user.about_me.clone().unwrap_or_default(),
        }
    }

    /// Username must stay unique unless it is unchanged.
    pub async fn clean(
        &self,
        store: &Store,
        original_username: &str,
    ) -> Result<ProfileUpdate, FormError> {
        let form = Self {
            username: self.username.trim().to_string(),
            about_me: self.about_me.trim().to_string(),
        };
        let mut errors = FormErrors::from_result(form.validate());
        let username = form.username.as_str();

        if !errors.has("username")
            && username != original_username
            && store.username_exists(username).await?
        {
            errors.add("username", "Please use a different username.");
        }

        let about_me = form.about_me.as_str();
        errors.finish(ProfileUpdate {
            username: username.to_string(),
            about_me: (!about_me.is_empty()).then(|| about_me.to_string()),
        })
    }
}
