//! One-shot messages carried across a redirect in the session.

use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use super::WebError;

const FLASH_KEY: &str = "_flashes";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub category: String,
    pub message: String,
}

pub async fn push(session: &Session, category: &str, message: impl Into<String>) -> Result<(), WebError> {
    let mut flashes: Vec<Flash> = session.get(FLASH_KEY).await?.unwrap_or_default();
    flashes.push(Flash {
        category: category.to_string(),
        message: message.into(),
    });
    session.insert(FLASH_KEY, flashes).await?;
    Ok(())
}

pub async fn success(session: &Session, message: impl Into<String>) -> Result<(), WebError> {
    push(session, "success", message).await
}

pub async fn info(session: &Session, message: impl Into<String>) -> Result<(), WebError> {
    push(session, "info", message).await
}

pub async fn danger(session: &Session, message: impl Into<String>) -> Result<(), WebError> {
    push(session, "danger", message).await
}

/// Removes and returns everything queued so far.
pub async fn take(session: &Session) -> Result<Vec<Flash>, WebError> {
    Ok(session
        .remove::<Vec<Flash>>(FLASH_KEY)
        .await?
        .unwrap_or_default())
}
