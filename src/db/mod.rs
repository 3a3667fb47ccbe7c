use crate::config::SecurityConfig;
use crate::entities::{comments, projects, todos, users};
use crate::models::project::{ProjectInput, TodoInput};
use crate::models::user::User;
use anyhow::Result;
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr, SqlErr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

pub mod migrator;
pub mod repositories;

pub use crate::entities::artifacts::Model as Artifact;
pub use repositories::project::ProjectWithOwner;

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        if let Some(path) = sqlite_file_path(db_url) {
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !path.exists() {
                std::fs::File::create(&path)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    /// The underlying SQLx pool, shared with the session store.
    #[must_use]
    pub fn sqlite_pool(&self) -> &sea_orm::sqlx::SqlitePool {
        self.conn.get_sqlite_connection_pool()
    }

    fn user_repo(&self) -> repositories::user::UserRepository {
        repositories::user::UserRepository::new(self.conn.clone())
    }

    fn follow_repo(&self) -> repositories::follow::FollowRepository {
        repositories::follow::FollowRepository::new(self.conn.clone())
    }

    fn project_repo(&self) -> repositories::project::ProjectRepository {
        repositories::project::ProjectRepository::new(self.conn.clone())
    }

    fn comment_repo(&self) -> repositories::comment::CommentRepository {
        repositories::comment::CommentRepository::new(self.conn.clone())
    }

    fn todo_repo(&self) -> repositories::todo::TodoRepository {
        repositories::todo::TodoRepository::new(self.conn.clone())
    }

    fn artifact_repo(&self) -> repositories::artifact::ArtifactRepository {
        repositories::artifact::ArtifactRepository::new(self.conn.clone())
    }

    // ========== Users ==========

    pub async fn create_user(
        &self,
        username: &str,
        email: &str,
        password: &str,
        security: &SecurityConfig,
    ) -> Result<User> {
        self.user_repo()
            .create(username, email, password, security)
            .await
    }

    pub async fn get_user(&self, id: i32) -> Result<Option<User>> {
        self.user_repo().get_by_id(id).await
    }

    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        self.user_repo().get_by_username(username).await
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.user_repo().get_by_email(email).await
    }

    pub async fn username_exists(&self, username: &str) -> Result<bool> {
        self.user_repo().username_exists(username).await
    }

    pub async fn email_exists(&self, email: &str) -> Result<bool> {
        self.user_repo().email_exists(email).await
    }

    pub async fn verify_user_password(&self, username: &str, password: &str) -> Result<Option<User>> {
        self.user_repo().verify_password(username, password).await
    }

    pub async fn update_user_password(
        &self,
        user_id: i32,
        new_password: &str,
        security: &SecurityConfig,
    ) -> Result<()> {
        self.user_repo()
            .update_password(user_id, new_password, security)
            .await
    }

    pub async fn update_user_profile(
        &self,
        user_id: i32,
        username: &str,
        about_me: Option<String>,
    ) -> Result<User> {
        self.user_repo()
            .update_profile(user_id, username, about_me)
            .await
    }

    pub async fn touch_last_seen(&self, user_id: i32) -> Result<()> {
        self.user_repo().touch_last_seen(user_id).await
    }

    // ========== Follows ==========

    pub async fn follow(&self, follower_id: i32, followed_id: i32) -> Result<bool> {
        self.follow_repo().follow(follower_id, followed_id).await
    }

    pub async fn unfollow(&self, follower_id: i32, followed_id: i32) -> Result<bool> {
        self.follow_repo().unfollow(follower_id, followed_id).await
    }

    pub async fn is_following(&self, follower_id: i32, followed_id: i32) -> Result<bool> {
        self.follow_repo().is_following(follower_id, followed_id).await
    }

    pub async fn follower_count(&self, user_id: i32) -> Result<u64> {
        self.follow_repo().follower_count(user_id).await
    }

    pub async fn following_count(&self, user_id: i32) -> Result<u64> {
        self.follow_repo().following_count(user_id).await
    }

    pub async fn followed_ids(&self, user_id: i32) -> Result<Vec<i32>> {
        self.follow_repo().followed_ids(user_id).await
    }

    // ========== Projects ==========

    pub async fn create_project(&self, owner_id: i32, input: &ProjectInput) -> Result<projects::Model> {
        self.project_repo().create(owner_id, input).await
    }

    pub async fn get_project(&self, id: i32) -> Result<Option<projects::Model>> {
        self.project_repo().get(id).await
    }

    pub async fn get_project_with_owner(&self, id: i32) -> Result<Option<ProjectWithOwner>> {
        self.project_repo().get_with_owner(id).await
    }

    pub async fn project_title_taken(&self, owner_id: i32, title: &str) -> Result<bool> {
        self.project_repo().title_taken(owner_id, title).await
    }

    pub async fn update_project(&self, id: i32, input: &ProjectInput) -> Result<projects::Model> {
        self.project_repo().update(id, input).await
    }

    pub async fn delete_project(&self, id: i32) -> Result<Option<Vec<String>>> {
        self.project_repo().delete(id).await
    }

    pub async fn list_recent_projects(&self) -> Result<Vec<ProjectWithOwner>> {
        self.project_repo().list_recent().await
    }

    pub async fn list_projects_for_owners(&self, owner_ids: Vec<i32>) -> Result<Vec<ProjectWithOwner>> {
        self.project_repo().list_for_owners(owner_ids).await
    }

    // ========== Comments / Todos / Artifacts ==========

    pub async fn add_comment(&self, user_id: i32, project_id: i32, body: &str) -> Result<comments::Model> {
        self.comment_repo().add(user_id, project_id, body).await
    }

    pub async fn list_comments(
        &self,
        project_id: i32,
    ) -> Result<Vec<(comments::Model, Option<users::Model>)>> {
        self.comment_repo().list_for_project(project_id).await
    }

    pub async fn add_todo(&self, project_id: i32, input: &TodoInput) -> Result<todos::Model> {
        self.todo_repo().add(project_id, input).await
    }

    pub async fn get_todo(&self, id: i32) -> Result<Option<todos::Model>> {
        self.todo_repo().get(id).await
    }

    pub async fn toggle_todo(&self, todo: todos::Model) -> Result<todos::Model> {
        self.todo_repo().toggle(todo).await
    }

    pub async fn list_todos(&self, project_id: i32) -> Result<Vec<todos::Model>> {
        self.todo_repo().list_for_project(project_id).await
    }

    pub async fn add_artifact(&self, project_id: i32, name: &str, file: &str) -> Result<Artifact> {
        self.artifact_repo().add(project_id, name, file).await
    }

    pub async fn list_artifacts(&self, project_id: i32) -> Result<Vec<Artifact>> {
        self.artifact_repo().list_for_project(project_id).await
    }
}

/// Driver message of a unique-constraint violation in the error chain. It names
/// the offending column, e.g. `UNIQUE constraint failed: users.email`.
#[must_use]
pub fn unique_violation(err: &anyhow::Error) -> Option<String> {
    match err.downcast_ref::<DbErr>().and_then(DbErr::sql_err) {
        Some(SqlErr::UniqueConstraintViolation(message)) => Some(message),
        _ => None,
    }
}

/// True when the error chain holds a database unique-constraint violation.
#[must_use]
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    unique_violation(err).is_some()
}

/// File backing a `sqlite:` URL, or `None` for in-memory databases.
fn sqlite_file_path(db_url: &str) -> Option<PathBuf> {
    let rest = db_url
        .strip_prefix("sqlite://")
        .or_else(|| db_url.strip_prefix("sqlite:"))?;
    let path = rest.split('?').next().unwrap_or_default();

    if path.is_empty() || path == ":memory:" {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlite_file_path() {
        assert_eq!(
            sqlite_file_path("sqlite:data/trackr.db"),
            Some(PathBuf::from("data/trackr.db"))
        );
        assert_eq!(
            sqlite_file_path("sqlite:///tmp/app.db?mode=rwc"),
            Some(PathBuf::from("/tmp/app.db"))
        );
        assert_eq!(sqlite_file_path("sqlite::memory:"), None);
        assert_eq!(sqlite_file_path("postgres://localhost/db"), None);
    }

    #[test]
    fn test_unique_violation_detection() {
        let plain = anyhow::anyhow!("boom");
        assert!(!is_unique_violation(&plain));
        assert_eq!(unique_violation(&plain), None);
    }

    async fn temp_store(dir: &tempfile::TempDir) -> Store {
        let url = format!("sqlite:{}?mode=rwc", dir.path().join("t.db").display());
        Store::new(&url).await.unwrap()
    }

    fn cheap_hashing() -> SecurityConfig {
        SecurityConfig {
            argon2_memory_cost_kib: 1024,
            argon2_time_cost: 1,
            ..SecurityConfig::default()
        }
    }

    #[tokio::test]
    async fn test_duplicate_email_reports_the_email_column() {
        let dir = tempfile::tempdir().unwrap();
        let store = temp_store(&dir).await;
        let security = cheap_hashing();

        store
            .create_user("ana", "ana@example.com", "pw123456", &security)
            .await
            .unwrap();
        let err = store
            .create_user("bob", "ana@example.com", "pw123456", &security)
            .await
            .unwrap_err();

        let message = unique_violation(&err).unwrap();
        assert!(message.contains("email"), "{message}");
    }

    #[tokio::test]
    async fn test_follow_twice_keeps_one_edge() {
        let dir = tempfile::tempdir().unwrap();
        let store = temp_store(&dir).await;
        let security = cheap_hashing();

        let ana = store
            .create_user("ana", "ana@example.com", "pw123456", &security)
            .await
            .unwrap();
        let bob = store
            .create_user("bob", "bob@example.com", "pw123456", &security)
            .await
            .unwrap();

        assert!(store.follow(ana.id, bob.id).await.unwrap());
        assert!(!store.follow(ana.id, bob.id).await.unwrap());
        assert_eq!(store.follower_count(bob.id).await.unwrap(), 1);
        assert!(store.unfollow(ana.id, bob.id).await.unwrap());
        assert!(!store.is_following(ana.id, bob.id).await.unwrap());
    }
}
