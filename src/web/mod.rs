use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tower_sessions::{ExpiredDeletion, Expiry, SessionManagerLayer};
use tower_sessions_sqlx_store::SqliteStore;
use tracing::error;

use crate::config::Config;
use crate::mail::Mailer;
use crate::state::SharedState;

mod assets;
pub mod auth;
mod error;
mod files;
pub mod flash;
mod observability;
mod pages;
mod projects;
mod users;

pub use auth::CurrentUser;
pub use error::WebError;

use crate::services::{AuthService, ProjectService, UserService};
use metrics_exporter_prometheus::PrometheusHandle;

#[derive(Clone)]
pub struct AppState {
    pub shared: Arc<SharedState>,

    pub prometheus_handle: Option<PrometheusHandle>,
}

impl AppState {
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    #[must_use]
    pub fn store(&self) -> &crate::db::Store {
        &self.shared.store
    }

    #[must_use]
    pub fn templates(&self) -> &crate::templates::Templates {
        &self.shared.templates
    }

    #[must_use]
    pub fn files(&self) -> &crate::storage::FileStore {
        &self.shared.files
    }

    #[must_use]
    pub fn auth(&self) -> &Arc<dyn AuthService> {
        &self.shared.auth_service
    }

    #[must_use]
    pub fn users(&self) -> &Arc<dyn UserService> {
        &self.shared.user_service
    }

    #[must_use]
    pub fn projects(&self) -> &Arc<dyn ProjectService> {
        &self.shared.project_service
    }
}

#[must_use]
pub fn create_app_state(
    shared: Arc<SharedState>,
    prometheus_handle: Option<PrometheusHandle>,
) -> Arc<AppState> {
    Arc::new(AppState {
        shared,
        prometheus_handle,
    })
}

pub async fn create_app_state_from_config(
    config: Config,
    prometheus_handle: Option<PrometheusHandle>,
) -> anyhow::Result<Arc<AppState>> {
    let shared = Arc::new(SharedState::new(config).await?);
    Ok(create_app_state(shared, prometheus_handle))
}

/// Same as [`create_app_state_from_config`] but delivering mail through `mailer`.
pub async fn create_app_state_with_mailer(
    config: Config,
    mailer: Arc<dyn Mailer>,
) -> anyhow::Result<Arc<AppState>> {
    let shared = Arc::new(SharedState::with_mailer(config, mailer).await?);
    Ok(create_app_state(shared, None))
}

pub async fn router(state: Arc<AppState>) -> anyhow::Result<Router> {
    let server = state.config().server.clone();

    let session_store = SqliteStore::new(state.store().sqlite_pool().clone());
    session_store.migrate().await?;

    let deletion_store = session_store.clone();
    tokio::spawn(async move {
        if let Err(e) = deletion_store
            .continuously_delete_expired(tokio::time::Duration::from_secs(60))
            .await
        {
            error!("Expired session cleanup stopped: {e}");
        }
    });

    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(server.secure_cookies)
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::minutes(
            server.session_inactivity_minutes,
        )));

    let protected_routes = create_protected_router(state.clone());

    Ok(Router::new()
        .merge(protected_routes)
        .route("/login", get(auth::login_page).post(auth::login))
        .route("/logout", get(auth::logout))
        .route("/register", get(auth::register_page).post(auth::register))
        .route(
            "/reset_password_request",
            get(auth::reset_request_page).post(auth::reset_request),
        )
        .route(
            "/reset_password/{token}",
            get(auth::reset_password_page).post(auth::reset_password),
        )
        .route("/static/{*path}", get(assets::serve_asset))
        .fallback(error::not_found)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            error::render_error_pages,
        ))
        .layer(session_layer)
        .layer(DefaultBodyLimit::max(server.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(observability::security_headers_middleware))
        .layer(middleware::from_fn(observability::logging_middleware))
        .with_state(state))
}

fn create_protected_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(projects::index))
        .route("/index", get(projects::index))
        .route("/explore", get(projects::explore))
        .route("/user/{username}", get(users::profile))
        .route(
            "/edit_profile",
            get(users::edit_profile_page).post(users::edit_profile),
        )
        .route("/follow/{username}", post(users::follow))
        .route("/unfollow/{username}", post(users::unfollow))
        .route(
            "/projects/new",
            get(projects::new_project_page).post(projects::create_project),
        )
        .route(
            "/projects/{id}",
            get(projects::view_project).post(projects::submit_project_form),
        )
        .route(
            "/projects/{id}/edit",
            get(projects::edit_project_page).post(projects::update_project),
        )
        .route("/projects/{id}/delete", post(projects::delete_project))
        .route("/todos/{id}", post(projects::toggle_todo))
        .route("/download_file/{file}", get(files::download_file))
        .route("/metrics", get(observability::get_metrics))
        .route_layer(middleware::from_fn_with_state(state, auth::require_login))
}
