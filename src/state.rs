use std::sync::Arc;

use crate::config::Config;
use crate::db::Store;
use crate::mail::{self, Mailer};
use crate::services::{
    AuthService, ProjectService, SeaOrmAuthService, SeaOrmProjectService, SeaOrmUserService,
    UserService,
};
use crate::storage::FileStore;
use crate::templates::Templates;

#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<Config>,

    pub store: Store,

    pub templates: Arc<Templates>,

    pub files: FileStore,

    pub auth_service: Arc<dyn AuthService>,

    pub user_service: Arc<dyn UserService>,

    pub project_service: Arc<dyn ProjectService>,
}

impl SharedState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let mailer = mail::from_config(&config.mail)?;
        Self::with_mailer(config, mailer).await
    }

    /// Builds the state around a caller-supplied mailer.
    pub async fn with_mailer(config: Config, mailer: Arc<dyn Mailer>) -> anyhow::Result<Self> {
        let store = Store::with_pool_options(
            &config.general.database_url,
            config.general.max_db_connections,
            config.general.min_db_connections,
        )
        .await?;

        let templates = Arc::new(Templates::load()?);
        let files = FileStore::new(&config.uploads);
        let config = Arc::new(config);

        let auth_service = Arc::new(SeaOrmAuthService::new(
            store.clone(),
            config.clone(),
            templates.clone(),
            mailer,
        )) as Arc<dyn AuthService + Send + Sync + 'static>;

        let user_service = Arc::new(SeaOrmUserService::new(store.clone()))
            as Arc<dyn UserService + Send + Sync + 'static>;

        let project_service = Arc::new(SeaOrmProjectService::new(store.clone(), files.clone()))
            as Arc<dyn ProjectService + Send + Sync + 'static>;

        Ok(Self {
            config,
            store,
            templates,
            files,
            auth_service,
            user_service,
            project_service,
        })
    }
}
