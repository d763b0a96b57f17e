use std::sync::Arc;
use tokio::sync::{RwLock, broadcast};

use crate::config::Config;
use crate::db::Store;
use crate::domain::events::NotificationEvent;
use crate::services::{
    AssetService, AuthService, CronService, LogService, MarkdownRenderer, ProjectService,
    ScanDispatcher, SeaOrmAssetService, SeaOrmAuthService, SeaOrmCronService,
    SeaOrmProjectService,
};
use crate::tools::ToolRegistry;

#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<RwLock<Config>>,

    pub store: Store,

    pub event_bus: broadcast::Sender<NotificationEvent>,

    pub log_service: Arc<LogService>,

    pub tools: ToolRegistry,

    pub dispatcher: ScanDispatcher,

    pub auth_service: Arc<dyn AuthService>,

    pub project_service: Arc<dyn ProjectService>,

    pub asset_service: Arc<dyn AssetService>,

    pub cron_service: Arc<dyn CronService>,
}

impl SharedState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let tools = ToolRegistry::from_config(&config.tools);
        Self::with_tools(config, tools).await
    }

    /// Builds the state around a caller-supplied tool registry.
    pub async fn with_tools(config: Config, tools: ToolRegistry) -> anyhow::Result<Self> {
        let (event_bus, _) = broadcast::channel(config.general.event_bus_buffer_size.max(1));

        let store = Store::with_pool_options(
            &config.general.database_path,
            config.general.max_db_connections,
            config.general.min_db_connections,
        )
        .await?;

        let log_service = Arc::new(LogService::new(store.clone(), event_bus.clone()));
        log_service.clone().start_listener();

        let asset_service = Arc::new(SeaOrmAssetService::new(
            store.clone(),
            Arc::new(MarkdownRenderer),
        )) as Arc<dyn AssetService + Send + Sync + 'static>;

        let dispatcher = ScanDispatcher::start(
            store.clone(),
            asset_service.clone(),
            tools.clone(),
            event_bus.clone(),
            config.dispatch.max_concurrent_scans,
            config.dispatch.queue_capacity,
        );

        let project_service = Arc::new(SeaOrmProjectService::new(store.clone()))
            as Arc<dyn ProjectService + Send + Sync + 'static>;

        let cron_service = Arc::new(SeaOrmCronService::new(
            store.clone(),
            dispatcher.clone(),
            event_bus.clone(),
        )) as Arc<dyn CronService + Send + Sync + 'static>;

        let auth_service = Arc::new(SeaOrmAuthService::new(
            store.clone(),
            config.security.clone(),
            config.server.allow_registration,
        )) as Arc<dyn AuthService + Send + Sync + 'static>;

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            store,
            event_bus,
            log_service,
            tools,
            dispatcher,
            auth_service,
            project_service,
            asset_service,
            cron_service,
        })
    }

    pub async fn config(&self) -> Config {
        self.config.read().await.clone()
    }
}
