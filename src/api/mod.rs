use axum::{
    Router,
    http::HeaderValue,
    middleware,
    routing::{delete, get, post, put},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};

use crate::config::Config;
use crate::state::SharedState;

mod assets;
pub mod auth;
mod cron;
mod error;
mod observability;
mod projects;
mod scans;
mod system;
pub mod types;

pub use error::ApiError;
pub use types::*;

use tokio::sync::RwLock;

pub use crate::domain::events::NotificationEvent;

use crate::services::{AssetService, AuthService, CronService, ProjectService, ScanDispatcher};
use metrics_exporter_prometheus::PrometheusHandle;

#[derive(Clone)]
pub struct AppState {
    pub shared: Arc<SharedState>,

    pub start_time: std::time::Instant,

    pub prometheus_handle: Option<PrometheusHandle>,
}

impl AppState {
    #[must_use]
    pub fn config(&self) -> &Arc<RwLock<Config>> {
        &self.shared.config
    }

    #[must_use]
    pub fn store(&self) -> &crate::db::Store {
        &self.shared.store
    }

    #[must_use]
    pub fn event_bus(&self) -> &tokio::sync::broadcast::Sender<NotificationEvent> {
        &self.shared.event_bus
    }

    #[must_use]
    pub fn auth_service(&self) -> &Arc<dyn AuthService> {
        &self.shared.auth_service
    }

    #[must_use]
    pub fn project_service(&self) -> &Arc<dyn ProjectService> {
        &self.shared.project_service
    }

    #[must_use]
    pub fn asset_service(&self) -> &Arc<dyn AssetService> {
        &self.shared.asset_service
    }

    #[must_use]
    pub fn cron_service(&self) -> &Arc<dyn CronService> {
        &self.shared.cron_service
    }

    #[must_use]
    pub fn dispatcher(&self) -> &ScanDispatcher {
        &self.shared.dispatcher
    }
}

#[must_use]
pub fn create_app_state(
    shared: Arc<SharedState>,
    prometheus_handle: Option<PrometheusHandle>,
) -> Arc<AppState> {
    Arc::new(AppState {
        shared,
        start_time: std::time::Instant::now(),
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

pub async fn router(state: Arc<AppState>) -> Router {
    let (cors_origins, secure_cookies, inactivity_minutes) = {
        let config = state.config().read().await;
        (
            config.server.cors_allowed_origins.clone(),
            config.server.secure_cookies,
            config.server.session_inactivity_minutes,
        )
    };

    let protected_routes = create_protected_router(state.clone());

    let session_store = MemoryStore::default();
    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(secure_cookies)
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::minutes(
            inactivity_minutes.max(1),
        )));

    let api_router = Router::new()
        .merge(protected_routes)
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/system/health/live", get(system::health_live))
        .route("/system/health/ready", get(system::health_ready))
        .layer(session_layer)
        .with_state(state.clone());

    let cors_layer = if cors_origins.iter().any(|o| o == "*") {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> =
            cors_origins.iter().filter_map(|s| s.parse().ok()).collect();
        CorsLayer::new().allow_origin(origins)
    };

    Router::new()
        .nest("/api", api_router)
        .layer(cors_layer.allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(observability::logging_middleware))
}

fn create_protected_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/me", get(auth::get_current_user))
        .route("/auth/password", put(auth::change_password))
        .route("/auth/api-key/regenerate", post(auth::regenerate_api_key))
        .route("/auth/user", delete(auth::delete_user))
        .route("/projects", get(projects::list_projects))
        .route("/projects", post(projects::create_project))
        .route("/projects/{id}", get(projects::get_project))
        .route("/projects/{id}", delete(projects::delete_project))
        .route("/projects/{id}/name", put(projects::rename_project))
        .route("/projects/{id}/hosts", post(assets::merge_host))
        .route("/projects/{id}/domains", post(assets::merge_domain))
        .route("/projects/{id}/scans", get(projects::scan_history))
        .route("/projects/{id}/scans/nmap", post(scans::scan_nmap))
        .route("/projects/{id}/scans/masscan", post(scans::scan_masscan))
        .route("/projects/{id}/cron", get(cron::list_tasks))
        .route("/projects/{id}/cron", post(cron::create_task))
        .route("/hosts/{id}", delete(assets::delete_host))
        .route("/hosts/{id}/note", get(assets::get_host_note))
        .route("/hosts/{id}/note", put(assets::update_host_note))
        .route("/hosts/{id}/style", put(assets::set_host_style))
        .route("/ports/{id}/note", get(assets::get_port_note))
        .route("/ports/{id}/note", put(assets::update_port_note))
        .route("/domains/{id}", delete(assets::delete_domain))
        .route("/domains/{id}/note", get(assets::get_domain_note))
        .route("/domains/{id}/note", put(assets::update_domain_note))
        .route("/domains/{id}/style", put(assets::set_domain_style))
        .route("/cron/{id}", delete(cron::delete_task))
        .route("/cron/{id}/status", put(cron::set_task_status))
        .route("/system/status", get(system::get_status))
        .route("/system/logs", get(system::get_logs))
        .route("/metrics", get(observability::get_metrics))
        .route_layer(middleware::from_fn_with_state(state, auth::auth_middleware))
}
