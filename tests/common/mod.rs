#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode},
};
use http_body_util::BodyExt;
use scopewatch::config::Config;
use scopewatch::domain::{Discovery, ScanTool};
use scopewatch::state::SharedState;
use scopewatch::tools::{ToolError, ToolRegistry, ToolRunner};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;
use tower::ServiceExt;

pub const PASSWORD: &str = "correct horse battery";

pub fn test_config() -> Config {
    let mut config = Config::default();
    let path = std::env::temp_dir().join(format!("scopewatch-{}.db", uuid::Uuid::new_v4()));
    config.general.database_path = format!("sqlite:{}?mode=rwc", path.display());
    config.server.secure_cookies = false;
    config.scheduler.enabled = false;
    config.security.argon2_memory_cost_kib = 1024;
    config.security.argon2_time_cost = 1;
    config
}

pub struct TestApp {
    pub router: Router,
    pub shared: Arc<SharedState>,
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(test_config(), None).await
}

/// Builds the app; `tools` replaces the binaries from the config.
pub async fn spawn_app_with(config: Config, tools: Option<ToolRegistry>) -> TestApp {
    let shared = match tools {
        Some(tools) => SharedState::with_tools(config, tools).await,
        None => SharedState::new(config).await,
    }
    .expect("Failed to create shared state");
    let shared = Arc::new(shared);

    let state = scopewatch::api::create_app_state(shared.clone(), None);
    let router = scopewatch::api::router(state).await;

    TestApp { router, shared }
}

impl TestApp {
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        api_key: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(key) = api_key {
            builder = builder.header("X-Api-Key", key);
        }
        let request = match body {
            Some(json) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str, key: &str) -> (StatusCode, Value) {
        self.request(Method::GET, uri, Some(key), None).await
    }

    pub async fn post(&self, uri: &str, key: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, Some(key), Some(body)).await
    }

    pub async fn put(&self, uri: &str, key: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::PUT, uri, Some(key), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, key: &str) -> (StatusCode, Value) {
        self.request(Method::DELETE, uri, Some(key), None).await
    }

    /// Registers `username` and returns its API key.
    pub async fn register(&self, username: &str) -> String {
        let (status, body) = self
            .request(
                Method::POST,
                "/api/auth/register",
                None,
                Some(serde_json::json!({ "username": username, "password": PASSWORD })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "register failed: {body}");
        body["api_key"].as_str().unwrap().to_string()
    }

    pub async fn create_project(&self, key: &str, name: &str) -> String {
        let (status, body) = self
            .post("/api/projects", key, serde_json::json!({ "name": name }))
            .await;
        assert_eq!(status, StatusCode::OK, "create project failed: {body}");
        body["id"].as_str().unwrap().to_string()
    }

    /// Polls the scan run until it leaves the queued/running states.
    pub async fn wait_for_run(&self, run_id: &str) -> scopewatch::entities::scan_runs::Model {
        for _ in 0..200 {
            let run = self
                .shared
                .store
                .get_scan_run(run_id)
                .await
                .unwrap()
                .expect("scan run exists");
            if run.status == "succeeded" || run.status == "failed" {
                return run;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        panic!("scan run {run_id} did not finish");
    }
}

/// A runner that records its targets and answers with canned discoveries.
pub struct FakeRunner {
    tool: ScanTool,
    installed: bool,
    discoveries: Vec<Discovery>,
    pub calls: Mutex<Vec<Vec<String>>>,
    gate: Option<Arc<Semaphore>>,
    pub started: Arc<Semaphore>,
}

impl FakeRunner {
    pub fn new(tool: ScanTool, discoveries: Vec<Discovery>) -> Self {
        Self {
            tool,
            installed: true,
            discoveries,
            calls: Mutex::new(Vec::new()),
            gate: None,
            started: Arc::new(Semaphore::new(0)),
        }
    }

    pub fn missing(tool: ScanTool) -> Self {
        Self {
            installed: false,
            ..Self::new(tool, Vec::new())
        }
    }

    /// Each run waits for one permit on `gate` before returning.
    pub fn gated(tool: ScanTool, gate: Arc<Semaphore>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::new(tool, Vec::new())
        }
    }

    pub fn recorded_targets(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ToolRunner for FakeRunner {
    fn tool(&self) -> ScanTool {
        self.tool
    }

    fn check_installed(&self) -> Result<(), ToolError> {
        if self.installed {
            Ok(())
        } else {
            Err(ToolError::NotInstalled(format!("Invalid {} path", self.tool)))
        }
    }

    async fn run(&self, targets: &[String]) -> anyhow::Result<Vec<Discovery>> {
        self.calls.lock().unwrap().push(targets.to_vec());
        self.started.add_permits(1);
        if let Some(gate) = &self.gate {
            gate.acquire().await?.forget();
        }
        Ok(self.discoveries.clone())
    }
}

pub fn registry(
    nmap: Arc<FakeRunner>,
    masscan: Arc<FakeRunner>,
    subdomains: Arc<FakeRunner>,
) -> ToolRegistry {
    ToolRegistry::new(nmap, masscan, subdomains)
}
