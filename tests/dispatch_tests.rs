mod common;

use axum::http::StatusCode;
use common::{FakeRunner, TestApp, registry, spawn_app_with, test_config};
use scopewatch::domain::{Discovery, PortObservation, ScanTool};
use scopewatch::services::CronService;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Semaphore;

struct Tools {
    nmap: Arc<FakeRunner>,
    masscan: Arc<FakeRunner>,
    subdomains: Arc<FakeRunner>,
}

impl Tools {
    fn new(nmap: FakeRunner, masscan: FakeRunner, subdomains: FakeRunner) -> Self {
        Self {
            nmap: Arc::new(nmap),
            masscan: Arc::new(masscan),
            subdomains: Arc::new(subdomains),
        }
    }

    async fn spawn(&self, max_concurrent: usize, queue_capacity: usize) -> TestApp {
        let mut config = test_config();
        config.dispatch.max_concurrent_scans = max_concurrent;
        config.dispatch.queue_capacity = queue_capacity;
        spawn_app_with(
            config,
            Some(registry(
                self.nmap.clone(),
                self.masscan.clone(),
                self.subdomains.clone(),
            )),
        )
        .await
    }
}

fn ssh_on(ip: &str) -> Discovery {
    Discovery::Host {
        ip: ip.to_string(),
        ports: vec![PortObservation {
            port: "22".to_string(),
            service: "ssh".to_string(),
            version: "OpenSSH 9.6".to_string(),
        }],
    }
}

async fn seed_hosts(app: &TestApp, key: &str, project: &str) {
    for ip in ["10.0.0.1", "10.0.0.2"] {
        let (status, _) = app
            .post(
                &format!("/api/projects/{project}/hosts"),
                key,
                json!({ "ip": ip }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, _) = app
        .post(
            &format!("/api/projects/{project}/hosts"),
            key,
            json!({
                "ip": "10.0.0.3",
                "ports": [
                    { "port": "22", "service": "ssh" },
                    { "port": "80", "service": "http" },
                    { "port": "443", "service": "https" }
                ]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_unscanned_strategy_targets_hosts_without_ports() {
    let tools = Tools::new(
        FakeRunner::new(ScanTool::Nmap, vec![ssh_on("10.0.0.1")]),
        FakeRunner::new(ScanTool::Masscan, Vec::new()),
        FakeRunner::new(ScanTool::Subdomains, Vec::new()),
    );
    let app = tools.spawn(2, 8).await;
    let key = app.register("alice").await;
    let project = app.create_project(&key, "Acme").await;
    seed_hosts(&app, &key, &project).await;

    let (status, body) = app
        .post(
            &format!("/api/projects/{project}/scans/nmap"),
            &key,
            json!({ "strategy": "1" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["targets"], 2);
    let run_id = body["run_id"].as_str().unwrap().to_string();

    let run = app.wait_for_run(&run_id).await;
    assert_eq!(run.status, "succeeded");
    assert_eq!(run.hosts_merged, 1);
    assert_eq!(run.strategy.as_deref(), Some("unscanned"));
    assert_eq!(
        tools.nmap.recorded_targets(),
        vec![vec!["10.0.0.1".to_string(), "10.0.0.2".to_string()]]
    );

    let (_, overview) = app.get(&format!("/api/projects/{project}"), &key).await;
    let scanned = overview["hosts"]
        .as_array()
        .unwrap()
        .iter()
        .find(|h| h["ip"] == "10.0.0.1")
        .unwrap();
    assert_eq!(scanned["portsq"], 1);
    assert_eq!(scanned["ports"][0]["version"], "OpenSSH 9.6");

    let unscanned = app
        .shared
        .store
        .target_ips(&project, scopewatch::domain::ScanStrategy::Unscanned)
        .await
        .unwrap();
    assert_eq!(unscanned, vec!["10.0.0.2".to_string()]);

    let (status, body) = app
        .post(
            &format!("/api/projects/{project}/scans/masscan"),
            &key,
            json!({ "strategy": "all" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["targets"], 3);
}

#[tokio::test]
async fn test_scan_request_validation() {
    let tools = Tools::new(
        FakeRunner::new(ScanTool::Nmap, Vec::new()),
        FakeRunner::new(ScanTool::Masscan, Vec::new()),
        FakeRunner::new(ScanTool::Subdomains, Vec::new()),
    );
    let app = tools.spawn(1, 4).await;
    let key = app.register("alice").await;
    let project = app.create_project(&key, "Acme").await;
    let uri = format!("/api/projects/{project}/scans/nmap");

    let (status, body) = app.post(&uri, &key, json!({ "strategy": "1" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["reason"], "No unscanned hosts to scan");

    let (status, body) = app.post(&uri, &key, json!({ "strategy": "2" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["reason"], "No known hosts to scan");

    let (status, body) = app
        .post(&uri, &key, json!({ "strategy": "3", "targets": " " }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["reason"], "Target list is empty");

    let (status, _) = app.post(&uri, &key, json!({ "strategy": "9" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .post(
            &uri,
            &key,
            json!({ "strategy": "3", "targets": "10.0.0.1, example.com" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["reason"], "Invalid target: 'example.com'");

    let (status, body) = app
        .post(
            &uri,
            &key,
            json!({ "strategy": "explicit", "targets": "10.0.0.1, 192.168.10.0/24" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["targets"], 2);
    app.wait_for_run(body["run_id"].as_str().unwrap()).await;

    let (_, history) = app
        .get(&format!("/api/projects/{project}/scans"), &key)
        .await;
    assert_eq!(history["scans"].as_array().unwrap().len(), 1);
    assert!(tools.masscan.recorded_targets().is_empty());
}

#[tokio::test]
async fn test_missing_tool_is_a_configuration_error() {
    let tools = Tools::new(
        FakeRunner::missing(ScanTool::Nmap),
        FakeRunner::new(ScanTool::Masscan, Vec::new()),
        FakeRunner::missing(ScanTool::Subdomains),
    );
    let app = tools.spawn(1, 4).await;
    let key = app.register("alice").await;
    let project = app.create_project(&key, "Acme").await;

    let (status, body) = app
        .post(
            &format!("/api/projects/{project}/scans/nmap"),
            &key,
            json!({ "strategy": "3", "targets": "10.0.0.1" }),
        )
        .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "Invalid nmap path");

    let (status, body) = app
        .post(
            &format!("/api/projects/{project}/cron"),
            &key,
            json!({ "domain": "example.com", "period": 2 }),
        )
        .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "Invalid subdomains path");

    let (_, overview) = app.get(&format!("/api/projects/{project}"), &key).await;
    assert!(overview["scans"].as_array().unwrap().is_empty());
    assert!(overview["cron_tasks"].as_array().unwrap().is_empty());
    assert!(tools.nmap.recorded_targets().is_empty());
}

#[tokio::test]
async fn test_full_queue_rejects_without_blocking() {
    let gate = Arc::new(Semaphore::new(0));
    let tools = Tools::new(
        FakeRunner::gated(ScanTool::Nmap, gate.clone()),
        FakeRunner::new(ScanTool::Masscan, Vec::new()),
        FakeRunner::new(ScanTool::Subdomains, Vec::new()),
    );
    let app = tools.spawn(1, 1).await;
    let key = app.register("alice").await;
    let project = app.create_project(&key, "Acme").await;
    let uri = format!("/api/projects/{project}/scans/nmap");
    let request = json!({ "strategy": "3", "targets": "10.0.0.1" });

    let (status, body) = app.post(&uri, &key, request.clone()).await;
    assert_eq!(status, StatusCode::OK);
    let mut accepted = vec![body["run_id"].as_str().unwrap().to_string()];

    // The first job now holds the only worker slot.
    tools.nmap.started.acquire().await.unwrap().forget();

    let mut rejected = 0;
    for _ in 0..3 {
        let (status, body) = app.post(&uri, &key, request.clone()).await;
        match status {
            StatusCode::OK => accepted.push(body["run_id"].as_str().unwrap().to_string()),
            StatusCode::SERVICE_UNAVAILABLE => {
                assert_eq!(body["status"], "scan queue is full");
                rejected += 1;
            }
            other => panic!("unexpected status {other}: {body}"),
        }
    }
    assert!(rejected >= 1);

    let (_, history) = app
        .get(&format!("/api/projects/{project}/scans"), &key)
        .await;
    let failed: Vec<_> = history["scans"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|s| s["status"] == "failed")
        .collect();
    assert_eq!(failed.len(), rejected);
    assert!(failed.iter().all(|s| s["error"] == "scan queue is full"));

    gate.add_permits(accepted.len());
    for run_id in &accepted {
        assert_eq!(app.wait_for_run(run_id).await.status, "succeeded");
    }
}

#[tokio::test]
async fn test_cron_create_on_full_queue_keeps_no_task() {
    let gate = Arc::new(Semaphore::new(0));
    let tools = Tools::new(
        FakeRunner::new(ScanTool::Nmap, Vec::new()),
        FakeRunner::new(ScanTool::Masscan, Vec::new()),
        FakeRunner::gated(ScanTool::Subdomains, gate.clone()),
    );
    let app = tools.spawn(1, 1).await;
    let key = app.register("alice").await;
    let project = app.create_project(&key, "Acme").await;
    let uri = format!("/api/projects/{project}/cron");

    let (status, body) = app
        .post(&uri, &key, json!({ "domain": "example.com", "period": 2 }))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let mut accepted = vec![body["run_id"].as_str().unwrap().to_string()];
    tools.subdomains.started.acquire().await.unwrap().forget();

    let mut rejected = Vec::new();
    for n in 0..3 {
        let domain = format!("site{n}.example.com");
        let (status, body) = app
            .post(&uri, &key, json!({ "domain": domain, "period": 2 }))
            .await;
        match status {
            StatusCode::OK => accepted.push(body["run_id"].as_str().unwrap().to_string()),
            StatusCode::SERVICE_UNAVAILABLE => {
                assert_eq!(body["status"], "scan queue is full");
                rejected.push(domain);
            }
            other => panic!("unexpected status {other}: {body}"),
        }
    }
    assert!(!rejected.is_empty());

    let (_, body) = app.get(&uri, &key).await;
    let tasks = body["cron_tasks"].as_array().unwrap();
    assert_eq!(tasks.len(), accepted.len());
    assert!(
        tasks
            .iter()
            .all(|t| !rejected.iter().any(|d| t["domain"] == d.as_str()))
    );

    let (_, history) = app
        .get(&format!("/api/projects/{project}/scans"), &key)
        .await;
    assert_eq!(history["scans"].as_array().unwrap().len(), accepted.len());

    gate.add_permits(accepted.len());
    for run_id in &accepted {
        assert_eq!(app.wait_for_run(run_id).await.status, "succeeded");
    }
}

#[tokio::test]
async fn test_one_shot_cron_task() {
    let tools = Tools::new(
        FakeRunner::new(ScanTool::Nmap, Vec::new()),
        FakeRunner::new(ScanTool::Masscan, Vec::new()),
        FakeRunner::new(
            ScanTool::Subdomains,
            vec![
                Discovery::Domain {
                    domain: "www.example.com".to_string(),
                    ip: "192.0.2.1".to_string(),
                },
                Discovery::Domain {
                    domain: "mail.example.com".to_string(),
                    ip: "bogus".to_string(),
                },
            ],
        ),
    );
    let app = tools.spawn(1, 4).await;
    let key = app.register("alice").await;
    let project = app.create_project(&key, "Acme").await;

    let (status, body) = app
        .post(
            &format!("/api/projects/{project}/cron"),
            &key,
            json!({ "domain": "example.com", "period": "1" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["task"]["status"], 0);
    assert_eq!(body["task"]["period"], 1);
    let task_id = body["task"]["id"].as_str().unwrap().to_string();

    let run = app.wait_for_run(body["run_id"].as_str().unwrap()).await;
    assert_eq!(run.status, "succeeded");
    assert_eq!(run.domains_merged, 1);
    assert_eq!(run.cron_task.as_deref(), Some(task_id.as_str()));
    assert_eq!(tools.subdomains.recorded_targets(), vec![vec!["example.com".to_string()]]);

    let (_, overview) = app.get(&format!("/api/projects/{project}"), &key).await;
    let domains = overview["domains"].as_array().unwrap();
    assert_eq!(domains.len(), 1);
    assert_eq!(domains[0]["domain"], "www.example.com");

    let (status, body) = app
        .put(
            &format!("/api/cron/{task_id}/status"),
            &key,
            json!({ "status": 1 }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["reason"], "One-shot tasks cannot be toggled");

    let task = app.shared.store.get_cron_task(&task_id).await.unwrap().unwrap();
    assert_eq!(task.status, 0);

    let ran = app
        .shared
        .cron_service
        .run_due_tasks(chrono::Utc::now() + chrono::Duration::days(365))
        .await
        .unwrap();
    assert_eq!(ran, 0);
}

#[tokio::test]
async fn test_recurring_cron_task_status_and_reruns() {
    let tools = Tools::new(
        FakeRunner::new(ScanTool::Nmap, Vec::new()),
        FakeRunner::new(ScanTool::Masscan, Vec::new()),
        FakeRunner::new(ScanTool::Subdomains, Vec::new()),
    );
    let app = tools.spawn(2, 8).await;
    let key = app.register("alice").await;
    let project = app.create_project(&key, "Acme").await;

    let (status, body) = app
        .post(
            &format!("/api/projects/{project}/cron"),
            &key,
            json!({ "domain": "example.com", "period": 2 }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["task"]["status"], 1);
    let task_id = body["task"]["id"].as_str().unwrap().to_string();
    app.wait_for_run(body["run_id"].as_str().unwrap()).await;

    let cron = app.shared.cron_service.clone();
    let now = chrono::Utc::now();
    assert_eq!(cron.run_due_tasks(now).await.unwrap(), 0);
    assert_eq!(
        cron.run_due_tasks(now + chrono::Duration::days(2))
            .await
            .unwrap(),
        1
    );

    let status_uri = format!("/api/cron/{task_id}/status");
    let (status, body) = app.put(&status_uri, &key, json!({ "status": 0 })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], 0);
    assert_eq!(
        cron.run_due_tasks(now + chrono::Duration::days(10))
            .await
            .unwrap(),
        0
    );

    // Repeating the current value leaves it in place.
    let (status, body) = app.put(&status_uri, &key, json!({ "status": 0 })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], 0);

    for invalid in [json!(2), json!("on"), json!(null)] {
        let (status, body) = app
            .put(&status_uri, &key, json!({ "status": invalid }))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{invalid}: {body}");
    }
    let task = app.shared.store.get_cron_task(&task_id).await.unwrap().unwrap();
    assert_eq!(task.status, 0);

    let (status, body) = app.put(&status_uri, &key, json!({ "status": "1" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], 1);
    let (_, body) = app.put(&status_uri, &key, json!({ "status": 1 })).await;
    assert_eq!(body["status"], 1);

    let (status, _) = app
        .post(
            &format!("/api/projects/{project}/cron"),
            &key,
            json!({ "domain": "example.com", "period": 9 }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.delete(&format!("/api/cron/{task_id}"), &key).await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = app
        .get(&format!("/api/projects/{project}/cron"), &key)
        .await;
    assert!(body["cron_tasks"].as_array().unwrap().is_empty());
}
