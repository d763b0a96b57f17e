mod common;

use axum::http::StatusCode;
use common::{TestApp, spawn_app};
use serde_json::{Value, json};

async fn merge_host(app: &TestApp, key: &str, project: &str, body: Value) -> (StatusCode, Value) {
    app.post(&format!("/api/projects/{project}/hosts"), key, body)
        .await
}

#[tokio::test]
async fn test_host_merge_is_idempotent_and_resets_style() {
    let app = spawn_app().await;
    let key = app.register("alice").await;
    let project = app.create_project(&key, "Acme").await;

    let ports = json!([
        { "port": "22", "service": "ssh", "version": "OpenSSH 9.6" },
        { "port": "80", "service": "http" }
    ]);

    let (status, first) = merge_host(
        &app,
        &key,
        &project,
        json!({ "ip": "10.0.0.5", "ports": ports }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["host"]["portsq"], 2);
    assert_eq!(first["host"]["style"], "New");
    let host_id = first["host"]["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .put(
            &format!("/api/hosts/{host_id}/style"),
            &key,
            json!({ "style": "Hacked" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["style"], "Hacked");

    let (status, second) = merge_host(
        &app,
        &key,
        &project,
        json!({ "ip": "10.0.0.5", "ports": ports }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["host"]["id"], host_id.as_str());
    assert_eq!(second["host"]["portsq"], 2);
    assert_eq!(second["host"]["style"], "New");

    let (_, overview) = app.get(&format!("/api/projects/{project}"), &key).await;
    let hosts = overview["hosts"].as_array().unwrap();
    assert_eq!(hosts.len(), 1);
    assert_eq!(hosts[0]["ports"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_port_observation_updates_in_place() {
    let app = spawn_app().await;
    let key = app.register("alice").await;
    let project = app.create_project(&key, "Acme").await;

    let (_, first) = merge_host(
        &app,
        &key,
        &project,
        json!({ "ip": "10.0.0.7", "ports": [{ "port": "8080", "service": "http" }] }),
    )
    .await;
    let port_id = first["host"]["ports"][0]["id"].as_str().unwrap().to_string();

    let (status, _) = app
        .put(
            &format!("/api/ports/{port_id}/note"),
            &key,
            json!({ "note": "admin panel" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, second) = merge_host(
        &app,
        &key,
        &project,
        json!({
            "ip": "10.0.0.7",
            "ports": [{ "port": "8080", "service": "http-proxy", "version": "squid 6.1" }]
        }),
    )
    .await;
    let port = &second["host"]["ports"][0];
    assert_eq!(second["host"]["portsq"], 1);
    assert_eq!(port["id"], port_id.as_str());
    assert_eq!(port["service"], "http-proxy");
    assert_eq!(port["version"], "squid 6.1");
    assert_eq!(port["note"], "admin panel");
}

#[tokio::test]
async fn test_invalid_observations_write_nothing() {
    let app = spawn_app().await;
    let key = app.register("alice").await;
    let project = app.create_project(&key, "Acme").await;

    let (status, body) = merge_host(
        &app,
        &key,
        &project,
        json!({
            "ip": "10.0.0.9",
            "ports": [{ "port": "22", "service": "ssh" }, { "port": "443", "service": "" }]
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "validation error");

    let (status, _) = merge_host(&app, &key, &project, json!({ "ip": "10.0.0.0/24" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = merge_host(&app, &key, &project, json!({ "ip": "not-an-ip" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, overview) = app.get(&format!("/api/projects/{project}"), &key).await;
    assert!(overview["hosts"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_domain_merge_creates_host_and_updates_ip() {
    let app = spawn_app().await;
    let key = app.register("alice").await;
    let project = app.create_project(&key, "Acme").await;

    let (status, first) = app
        .post(
            &format!("/api/projects/{project}/domains"),
            &key,
            json!({ "domain": "API.Example.com", "ip": "192.0.2.10" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["domain"]["domain"], "api.example.com");
    assert_eq!(first["domain"]["lvl"], "example.com");
    assert_eq!(first["domain"]["style"], "New");
    let domain_id = first["domain"]["id"].as_str().unwrap().to_string();

    let (_, overview) = app.get(&format!("/api/projects/{project}"), &key).await;
    let hosts = overview["hosts"].as_array().unwrap();
    assert_eq!(hosts.len(), 1);
    assert_eq!(hosts[0]["ip"], "192.0.2.10");
    assert_eq!(hosts[0]["portsq"], 0);

    let (status, _) = app
        .put(
            &format!("/api/domains/{domain_id}/style"),
            &key,
            json!({ "style": "Checked" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, second) = app
        .post(
            &format!("/api/projects/{project}/domains"),
            &key,
            json!({ "domain": "api.example.com", "ip": "192.0.2.11" }),
        )
        .await;
    assert_eq!(second["domain"]["id"], domain_id.as_str());
    assert_eq!(second["domain"]["ip"], "192.0.2.11");
    assert_eq!(second["domain"]["style"], "Checked");

    let (status, _) = app
        .post(
            &format!("/api/projects/{project}/domains"),
            &key,
            json!({ "domain": "not a domain", "ip": "192.0.2.10" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_notes_are_trimmed_and_rendered() {
    let app = spawn_app().await;
    let key = app.register("alice").await;
    let project = app.create_project(&key, "Acme").await;

    let (_, body) = merge_host(&app, &key, &project, json!({ "ip": "10.1.1.1" })).await;
    let host_id = body["host"]["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .put(
            &format!("/api/hosts/{host_id}/note"),
            &key,
            json!({ "note": "  **owned** via <b>ssh</b>\n" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let rendered = body["note"].as_str().unwrap();
    assert!(rendered.contains("<strong>owned</strong>"));
    assert!(!rendered.contains("<b>"));

    let (status, body) = app.get(&format!("/api/hosts/{host_id}/note"), &key).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["note"], "**owned** via <b>ssh</b>");
}

#[tokio::test]
async fn test_style_rejects_unknown_and_new() {
    let app = spawn_app().await;
    let key = app.register("alice").await;
    let project = app.create_project(&key, "Acme").await;

    let (_, body) = merge_host(&app, &key, &project, json!({ "ip": "10.1.1.2" })).await;
    let host_id = body["host"]["id"].as_str().unwrap().to_string();

    for style in ["New", "Pwned", ""] {
        let (status, _) = app
            .put(
                &format!("/api/hosts/{host_id}/style"),
                &key,
                json!({ "style": style }),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "style {style:?}");
    }
}

#[tokio::test]
async fn test_project_delete_cascades() {
    let app = spawn_app().await;
    let key = app.register("alice").await;
    let project = app.create_project(&key, "Acme").await;

    let (_, body) = merge_host(
        &app,
        &key,
        &project,
        json!({ "ip": "10.2.0.1", "ports": [{ "port": "443", "service": "https" }] }),
    )
    .await;
    let host_id = body["host"]["id"].as_str().unwrap().to_string();
    let port_id = body["host"]["ports"][0]["id"].as_str().unwrap().to_string();

    let (_, body) = app
        .post(
            &format!("/api/projects/{project}/domains"),
            &key,
            json!({ "domain": "shop.example.org", "ip": "10.2.0.1" }),
        )
        .await;
    let domain_id = body["domain"]["id"].as_str().unwrap().to_string();

    let task = app
        .shared
        .store
        .create_cron_task(&project, "example.org", scopewatch::domain::Period::Weekly)
        .await
        .unwrap();

    let (status, _) = app.delete(&format!("/api/projects/{project}"), &key).await;
    assert_eq!(status, StatusCode::OK);

    let store = &app.shared.store;
    assert!(store.get_host(&host_id).await.unwrap().is_none());
    assert!(store.get_port(&port_id).await.unwrap().is_none());
    assert!(store.get_domain(&domain_id).await.unwrap().is_none());
    assert!(store.get_cron_task(&task.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_host_delete_removes_ports() {
    let app = spawn_app().await;
    let key = app.register("alice").await;
    let project = app.create_project(&key, "Acme").await;

    let (_, body) = merge_host(
        &app,
        &key,
        &project,
        json!({ "ip": "10.3.0.1", "ports": [{ "port": "25", "service": "smtp" }] }),
    )
    .await;
    let host_id = body["host"]["id"].as_str().unwrap().to_string();
    let port_id = body["host"]["ports"][0]["id"].as_str().unwrap().to_string();

    let (status, body) = app.delete(&format!("/api/hosts/{host_id}"), &key).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], host_id.as_str());

    assert!(app.shared.store.get_port(&port_id).await.unwrap().is_none());

    let (status, _) = app.delete(&format!("/api/hosts/{host_id}"), &key).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_failed_project_delete_keeps_everything() {
    use scopewatch::db::NewScanRun;
    use scopewatch::domain::{Period, ScanTool};
    use sea_orm::ConnectionTrait;

    let app = spawn_app().await;
    let key = app.register("alice").await;
    let project = app.create_project(&key, "Acme").await;

    let (_, body) = merge_host(
        &app,
        &key,
        &project,
        json!({ "ip": "10.4.0.1", "ports": [{ "port": "22", "service": "ssh" }] }),
    )
    .await;
    let host_id = body["host"]["id"].as_str().unwrap().to_string();
    let port_id = body["host"]["ports"][0]["id"].as_str().unwrap().to_string();

    let (_, body) = app
        .post(
            &format!("/api/projects/{project}/domains"),
            &key,
            json!({ "domain": "vpn.example.net", "ip": "10.4.0.1" }),
        )
        .await;
    let domain_id = body["domain"]["id"].as_str().unwrap().to_string();

    let store = &app.shared.store;
    let task = store
        .create_cron_task(&project, "example.net", Period::Daily)
        .await
        .unwrap();
    let run = store
        .create_scan_run(NewScanRun {
            project_id: &project,
            cron_task: None,
            tool: ScanTool::Nmap,
            strategy: None,
            target_count: 1,
        })
        .await
        .unwrap();

    // Scan runs go after ports, hosts, domains and cron tasks.
    store
        .conn
        .execute_unprepared(
            "CREATE TRIGGER keep_scan_runs BEFORE DELETE ON scan_runs \
             BEGIN SELECT RAISE(ABORT, 'scan runs are pinned'); END;",
        )
        .await
        .unwrap();

    let (status, _) = app.delete(&format!("/api/projects/{project}"), &key).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    assert!(store.get_host(&host_id).await.unwrap().is_some());
    assert!(store.get_port(&port_id).await.unwrap().is_some());
    assert!(store.get_domain(&domain_id).await.unwrap().is_some());
    assert!(store.get_cron_task(&task.id).await.unwrap().is_some());
    assert!(store.get_scan_run(&run.id).await.unwrap().is_some());

    let (status, overview) = app.get(&format!("/api/projects/{project}"), &key).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(overview["hosts"].as_array().unwrap().len(), 1);
    assert_eq!(overview["domains"].as_array().unwrap().len(), 1);
}
