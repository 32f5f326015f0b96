//! End-to-end fleet scenarios over the HTTP surface.

use std::collections::HashSet;

use fleet_control::config::ServerConfig;
use fleet_control::registry::ServerStatus;
use reqwest::StatusCode;
use serde_json::{json, Value};

mod common;

async fn select(server: &common::TestServer, strategy: &str) -> (StatusCode, Value) {
    let res = server.get(&format!("/select?strategy={strategy}")).await;
    let status = res.status();
    (status, res.json().await.unwrap())
}

#[tokio::test]
async fn test_least_connections_failover_scenario() {
    let mut config = common::fleet_config(2);
    let mut c = ServerConfig::new(3, Some(1000));
    c.online = true;
    c.enabled = false;
    config.servers.push(c);
    let server = common::start_server(config).await;

    for (id, delta) in [(1, 5), (2, 2)] {
        let res = server
            .post(&format!("/servers/{id}/connections"), json!({ "delta": delta }))
            .await;
        assert_eq!(res.status(), StatusCode::OK);
    }
    for id in 1..=3 {
        server
            .post("/health-report", json!({ "serverId": id, "cpuUsage": 20.0 }))
            .await;
    }
    // Server 3 reported but stays out of rotation while disabled.
    let (status, body) = select(&server, "least_connections").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["serverId"], 2);

    server.put("/servers/2/enabled", json!({ "enabled": false })).await;
    let (_, body) = select(&server, "least_connections").await;
    assert_eq!(body["serverId"], 1);

    let res = server
        .post("/health-report", json!({ "serverId": 1, "cpuUsage": 95.0 }))
        .await;
    let ack: Value = res.json().await.unwrap();
    assert_eq!(ack["status"], "critical");

    // No alternative yet: server 1 stays in rotation.
    assert!(server.plane.failover.check_fleet().is_empty());
    assert_eq!(server.plane.registry.snapshot(1).unwrap().status, ServerStatus::Online);

    server.put("/servers/2/enabled", json!({ "enabled": true })).await;
    let events = server.plane.failover.check_fleet();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].from_server_id, 1);
    assert_eq!(events[0].to_server_id, 2);
    assert_eq!(events[0].affected_connections, 5);

    let (_, body) = select(&server, "least_connections").await;
    assert_eq!(body["serverId"], 2);

    // The last server in rotation cannot be taken offline by hand.
    let res = server.post("/servers/2/offline", json!({})).await;
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);

    server.put("/servers/2/enabled", json!({ "enabled": false })).await;
    let (status, body) = select(&server, "least_connections").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["message"], "no healthy servers available");

    // Repeated checks are no-ops once nothing is in rotation.
    assert!(server.plane.failover.check_fleet().is_empty());
    let history: Vec<Value> = server.get("/failover-history").await.json().await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["triggeredBy"], "system");
    assert_eq!(history[0]["status"], "completed");
}

#[tokio::test]
async fn test_sync_job_lifecycle() {
    let server = common::start_server(common::fleet_config(2)).await;

    let res = server
        .post(
            "/sync",
            json!({ "jobType": "streams", "sourceServerId": 1, "targetServerId": 2 }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let job_id = res.json::<Value>().await.unwrap()["jobId"].as_u64().unwrap();

    let job: Value = server.get(&format!("/sync/{job_id}")).await.json().await.unwrap();
    assert_eq!(job["status"], "pending");

    let res = server
        .patch(&format!("/sync/{job_id}"), json!({ "status": "running", "progress": 10 }))
        .await;
    assert_eq!(res.status(), StatusCode::OK);

    let res = server
        .patch(
            &format!("/sync/{job_id}"),
            json!({ "status": "completed", "progress": 100, "itemsSynced": 42 }),
        )
        .await;
    let job: Value = res.json().await.unwrap();
    assert_eq!(job["status"], "completed");
    assert_eq!(job["progress"], 100);
    assert_eq!(job["itemsSynced"], 42);
    assert!(job["completedAt"].is_u64());

    let res = server
        .patch(&format!("/sync/{job_id}"), json!({ "status": "running" }))
        .await;
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = server.post(&format!("/sync/{job_id}/cancel"), json!({})).await;
    assert_eq!(res.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_sync_cancel_marks_failed() {
    let server = common::start_server(common::fleet_config(1)).await;

    let res = server
        .post("/sync", json!({ "jobType": "full", "targetServerId": 1 }))
        .await;
    let job_id = res.json::<Value>().await.unwrap()["jobId"].as_u64().unwrap();

    let job: Value = server
        .post(&format!("/sync/{job_id}/cancel"), json!({}))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(job["status"], "failed");
    assert_eq!(job["errorMessage"], "cancelled");
}

#[tokio::test]
async fn test_round_robin_visits_each_server_once() {
    let server = common::start_server(common::fleet_config(3)).await;

    let mut seen = HashSet::new();
    for _ in 0..3 {
        let (_, body) = select(&server, "round_robin").await;
        seen.insert(body["serverId"].as_u64().unwrap());
    }
    assert_eq!(seen, HashSet::from([1, 2, 3]));
}

#[tokio::test]
async fn test_rule_overrides_strategy_and_candidates() {
    let mut config = common::fleet_config(3);
    config.servers[2].country = Some("DE".into());
    let server = common::start_server(config).await;

    let res = server
        .post(
            "/rules",
            json!({
                "name": "germany",
                "priority": 1,
                "condition": { "countries": ["DE"] },
                "targetServers": [3]
            }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::OK);

    let body: Value = server
        .get("/select?strategy=least_connections&country=DE")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["serverId"], 3);

    let body: Value = server
        .get("/select?strategy=least_connections&country=FR")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["serverId"], 1);
}
