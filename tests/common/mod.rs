//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::Arc;

use fleet_control::config::{FleetConfig, ServerConfig};
use fleet_control::{ControlPlane, HttpServer, Shutdown};
use serde_json::Value;
use tokio::net::TcpListener;

/// A running control plane on an ephemeral port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub plane: Arc<ControlPlane>,
    pub client: reqwest::Client,
    shutdown: Shutdown,
}

#[allow(dead_code)]
impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client.get(self.url(path)).send().await.unwrap()
    }

    pub async fn post(&self, path: &str, body: Value) -> reqwest::Response {
        self.client.post(self.url(path)).json(&body).send().await.unwrap()
    }

    pub async fn patch(&self, path: &str, body: Value) -> reqwest::Response {
        self.client.patch(self.url(path)).json(&body).send().await.unwrap()
    }

    pub async fn put(&self, path: &str, body: Value) -> reqwest::Response {
        self.client.put(self.url(path)).json(&body).send().await.unwrap()
    }

    pub async fn delete(&self, path: &str) -> reqwest::Response {
        self.client.delete(self.url(path)).send().await.unwrap()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Config with `n` online servers (ids 1..=n) and the background monitor off.
#[allow(dead_code)]
pub fn fleet_config(n: u64) -> FleetConfig {
    let mut config = FleetConfig::default();
    config.monitor.enabled = false;
    config.observability.metrics_enabled = false;
    config.servers = (1..=n)
        .map(|id| {
            let mut server = ServerConfig::new(id, Some(1000));
            server.online = true;
            server
        })
        .collect();
    config
}

/// Boot the HTTP server on 127.0.0.1:0.
pub async fn start_server(config: FleetConfig) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = HttpServer::new(config);
    let plane = server.plane();
    let shutdown = Shutdown::new();
    let run_shutdown = shutdown.clone();
    tokio::spawn(async move {
        let _ = server.run(listener, run_shutdown).await;
    });

    TestServer {
        addr,
        plane,
        client: reqwest::Client::new(),
        shutdown,
    }
}
