//! Active reachability probing.
//!
//! # Responsibilities
//! - Probe each server's status endpoint once per monitor tick
//! - Bound every probe with a timeout and the whole tick with a worker limit
//! - Update reachability with hysteresis (consecutive successes/failures)

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::Request;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time;

use crate::config::MonitorConfig;
use crate::observability::metrics;
use crate::registry::{Server, ServerRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Up,
    Down,
}

#[derive(Clone)]
pub struct HealthProber {
    registry: Arc<ServerRegistry>,
    config: MonitorConfig,
    client: Client<HttpConnector, Body>,
}

impl HealthProber {
    pub fn new(registry: Arc<ServerRegistry>, config: MonitorConfig) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        Self {
            registry,
            config,
            client,
        }
    }

    /// Probe every enabled server that has a status URL. Returns the number probed.
    pub async fn probe_all(&self) -> usize {
        let limit = Arc::new(Semaphore::new(self.config.probe_concurrency.max(1)));
        let mut tasks = JoinSet::new();

        for server in self.registry.all_servers() {
            if !server.is_enabled() {
                continue;
            }
            let Some(url) = server.profile().status_url.clone() else {
                continue;
            };

            let prober = self.clone();
            let limit = limit.clone();
            tasks.spawn(async move {
                let _permit = limit.acquire_owned().await.ok()?;
                let outcome = prober.probe(&url).await;
                prober.apply(&server, outcome);
                Some(outcome)
            });
        }

        let mut probed = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Some(_)) => probed += 1,
                Ok(None) => {}
                Err(e) => tracing::error!(error = %e, "Probe task failed"),
            }
        }
        probed
    }

    async fn probe(&self, url: &str) -> ProbeOutcome {
        let request = match Request::builder()
            .method("GET")
            .uri(url)
            .header("user-agent", "fleet-control-probe")
            .body(Body::empty())
        {
            Ok(req) => req,
            Err(e) => {
                tracing::error!(url, error = %e, "Failed to build probe request");
                return ProbeOutcome::Down;
            }
        };

        let timeout = Duration::from_secs(self.config.probe_timeout_secs);
        let started = Instant::now();

        match time::timeout(timeout, self.client.request(request)).await {
            Ok(Ok(response)) if response.status().is_success() => {
                tracing::trace!(url, elapsed_ms = started.elapsed().as_millis() as u64, "Probe succeeded");
                ProbeOutcome::Up
            }
            Ok(Ok(response)) => {
                tracing::warn!(url, status = %response.status(), "Probe failed: non-success status");
                ProbeOutcome::Down
            }
            Ok(Err(e)) => {
                tracing::warn!(url, error = %e, "Probe failed: connection error");
                ProbeOutcome::Down
            }
            Err(_) => {
                tracing::warn!(url, "Probe failed: timeout");
                ProbeOutcome::Down
            }
        }
    }

    fn apply(&self, server: &Server, outcome: ProbeOutcome) {
        let transitioned = match outcome {
            ProbeOutcome::Up => server.mark_probe_success(self.config.healthy_threshold as usize),
            ProbeOutcome::Down => server.mark_probe_failure(self.config.unhealthy_threshold as usize),
        };
        if transitioned {
            tracing::info!(server_id = server.id, reachability = ?server.reachability(), "Server reachability changed");
        }
        metrics::record_probe(server.id, outcome == ProbeOutcome::Up);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::registry::Reachability;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    async fn status_endpoint(status_line: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut buf = [0u8; 1024];
                    let _ = socket.read(&mut buf).await;
                    let response = format!(
                        "HTTP/1.1 {status_line}\r\nContent-Length: 2\r\nConnection: close\r\n\r\nok"
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });
        format!("http://{addr}/status")
    }

    fn server_with_url(id: u64, url: Option<String>) -> ServerConfig {
        let mut config = ServerConfig::new(id, None);
        config.status_url = url;
        config
    }

    #[tokio::test]
    async fn test_probe_updates_reachability() {
        let up = status_endpoint("200 OK").await;
        let down = status_endpoint("503 Service Unavailable").await;

        let registry = Arc::new(ServerRegistry::new(&[
            server_with_url(1, Some(up)),
            server_with_url(2, Some(down)),
            server_with_url(3, None),
        ]));
        let config = MonitorConfig {
            healthy_threshold: 1,
            unhealthy_threshold: 2,
            ..Default::default()
        };
        let prober = HealthProber::new(registry.clone(), config);

        assert_eq!(prober.probe_all().await, 2);
        assert_eq!(registry.snapshot(1).unwrap().reachability, Reachability::Reachable);
        assert_eq!(registry.snapshot(2).unwrap().reachability, Reachability::Unknown);

        prober.probe_all().await;
        assert_eq!(registry.snapshot(2).unwrap().reachability, Reachability::Unreachable);
        assert_eq!(registry.snapshot(3).unwrap().reachability, Reachability::Unknown);
    }

    #[tokio::test]
    async fn test_unresponsive_server_times_out() {
        // Accepts connections but never answers.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let registry = Arc::new(ServerRegistry::new(&[server_with_url(
            1,
            Some(format!("http://{addr}/status")),
        )]));
        let config = MonitorConfig {
            probe_timeout_secs: 1,
            unhealthy_threshold: 1,
            ..Default::default()
        };
        let prober = HealthProber::new(registry.clone(), config);

        let started = Instant::now();
        prober.probe_all().await;
        assert!(started.elapsed() < Duration::from_secs(3));
        assert_eq!(registry.snapshot(1).unwrap().reachability, Reachability::Unreachable);
    }
}
