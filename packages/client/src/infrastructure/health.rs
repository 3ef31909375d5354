//! Relay health probing.
//!
//! Every candidate relay is probed concurrently with `GET <server>/health`.
//! Results are cached until the next explicit refresh.

use std::time::{Duration, Instant};

use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ClientError, HealthError};

use super::transport::health_endpoint;

/// Health of one reachable relay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerHealth {
    pub url: String,
    /// Time to answer the probe, in milliseconds
    pub latency: u64,
    /// Whatever else the relay reports
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

/// Probes candidate relays and caches the healthy ones
#[derive(Debug, Clone)]
pub struct HealthChecker {
    http: reqwest::Client,
    timeout: Duration,
    cache: Option<Vec<ServerHealth>>,
}

impl HealthChecker {
    pub fn new(timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            timeout,
            cache: None,
        }
    }

    /// Probe all `servers` and replace the cache with the ones that answered
    pub async fn refresh(&mut self, servers: &[String]) -> &[ServerHealth] {
        let probes = servers.iter().map(|server| self.probe(server));
        let results = join_all(probes).await;

        let mut healthy = Vec::new();
        for (server, result) in servers.iter().zip(results) {
            match result {
                Ok(health) => healthy.push(health),
                Err(e) => tracing::warn!("Relay '{}' failed its health probe: {}", server, e),
            }
        }
        tracing::info!("{}/{} relays healthy", healthy.len(), servers.len());

        self.cache.insert(healthy)
    }

    /// Cached results, probing first if nothing is cached yet
    pub async fn get_or_fetch(&mut self, servers: &[String]) -> &[ServerHealth] {
        if self.cache.is_none() {
            return self.refresh(servers).await;
        }
        self.cached().unwrap_or_default()
    }

    pub fn cached(&self) -> Option<&[ServerHealth]> {
        self.cache.as_deref()
    }

    async fn probe(&self, server: &str) -> Result<ServerHealth, HealthError> {
        let endpoint = health_endpoint(server)?;
        let start = Instant::now();
        let response = self
            .http
            .get(endpoint)
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?;
        let details = match response.json::<Value>().await? {
            Value::Object(map) => map,
            _ => Map::new(),
        };

        Ok(ServerHealth {
            url: server.to_string(),
            latency: start.elapsed().as_millis() as u64,
            details,
        })
    }
}

/// Lowest-latency relay among `healths`
pub fn best_server(healths: &[ServerHealth]) -> Result<&ServerHealth, ClientError> {
    healths
        .iter()
        .min_by_key(|health| health.latency)
        .ok_or(ClientError::NoHealthyServer)
}
