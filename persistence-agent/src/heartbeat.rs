//! Periodic registration with the discovery registry.

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::time::{interval, Duration};

use crate::agent::{Agent, AgentMetadata};

const REGISTER_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Serialize)]
struct Registration {
    #[serde(flatten)]
    metadata: AgentMetadata,
    url: String,
}

pub struct DiscoveryHeartbeat {
    registry_url: String,
    interval_secs: u64,
    public_url: String,
    agent: Arc<Agent>,
    client: reqwest::Client,
}

impl DiscoveryHeartbeat {
    pub fn new(registry_url: &str, interval_secs: u64, public_url: &str, agent: Arc<Agent>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REGISTER_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            registry_url: registry_url.trim_end_matches('/').to_string(),
            interval_secs: interval_secs.max(1),
            public_url: public_url.to_string(),
            agent,
            client,
        }
    }

    /// Registers immediately, then on every tick until shutdown.
    pub async fn start(self, mut shutdown_rx: oneshot::Receiver<()>) {
        log::info!(
            "Discovery heartbeat started (registry: {}, every {}s)",
            self.registry_url,
            self.interval_secs
        );

        // The first tick completes immediately
        let mut ticker = interval(Duration::from_secs(self.interval_secs));

        loop {
            tokio::select! {
                _ = &mut shutdown_rx => {
                    log::info!("Discovery heartbeat received shutdown signal");
                    break;
                }
                _ = ticker.tick() => {
                    match self.register().await {
                        Ok(()) => log::debug!("Registered with discovery at {}", self.registry_url),
                        Err(e) => log::error!("Discovery registration failed: {}", e),
                    }
                }
            }
        }

        log::info!("Discovery heartbeat stopped");
    }

    pub async fn register(&self) -> Result<(), String> {
        let url = format!("{}/register", self.registry_url);
        let resp = self
            .client
            .post(&url)
            .json(&self.registration())
            .send()
            .await
            .map_err(|e| format!("Discovery registry unavailable: {}", e))?;

        if !resp.status().is_success() {
            return Err(format!("Discovery registry responded with {}", resp.status()));
        }
        Ok(())
    }

    fn registration(&self) -> Registration {
        Registration {
            metadata: self.agent.metadata(),
            url: self.public_url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn heartbeat(registry: &str) -> DiscoveryHeartbeat {
        let agent = Arc::new(Agent::new("agent-1", "PersistenceAgent", 4243));
        DiscoveryHeartbeat::new(registry, 0, "http://localhost:4243", agent)
    }

    #[test]
    fn test_registration_payload() {
        let hb = heartbeat("http://registry.local/");
        assert_eq!(hb.registry_url, "http://registry.local");
        assert_eq!(hb.interval_secs, 1);

        let value = serde_json::to_value(hb.registration()).unwrap();
        assert_eq!(value["id"], json!("agent-1"));
        assert_eq!(value["type"], json!("persistence"));
        assert_eq!(value["url"], json!("http://localhost:4243"));
        assert!(value["endpoints"].is_object());
    }

    #[tokio::test]
    async fn test_register_unreachable_registry_errors() {
        let hb = heartbeat("http://127.0.0.1:9");
        assert!(hb.register().await.is_err());
    }

    #[tokio::test]
    async fn test_start_stops_on_shutdown() {
        let hb = heartbeat("http://127.0.0.1:9");
        let (tx, rx) = oneshot::channel();
        let handle = tokio::spawn(hb.start(rx));
        tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(10), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
