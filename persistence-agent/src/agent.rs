//! Agent identity and lifecycle status, shared by the discovery document,
//! the health check and the registry heartbeat.

use parking_lot::RwLock;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Instant;

/// Version from Cargo.toml, available at compile time
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub const AGENT_TYPE: &str = "persistence";

pub const CAPABILITIES: [&str; 6] = [
    "data-storage",
    "query-execution",
    "schema-management",
    "sync-memory",
    "batch-operations",
    "real-time-updates",
];

pub const ENDPOINTS: [(&str, &str); 8] = [
    ("health", "/health"),
    ("discovery", "/discovery"),
    ("store", "/api/store"),
    ("retrieve", "/api/retrieve"),
    ("query", "/api/query"),
    ("sync", "/api/sync"),
    ("schema", "/api/schema"),
    ("batch", "/api/batch"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Initializing,
    Active,
    Error,
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentStatus::Initializing => "initializing",
            AgentStatus::Active => "active",
            AgentStatus::Error => "error",
        }
    }
}

/// Payload of `GET /discovery` and of each registry registration
#[derive(Debug, Clone, Serialize)]
pub struct AgentMetadata {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub agent_type: &'static str,
    pub version: &'static str,
    pub capabilities: Vec<&'static str>,
    pub status: AgentStatus,
    pub port: u16,
    pub endpoints: BTreeMap<&'static str, &'static str>,
}

pub struct Agent {
    pub id: String,
    pub name: String,
    pub port: u16,
    status: RwLock<AgentStatus>,
    started_at: Instant,
}

impl Agent {
    pub fn new(id: &str, name: &str, port: u16) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            port,
            status: RwLock::new(AgentStatus::Initializing),
            started_at: Instant::now(),
        }
    }

    pub fn status(&self) -> AgentStatus {
        *self.status.read()
    }

    pub fn set_status(&self, status: AgentStatus) {
        let mut current = self.status.write();
        if *current != status {
            log::info!("Agent status: {} -> {}", current.as_str(), status.as_str());
            *current = status;
        }
    }

    pub fn uptime_secs(&self) -> f64 {
        self.started_at.elapsed().as_secs_f64()
    }

    pub fn metadata(&self) -> AgentMetadata {
        AgentMetadata {
            id: self.id.clone(),
            name: self.name.clone(),
            agent_type: AGENT_TYPE,
            version: VERSION,
            capabilities: CAPABILITIES.to_vec(),
            status: self.status(),
            port: self.port,
            endpoints: ENDPOINTS.into_iter().collect(),
        }
    }
}
