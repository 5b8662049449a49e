use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Deserialize)]
pub struct SyncRequest {
    pub source_agent: String,
    pub operation: String,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub target_agent: Option<String>,
}

/// One row of `sync_logs`; also the payload forwarded to the coordination endpoint.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SyncLogEntry {
    pub id: String,
    pub source_agent: String,
    pub target_agent: Option<String>,
    pub operation: String,
    /// Stringified JSON payload
    pub data: Option<String>,
    pub status: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncReceipt {
    pub sync_id: String,
}
