use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of `POST /api/store`; the router builds the same shape from its envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreRequest {
    pub agent_id: String,
    pub key: String,
    pub value: Value,
    #[serde(default)]
    pub metadata: Option<Value>,
    /// Time to live in seconds
    #[serde(default)]
    pub ttl: Option<i64>,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StoreReceipt {
    pub id: String,
    pub key: String,
    pub stored: bool,
}

/// A live row from `agent_data` with value and metadata decoded
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Record {
    pub id: String,
    pub agent_id: String,
    pub session_id: Option<String>,
    pub key: String,
    pub value: Value,
    pub metadata: Option<Value>,
    pub created_at: String,
    pub updated_at: String,
    pub expires_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct KeyEntry {
    pub key: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct RecordStats {
    pub total_records: i64,
    pub unique_keys: i64,
}
