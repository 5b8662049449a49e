//! Append-only log of cross-agent sync events, with optional best-effort
//! forwarding to an external coordination endpoint.

use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::db::{timestamp, Database};
use crate::error::{AgentError, AgentResult};
use crate::models::{SyncLogEntry, SyncReceipt, SyncRequest};

pub const STATUS_COMPLETED: &str = "completed";

const FORWARD_TIMEOUT_SECS: u64 = 10;

/// POSTs each recorded entry to a coordination endpoint.
#[derive(Clone)]
pub struct SyncForwarder {
    url: String,
    client: reqwest::Client,
}

impl SyncForwarder {
    pub fn new(url: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(FORWARD_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            url: url.trim_end_matches('/').to_string(),
            client,
        }
    }

    pub async fn forward(&self, entry: &SyncLogEntry) -> AgentResult<()> {
        let resp = self
            .client
            .post(&self.url)
            .json(entry)
            .send()
            .await
            .map_err(|e| AgentError::SyncForwarding(format!("{}: {}", self.url, e)))?;

        if !resp.status().is_success() {
            return Err(AgentError::SyncForwarding(format!(
                "{} responded with {}",
                self.url,
                resp.status()
            )));
        }
        Ok(())
    }
}

pub struct SyncLog {
    db: Arc<Database>,
    forwarder: Option<SyncForwarder>,
}

impl SyncLog {
    pub fn new(db: Arc<Database>, forward_url: Option<&str>) -> Self {
        if let Some(url) = forward_url {
            log::info!("Sync entries will be forwarded to {}", url);
        }
        Self {
            db,
            forwarder: forward_url.map(SyncForwarder::new),
        }
    }

    pub fn record(&self, req: &SyncRequest) -> AgentResult<SyncReceipt> {
        if req.source_agent.trim().is_empty() {
            return Err(AgentError::Validation("source_agent is required".to_string()));
        }
        if req.operation.trim().is_empty() {
            return Err(AgentError::Validation("operation is required".to_string()));
        }

        let data = match &req.data {
            Value::Null => None,
            other => Some(serde_json::to_string(other)?),
        };

        let entry = SyncLogEntry {
            id: uuid::Uuid::new_v4().to_string(),
            source_agent: req.source_agent.clone(),
            target_agent: req.target_agent.clone(),
            operation: req.operation.clone(),
            data,
            status: STATUS_COMPLETED.to_string(),
            created_at: timestamp(Utc::now()),
        };
        self.db.insert_sync_log(&entry)?;

        log::info!(
            "Sync {} recorded: {} from {} to {}",
            entry.id,
            entry.operation,
            entry.source_agent,
            entry.target_agent.as_deref().unwrap_or("*")
        );

        let receipt = SyncReceipt {
            sync_id: entry.id.clone(),
        };
        self.spawn_forward(entry);
        Ok(receipt)
    }

    pub fn recent(&self, limit: usize) -> AgentResult<Vec<SyncLogEntry>> {
        self.db.list_sync_logs(limit)
    }

    fn spawn_forward(&self, entry: SyncLogEntry) {
        let Some(forwarder) = self.forwarder.clone() else {
            return;
        };
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            log::warn!("No runtime available, sync {} not forwarded", entry.id);
            return;
        };
        handle.spawn(async move {
            if let Err(e) = forwarder.forward(&entry).await {
                log::warn!("Sync {}: {}", entry.id, e);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(source: &str, operation: &str, data: Value) -> SyncRequest {
        SyncRequest {
            source_agent: source.to_string(),
            operation: operation.to_string(),
            data,
            target_agent: Some("agent-b".to_string()),
        }
    }

    #[test]
    fn test_record_writes_completed_entry() {
        let log = SyncLog::new(Arc::new(Database::in_memory()), None);
        let receipt = log
            .record(&request("agent-a", "memory_update", json!({"keys": ["k1"]})))
            .unwrap();

        let entries = log.recent(10).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, receipt.sync_id);
        assert_eq!(entries[0].status, STATUS_COMPLETED);
        assert_eq!(entries[0].target_agent.as_deref(), Some("agent-b"));
        assert_eq!(entries[0].data.as_deref(), Some(r#"{"keys":["k1"]}"#));
    }

    #[test]
    fn test_record_requires_source_and_operation() {
        let log = SyncLog::new(Arc::new(Database::in_memory()), None);
        assert!(matches!(
            log.record(&request("", "op", Value::Null)),
            Err(AgentError::Validation(_))
        ));
        assert!(matches!(
            log.record(&request("agent-a", " ", Value::Null)),
            Err(AgentError::Validation(_))
        ));
        assert!(log.recent(10).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_forwarding_failure_never_surfaces() {
        // Nothing listens on the discard port
        let log = SyncLog::new(Arc::new(Database::in_memory()), Some("http://127.0.0.1:9/sync"));
        let receipt = log.record(&request("agent-a", "op", json!(1)));
        assert!(receipt.is_ok());
    }

    #[tokio::test]
    async fn test_forward_to_unreachable_endpoint_errors() {
        let forwarder = SyncForwarder::new("http://127.0.0.1:9/sync/");
        let entry = SyncLogEntry {
            id: "s1".to_string(),
            source_agent: "agent-a".to_string(),
            target_agent: None,
            operation: "op".to_string(),
            data: None,
            status: STATUS_COMPLETED.to_string(),
            created_at: timestamp(Utc::now()),
        };
        let err = forwarder.forward(&entry).await.unwrap_err();
        assert!(matches!(err, AgentError::SyncForwarding(_)));
    }

    #[test]
    fn test_recent_is_newest_first() {
        let log = SyncLog::new(Arc::new(Database::in_memory()), None);
        let first = log.record(&request("agent-a", "one", Value::Null)).unwrap();
        let second = log.record(&request("agent-a", "two", Value::Null)).unwrap();
        let ids: Vec<String> = log.recent(10).unwrap().into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![second.sync_id, first.sync_id]);
        assert_eq!(log.recent(1).unwrap().len(), 1);
    }
}
