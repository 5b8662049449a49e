//! Record store: the store / retrieve / query / batch façade over the database.
//!
//! Serialization, TTL arithmetic and the read-only query guard live here; the
//! SQL itself lives in `db::tables` and `db::statements`.

use chrono::{DateTime, Datelike, Duration, Utc};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use crate::db::statements::BatchFailure;
use crate::db::tables::agent_data::RecordRow;
use crate::db::{timestamp, Database};
use crate::error::{AgentError, AgentResult};
use crate::models::{
    BatchOperation, KeyEntry, QueryResult, Record, RecordStats, SchemaRequest, StoreReceipt,
    StoreRequest,
};

pub struct RecordStore {
    db: Arc<Database>,
    default_ttl_secs: Option<i64>,
}

impl RecordStore {
    pub fn new(db: Arc<Database>, default_ttl_secs: Option<i64>) -> Self {
        Self {
            db,
            default_ttl_secs,
        }
    }

    pub fn store(&self, req: &StoreRequest) -> AgentResult<StoreReceipt> {
        self.store_at(req, Utc::now())
    }

    pub fn store_at(&self, req: &StoreRequest, now: DateTime<Utc>) -> AgentResult<StoreReceipt> {
        if req.agent_id.trim().is_empty() {
            return Err(AgentError::Validation("agent_id is required".to_string()));
        }
        if req.key.trim().is_empty() {
            return Err(AgentError::Validation("key is required".to_string()));
        }

        let metadata = match &req.metadata {
            None | Some(Value::Null) => None,
            Some(meta @ Value::Object(_)) => Some(serde_json::to_string(meta)?),
            Some(_) => {
                return Err(AgentError::Validation(
                    "metadata must be a JSON object".to_string(),
                ));
            }
        };

        let ttl = match req.ttl {
            Some(ttl) if ttl < 0 => {
                return Err(AgentError::Validation("ttl must not be negative".to_string()));
            }
            Some(0) | None => self.default_ttl_secs,
            Some(ttl) => Some(ttl),
        };
        let expires_at = ttl
            .map(|secs| expiry_after(now, secs).map(timestamp))
            .transpose()?;

        let id = Uuid::new_v4().to_string();
        let value = serde_json::to_string(&req.value)?;
        let now = timestamp(now);

        self.db
            .upsert_record(&RecordRow {
                id: &id,
                agent_id: &req.agent_id,
                session_id: req.session_id.as_deref(),
                key: &req.key,
                value: &value,
                metadata: metadata.as_deref(),
                now: &now,
                expires_at: expires_at.as_deref(),
            })
            .map_err(|e| {
                log::error!("Failed to store key '{}' for agent {}: {}", req.key, req.agent_id, e);
                e
            })?;

        log::debug!(
            "Stored key '{}' for agent {} (expires: {})",
            req.key,
            req.agent_id,
            expires_at.as_deref().unwrap_or("never")
        );

        Ok(StoreReceipt {
            id,
            key: req.key.clone(),
            stored: true,
        })
    }

    /// `Ok(None)` is the not-found outcome; only driver failures are errors.
    pub fn retrieve(&self, agent_id: &str, key: &str) -> AgentResult<Option<Record>> {
        self.retrieve_at(agent_id, key, Utc::now())
    }

    pub fn retrieve_at(
        &self,
        agent_id: &str,
        key: &str,
        now: DateTime<Utc>,
    ) -> AgentResult<Option<Record>> {
        self.db.get_live_record(agent_id, key, &timestamp(now))
    }

    /// Read-only query. The guard runs before the statement is prepared.
    pub fn query(&self, sql: &str, args: &[Value]) -> AgentResult<QueryResult> {
        ensure_select(sql)?;
        self.db.select_rows(sql, args)
    }

    pub fn batch(&self, operations: &[BatchOperation]) -> Result<usize, BatchFailure> {
        let result = self.db.execute_in_transaction(operations);
        if let Err(failure) = &result {
            log::error!("Batch failed: {}", failure);
        }
        result
    }

    /// Returns the created (or already existing) table name.
    pub fn create_table(&self, req: &SchemaRequest) -> AgentResult<String> {
        let (table, sql) = build_create_table(req)?;
        self.db.execute_ddl(&sql)?;
        log::info!("Ensured table {}", table);
        Ok(table)
    }

    pub fn list_keys(&self, agent_id: &str) -> AgentResult<Vec<KeyEntry>> {
        self.list_keys_at(agent_id, Utc::now())
    }

    pub fn list_keys_at(&self, agent_id: &str, now: DateTime<Utc>) -> AgentResult<Vec<KeyEntry>> {
        self.db.list_live_keys(agent_id, &timestamp(now))
    }

    pub fn stats(&self, agent_id: &str) -> AgentResult<RecordStats> {
        self.db.record_stats(agent_id, &timestamp(Utc::now()))
    }
}

/// Expiry stays within four-digit years so stored timestamps keep sorting
/// chronologically as text.
fn expiry_after(now: DateTime<Utc>, ttl_secs: i64) -> AgentResult<DateTime<Utc>> {
    Duration::try_seconds(ttl_secs)
        .and_then(|ttl| now.checked_add_signed(ttl))
        .filter(|expires| expires.year() <= 9999)
        .ok_or_else(|| AgentError::Validation(format!("ttl out of range: {}", ttl_secs)))
}

/// Textual prefix check only. A SELECT that calls a side-effecting function
/// still passes.
pub fn ensure_select(sql: &str) -> AgentResult<()> {
    let head: String = sql.trim_start().chars().take(6).collect();
    if head.eq_ignore_ascii_case("select") {
        Ok(())
    } else {
        Err(AgentError::Permission(
            "only SELECT statements are allowed".to_string(),
        ))
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn is_safe_fragment(fragment: &str) -> bool {
    !fragment.contains(';') && !fragment.contains("--") && !fragment.contains("/*")
}

fn build_create_table(req: &SchemaRequest) -> AgentResult<(String, String)> {
    let table = req
        .table_name
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AgentError::Validation("table_name and columns are required".to_string()))?;
    if req.columns.is_empty() {
        return Err(AgentError::Validation(
            "table_name and columns are required".to_string(),
        ));
    }
    if !is_identifier(table) {
        return Err(AgentError::Validation(format!("invalid table name '{}'", table)));
    }

    let mut defs = Vec::with_capacity(req.columns.len());
    for col in &req.columns {
        if !is_identifier(&col.name) {
            return Err(AgentError::Validation(format!("invalid column name '{}'", col.name)));
        }
        let column_type = col.column_type.trim();
        let type_ok = !column_type.is_empty()
            && column_type
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '_' | '(' | ')' | ','));
        if !type_ok {
            return Err(AgentError::Validation(format!(
                "invalid type '{}' for column '{}'",
                col.column_type, col.name
            )));
        }
        let constraints = col.constraints.as_deref().unwrap_or("").trim();
        if !is_safe_fragment(constraints) {
            return Err(AgentError::Validation(format!(
                "invalid constraints for column '{}'",
                col.name
            )));
        }

        let def = format!("{} {} {}", col.name, column_type, constraints);
        defs.push(def.trim_end().to_string());
    }

    let sql = format!("CREATE TABLE IF NOT EXISTS {} ({})", table, defs.join(", "));
    Ok((table.to_string(), sql))
}
