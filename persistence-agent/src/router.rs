//! Command router for agent messages.
//!
//! A message body is either a JSON envelope naming an `operation`
//! (store / retrieve / query) or a free-text command. Every path ends in an
//! [`Outcome`]; errors never escape the router.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::error::{AgentError, AgentResult};
use crate::models::StoreRequest;
use crate::store::RecordStore;

const HELP_TEXT: &str = "Persistence agent commands:\n\
    \n\
    - list: list stored keys\n\
    - stats: record statistics\n\
    - help: this message\n\
    \n\
    Or send JSON with \"operation\": \"store\" | \"retrieve\" | \"query\".\n\
    Deleting records is not available through this agent.";

const UNRECOGNIZED_TEXT: &str = "Command not understood. Send 'help' to see the available commands.";

/// Free-text commands, matched in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Help,
    List,
    Stats,
    Unrecognized,
}

impl Command {
    pub fn parse(text: &str) -> Self {
        let lower = text.to_lowercase();
        if ["help", "ajuda", "comandos"].iter().any(|w| lower.contains(w)) {
            Command::Help
        } else if lower.starts_with("list") {
            Command::List
        } else if lower.starts_with("stats") {
            Command::Stats
        } else {
            Command::Unrecognized
        }
    }
}

/// Structured request carried in a message body.
#[derive(Debug, Deserialize)]
#[serde(tag = "operation", rename_all = "lowercase")]
enum Envelope {
    Store {
        key: Option<String>,
        #[serde(default)]
        value: Value,
        ttl: Option<i64>,
        metadata: Option<Value>,
    },
    Retrieve {
        key: Option<String>,
    },
    Query {
        sql: Option<String>,
        #[serde(default)]
        args: Vec<Value>,
    },
}

const OPERATIONS: [&str; 3] = ["store", "retrieve", "query"];

/// `None` when the body should be read as free text.
fn parse_envelope(body: &str) -> Option<AgentResult<Envelope>> {
    let value: Value = serde_json::from_str(body).ok()?;
    let operation = value.get("operation")?.as_str()?.to_string();
    if !OPERATIONS.contains(&operation.as_str()) {
        return None;
    }
    Some(serde_json::from_value(value).map_err(|e| {
        AgentError::Validation(format!("malformed {} request: {}", operation, e))
    }))
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Outcome {
    pub is_complete: bool,
    pub requires_input: bool,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Outcome {
    pub fn complete(text: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            is_complete: true,
            requires_input: false,
            text: text.into(),
            data,
        }
    }

    pub fn needs_input(text: impl Into<String>) -> Self {
        Self {
            is_complete: false,
            requires_input: true,
            text: text.into(),
            data: None,
        }
    }

    /// Transient progress update emitted while streaming.
    pub fn working(text: impl Into<String>) -> Self {
        Self {
            is_complete: false,
            requires_input: false,
            text: text.into(),
            data: None,
        }
    }

    pub fn from_error(err: &AgentError) -> Self {
        Self::needs_input(format!("error: {}", err))
    }
}

pub struct CommandRouter {
    records: Arc<RecordStore>,
}

impl CommandRouter {
    pub fn new(records: Arc<RecordStore>) -> Self {
        Self { records }
    }

    pub fn route(&self, agent_id: &str, session_id: &str, body: &str) -> Outcome {
        let outcome = match self.dispatch(agent_id, session_id, body) {
            Ok(outcome) => outcome,
            Err(e) => {
                log::warn!("[session {}] request failed: {}", session_id, e);
                Outcome::from_error(&e)
            }
        };
        log::info!(
            "[session {}] processed (complete: {})",
            session_id,
            outcome.is_complete
        );
        outcome
    }

    /// Progress update followed by the final outcome.
    pub fn route_stream(&self, agent_id: &str, session_id: &str, body: &str) -> Vec<Outcome> {
        vec![
            Outcome::working("Processing your request..."),
            self.route(agent_id, session_id, body),
        ]
    }

    fn dispatch(&self, agent_id: &str, session_id: &str, body: &str) -> AgentResult<Outcome> {
        match parse_envelope(body) {
            Some(envelope) => self.dispatch_envelope(agent_id, session_id, envelope?),
            None => self.dispatch_command(agent_id, Command::parse(body)),
        }
    }

    fn dispatch_envelope(
        &self,
        agent_id: &str,
        session_id: &str,
        envelope: Envelope,
    ) -> AgentResult<Outcome> {
        match envelope {
            Envelope::Store {
                key,
                value,
                ttl,
                metadata,
            } => {
                let key = require_key(key)?;
                let receipt = self.records.store(&StoreRequest {
                    agent_id: agent_id.to_string(),
                    key,
                    value,
                    metadata,
                    ttl,
                    session_id: Some(session_id.to_string()),
                })?;
                Ok(Outcome::complete(
                    format!("Stored data for key: {}", receipt.key),
                    Some(serde_json::to_value(&receipt)?),
                ))
            }
            Envelope::Retrieve { key } => {
                let key = require_key(key)?;
                match self.records.retrieve(agent_id, &key)? {
                    Some(record) => Ok(Outcome::complete(
                        format!("Retrieved data for key: {}", key),
                        Some(serde_json::to_value(&record)?),
                    )),
                    None => Ok(Outcome::complete(
                        AgentError::NotFound { key }.to_string(),
                        None,
                    )),
                }
            }
            Envelope::Query { sql, args } => {
                let sql = sql
                    .filter(|s| !s.trim().is_empty())
                    .ok_or_else(|| AgentError::Validation("sql is required".to_string()))?;
                let result = self.records.query(&sql, &args)?;
                Ok(Outcome::complete(
                    format!("Query executed. {} rows found.", result.rows.len()),
                    Some(serde_json::to_value(&result)?),
                ))
            }
        }
    }

    fn dispatch_command(&self, agent_id: &str, command: Command) -> AgentResult<Outcome> {
        match command {
            Command::Help => Ok(Outcome::complete(HELP_TEXT, None)),
            Command::List => {
                let entries = self.records.list_keys(agent_id)?;
                let text = if entries.is_empty() {
                    "No keys stored yet".to_string()
                } else {
                    let lines: Vec<String> = entries
                        .iter()
                        .map(|e| format!("- {} (updated: {})", e.key, e.updated_at))
                        .collect();
                    format!("Stored keys:\n{}", lines.join("\n"))
                };
                let keys: Vec<&str> = entries.iter().map(|e| e.key.as_str()).collect();
                Ok(Outcome::complete(text, Some(json!({ "keys": keys }))))
            }
            Command::Stats => {
                let stats = self.records.stats(agent_id)?;
                Ok(Outcome::complete(
                    format!(
                        "Statistics:\n- Total records: {}\n- Unique keys: {}",
                        stats.total_records, stats.unique_keys
                    ),
                    Some(serde_json::to_value(stats)?),
                ))
            }
            Command::Unrecognized => Ok(Outcome::needs_input(UNRECOGNIZED_TEXT)),
        }
    }
}

fn require_key(key: Option<String>) -> AgentResult<String> {
    key.filter(|k| !k.trim().is_empty())
        .ok_or_else(|| AgentError::Validation("key is required".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    fn router() -> CommandRouter {
        let records = RecordStore::new(Arc::new(Database::in_memory()), None);
        CommandRouter::new(Arc::new(records))
    }

    #[test]
    fn test_command_parse_priority() {
        assert_eq!(Command::parse("help"), Command::Help);
        assert_eq!(Command::parse("Preciso de AJUDA"), Command::Help);
        assert_eq!(Command::parse("list comandos"), Command::Help);
        assert_eq!(Command::parse("LIST"), Command::List);
        assert_eq!(Command::parse("listing everything"), Command::List);
        assert_eq!(Command::parse("stats please"), Command::Stats);
        // Not trimmed before matching
        assert_eq!(Command::parse("  list"), Command::Unrecognized);
        assert_eq!(Command::parse("hello"), Command::Unrecognized);
        assert_eq!(Command::parse(""), Command::Unrecognized);
    }

    #[test]
    fn test_store_then_retrieve_via_envelope() {
        let router = router();
        let stored = router.route(
            "a1",
            "s1",
            r#"{"operation":"store","key":"k1","value":{"x":1},"metadata":{"tag":"t"}}"#,
        );
        assert!(stored.is_complete);
        assert!(!stored.requires_input);
        assert_eq!(stored.data.as_ref().unwrap()["stored"], json!(true));

        let retrieved = router.route("a1", "s1", r#"{"operation":"retrieve","key":"k1"}"#);
        assert!(retrieved.is_complete);
        let data = retrieved.data.unwrap();
        assert_eq!(data["value"], json!({"x": 1}));
        assert_eq!(data["session_id"], json!("s1"));
    }

    #[test]
    fn test_retrieve_missing_is_complete_without_data() {
        let outcome = router().route("a1", "s1", r#"{"operation":"retrieve","key":"nope"}"#);
        assert!(outcome.is_complete);
        assert!(outcome.data.is_none());
        assert!(outcome.text.contains("nope"));
    }

    #[test]
    fn test_query_rejects_non_select() {
        let outcome = router().route("a1", "s1", r#"{"operation":"query","sql":"DELETE FROM agent_data"}"#);
        assert!(!outcome.is_complete);
        assert!(outcome.requires_input);
        assert!(outcome.text.starts_with("error: "));
    }

    #[test]
    fn test_query_returns_rows() {
        let router = router();
        router.route("a1", "s1", r#"{"operation":"store","key":"k1","value":1}"#);
        let outcome = router.route(
            "a1",
            "s1",
            r#"{"operation":"query","sql":"SELECT key FROM agent_data WHERE agent_id = ?1","args":["a1"]}"#,
        );
        assert!(outcome.is_complete);
        assert_eq!(outcome.data.unwrap()["rows"][0]["key"], json!("k1"));
    }

    #[test]
    fn test_malformed_envelope_is_error_outcome() {
        let router = router();
        let missing_key = router.route("a1", "s1", r#"{"operation":"store","value":1}"#);
        assert!(missing_key.requires_input);
        assert!(missing_key.text.starts_with("error: "));

        let wrong_type = router.route("a1", "s1", r#"{"operation":"store","key":"k","ttl":"soon"}"#);
        assert!(wrong_type.text.starts_with("error: "));
    }

    #[test]
    fn test_unknown_operation_falls_back_to_text() {
        let outcome = router().route("a1", "s1", r#"{"operation":"delete","key":"k1"}"#);
        assert_eq!(outcome, Outcome::needs_input(UNRECOGNIZED_TEXT));
    }

    #[test]
    fn test_list_and_stats() {
        let router = router();
        let empty = router.route("a1", "s1", "list");
        assert!(empty.is_complete);
        assert_eq!(empty.data.unwrap()["keys"], json!([]));

        router.route("a1", "s1", r#"{"operation":"store","key":"first","value":1}"#);
        router.route("a1", "s1", r#"{"operation":"store","key":"second","value":2}"#);
        router.route("a1", "s1", r#"{"operation":"store","key":"first","value":3}"#);
        router.route("other", "s2", r#"{"operation":"store","key":"elsewhere","value":4}"#);

        let listed = router.route("a1", "s1", "list keys");
        assert_eq!(listed.data.unwrap()["keys"], json!(["first", "second"]));

        let stats = router.route("a1", "s1", "STATS");
        let data = stats.data.unwrap();
        assert_eq!(data["unique_keys"], json!(2));
        assert!(data["unique_keys"].as_i64() <= data["total_records"].as_i64());
    }

    #[test]
    fn test_help_and_unrecognized() {
        let router = router();
        let help = router.route("a1", "s1", "help");
        assert!(help.is_complete);
        assert!(help.text.contains("stats"));

        let unknown = router.route("a1", "s1", "do something");
        assert!(!unknown.is_complete);
        assert!(unknown.requires_input);
    }

    #[test]
    fn test_stream_yields_progress_then_final() {
        let outcomes = router().route_stream("a1", "s1", "help");
        assert_eq!(outcomes.len(), 2);
        assert!(!outcomes[0].is_complete);
        assert!(!outcomes[0].requires_input);
        assert!(outcomes[1].is_complete);
    }
}
