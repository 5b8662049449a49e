use actix_web::{web, HttpResponse, Responder};
use serde_json::{json, Value};

use crate::agent::{CAPABILITIES, ENDPOINTS, VERSION};
use crate::AppState;

const DESCRIPTION: &str =
    "Persistence agent: durable key/value storage with TTL, read-only SQL and cross-agent sync";

const IO_MODES: [&str; 3] = ["text", "text/plain", "application/json"];

fn skill(id: &str, name: &str, description: &str, tags: &[&str], examples: &[&str]) -> Value {
    json!({
        "id": id,
        "name": name,
        "description": description,
        "tags": tags,
        "examples": examples
    })
}

fn skills() -> Vec<Value> {
    vec![
        skill(
            "store_data",
            "Store Data",
            "Persist a value under a key, with optional TTL",
            &["storage", "persistence", "database"],
            &[r#"{"operation": "store", "key": "user_123", "value": {"name": "Ana"}}"#],
        ),
        skill(
            "retrieve_data",
            "Retrieve Data",
            "Fetch the live value stored under a key",
            &["query", "fetch", "database"],
            &[r#"{"operation": "retrieve", "key": "user_123"}"#],
        ),
        skill(
            "execute_query",
            "Execute SQL Query",
            "Run a read-only SELECT statement",
            &["sql", "query", "database", "analytics"],
            &[r#"{"operation": "query", "sql": "SELECT key FROM agent_data"}"#, "list", "stats"],
        ),
        skill(
            "memory_sync",
            "Memory Sync",
            "Record sync events exchanged with other agents",
            &["sync", "memory", "coordination"],
            &["POST /api/sync"],
        ),
        skill(
            "batch_operations",
            "Batch Operations",
            "Run several statements in one transaction",
            &["batch", "transaction"],
            &["POST /api/batch"],
        ),
    ]
}

/// Serve the agent card at /.well-known/agent.json
async fn agent_card(state: web::Data<AppState>) -> impl Responder {
    let config = &state.config;
    let endpoints: serde_json::Map<String, Value> = ENDPOINTS
        .iter()
        .map(|(name, path)| (name.to_string(), json!(path)))
        .collect();

    HttpResponse::Ok().json(json!({
        "name": config.agent_name,
        "description": DESCRIPTION,
        "url": format!("{}/", config.public_url()),
        "version": VERSION,
        "capabilities": {
            "streaming": true,
            "batch": true,
            "persistence": true,
            "features": CAPABILITIES
        },
        "skills": skills(),
        "endpoints": endpoints,
        "discovery": {
            "enabled": config.discovery_url.is_some(),
            "url": config.discovery_url,
            "interval_secs": config.discovery_interval_secs
        },
        "database": {
            "type": "sqlite",
            "remote": config.is_remote_database(),
            "supports_ttl": true,
            "supports_sql": true,
            "supports_sync": true
        },
        "defaultInputModes": IO_MODES,
        "defaultOutputModes": IO_MODES
    }))
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/.well-known").route("/agent.json", web::get().to(agent_card)));
}
