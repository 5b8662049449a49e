//! Agent message endpoint: JSON-RPC 2.0 over `POST /`.
//!
//! `message/send` answers with a task, `message/stream` with Server-Sent
//! Events (progress status, then the final task). Task cancellation is not
//! supported.

use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::db::timestamp;
use crate::router::Outcome;
use crate::AppState;

const PARSE_ERROR: i64 = -32700;
const METHOD_NOT_FOUND: i64 = -32601;
const INVALID_PARAMS: i64 = -32602;
const UNSUPPORTED_OPERATION: i64 = -32004;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/").route(web::post().to(handle)));
}

async fn handle(state: web::Data<AppState>, body: web::Bytes) -> HttpResponse {
    let request: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(e) => return rpc_error(Value::Null, PARSE_ERROR, &format!("parse error: {}", e)),
    };

    let id = request.get("id").cloned().unwrap_or(Value::Null);
    // A body without a method is a bare `message/send` payload
    let (method, params) = match request.get("method").and_then(Value::as_str) {
        Some(method) => (method, request.get("params").cloned().unwrap_or(Value::Null)),
        None => ("message/send", request.clone()),
    };

    match method {
        "message/send" | "message/stream" => {
            let Some(message) = params.get("message") else {
                return rpc_error(id, INVALID_PARAMS, "params.message is required");
            };
            let text = message_text(message);
            let context_id = message
                .get("contextId")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| Uuid::new_v4().to_string());
            let task_id = Uuid::new_v4().to_string();

            let router = state.router.clone();
            let agent_id = state.agent.id.clone();
            let stream = method == "message/stream";
            let session = context_id.clone();
            let outcomes = web::block(move || {
                if stream {
                    router.route_stream(&agent_id, &session, &text)
                } else {
                    vec![router.route(&agent_id, &session, &text)]
                }
            })
            .await;

            let outcomes = match outcomes {
                Ok(outcomes) => outcomes,
                Err(e) => {
                    log::error!("Message handling aborted: {}", e);
                    vec![Outcome::needs_input(format!("error: {}", e))]
                }
            };

            if stream {
                sse_response(&id, &task_id, &context_id, &outcomes)
            } else {
                let final_outcome = outcomes.last().cloned().unwrap_or_else(|| Outcome::working(""));
                rpc_result(id, task(&task_id, &context_id, &final_outcome))
            }
        }
        "tasks/cancel" => rpc_error(id, UNSUPPORTED_OPERATION, "unsupported operation: tasks cannot be canceled"),
        other => rpc_error(id, METHOD_NOT_FOUND, &format!("method not found: {}", other)),
    }
}

/// `message.text`, else the text and data parts joined by newlines.
fn message_text(message: &Value) -> String {
    if let Some(text) = message.get("text").and_then(Value::as_str) {
        return text.to_string();
    }
    let Some(parts) = message.get("parts").and_then(Value::as_array) else {
        return String::new();
    };

    parts
        .iter()
        .filter_map(|part| {
            let kind = part.get("kind").or_else(|| part.get("type")).and_then(Value::as_str);
            match kind {
                Some("text") => part.get("text").and_then(Value::as_str).map(str::to_string),
                Some("data") => part.get("data").map(Value::to_string),
                _ => None,
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn task_state(outcome: &Outcome) -> &'static str {
    if outcome.is_complete {
        "completed"
    } else if outcome.requires_input {
        "input-required"
    } else {
        "working"
    }
}

fn task_status(outcome: &Outcome) -> Value {
    json!({
        "state": task_state(outcome),
        "message": {
            "kind": "message",
            "role": "agent",
            "messageId": Uuid::new_v4().to_string(),
            "parts": [{"kind": "text", "text": outcome.text}]
        },
        "timestamp": timestamp(Utc::now())
    })
}

fn task(task_id: &str, context_id: &str, outcome: &Outcome) -> Value {
    let artifacts = if outcome.is_complete {
        let mut parts = vec![json!({"kind": "text", "text": outcome.text})];
        if let Some(data) = &outcome.data {
            parts.push(json!({"kind": "data", "data": data}));
        }
        vec![json!({"artifactId": Uuid::new_v4().to_string(), "name": "result", "parts": parts})]
    } else {
        Vec::new()
    };

    json!({
        "id": task_id,
        "contextId": context_id,
        "kind": "task",
        "status": task_status(outcome),
        "artifacts": artifacts
    })
}

fn sse_response(id: &Value, task_id: &str, context_id: &str, outcomes: &[Outcome]) -> HttpResponse {
    let mut body = String::new();
    for (idx, outcome) in outcomes.iter().enumerate() {
        let result = if idx + 1 == outcomes.len() {
            task(task_id, context_id, outcome)
        } else {
            json!({
                "kind": "status-update",
                "taskId": task_id,
                "contextId": context_id,
                "status": task_status(outcome),
                "final": false
            })
        };
        let event = json!({"jsonrpc": "2.0", "id": id, "result": result});
        body.push_str(&format!("data: {}\n\n", event));
    }

    HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(("Cache-Control", "no-cache"))
        .body(body)
}

fn rpc_result(id: Value, result: Value) -> HttpResponse {
    HttpResponse::Ok().json(json!({"jsonrpc": "2.0", "id": id, "result": result}))
}

fn rpc_error(id: Value, code: i64, message: &str) -> HttpResponse {
    log::warn!("JSON-RPC error {}: {}", code, message);
    HttpResponse::Ok().json(json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {"code": code, "message": message}
    }))
}
