//! Record endpoints: store, retrieve, read-only query and transactional batch.

use actix_web::{web, HttpResponse};

use crate::error::AgentError;
use crate::models::{BatchBody, QueryRequest, StoreRequest};
use crate::AppState;

pub fn config(cfg: &mut web::ServiceConfig) {
    // Plain resources: a "/api" scope would swallow the sync and schema routes
    cfg.service(web::resource("/api/store").route(web::post().to(store)));
    cfg.service(web::resource("/api/retrieve/{agent_id}/{key}").route(web::get().to(retrieve)));
    cfg.service(web::resource("/api/query").route(web::post().to(query)));
    cfg.service(web::resource("/api/batch").route(web::post().to(batch)));
}

/// POST /api/store
async fn store(
    state: web::Data<AppState>,
    body: web::Json<StoreRequest>,
) -> Result<HttpResponse, AgentError> {
    let receipt = state.records.store(&body)?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "id": receipt.id,
        "message": "Data stored successfully"
    })))
}

/// GET /api/retrieve/{agent_id}/{key}
async fn retrieve(
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse, AgentError> {
    let (agent_id, key) = path.into_inner();
    match state.records.retrieve(&agent_id, &key)? {
        Some(record) => Ok(HttpResponse::Ok().json(record)),
        None => Err(AgentError::NotFound { key }),
    }
}

/// POST /api/query: SELECT only
async fn query(
    state: web::Data<AppState>,
    body: web::Json<QueryRequest>,
) -> Result<HttpResponse, AgentError> {
    let result = state.records.query(&body.sql, &body.args).map_err(|e| {
        log::warn!("Query rejected or failed: {}", e);
        e
    })?;
    Ok(HttpResponse::Ok().json(result))
}

/// POST /api/batch
async fn batch(state: web::Data<AppState>, body: web::Json<BatchBody>) -> HttpResponse {
    let operations = body.into_inner().into_operations();
    match state.records.batch(&operations) {
        Ok(count) => HttpResponse::Ok().json(serde_json::json!({
            "success": true,
            "count": count,
            "message": "Batch executed successfully"
        })),
        Err(failure) => HttpResponse::InternalServerError().json(serde_json::json!({
            "success": false,
            "count": failure.attempted,
            "message": failure.to_string()
        })),
    }
}
