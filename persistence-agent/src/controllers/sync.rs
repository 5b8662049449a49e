use actix_web::{web, HttpResponse};
use serde::Deserialize;

use crate::error::AgentError;
use crate::models::SyncRequest;
use crate::AppState;

const DEFAULT_LOG_LIMIT: usize = 50;
const MAX_LOG_LIMIT: usize = 500;

#[derive(Deserialize)]
struct LogsQuery {
    limit: Option<usize>,
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/api/sync").route(web::post().to(sync)));
    cfg.service(web::resource("/api/sync/logs").route(web::get().to(list_logs)));
}

async fn sync(
    state: web::Data<AppState>,
    body: web::Json<SyncRequest>,
) -> Result<HttpResponse, AgentError> {
    let receipt = state.sync_log.record(&body)?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "sync_id": receipt.sync_id,
        "message": "Sync recorded successfully"
    })))
}

/// GET /api/sync/logs?limit=N: newest first
async fn list_logs(
    state: web::Data<AppState>,
    query: web::Query<LogsQuery>,
) -> Result<HttpResponse, AgentError> {
    let limit = query.limit.unwrap_or(DEFAULT_LOG_LIMIT).clamp(1, MAX_LOG_LIMIT);
    let entries = state.sync_log.recent(limit)?;
    Ok(HttpResponse::Ok().json(entries))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controllers::{json_config, test_state};
    use actix_web::http::StatusCode;
    use actix_web::{test, App};
    use serde_json::{json, Value};

    #[actix_web::test]
    async fn test_sync_records_entry() {
        let state = test_state();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state.clone()))
                .app_data(json_config(1024 * 1024))
                .configure(config),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/sync")
            .set_json(json!({"source_agent": "agent-a", "operation": "memory_update", "data": {"k": 1}}))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["success"], true);

        let entries = state.sync_log.recent(5).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(body["sync_id"], entries[0].id.as_str());
        assert_eq!(entries[0].status, "completed");

        let req = test::TestRequest::get().uri("/api/sync/logs?limit=1").to_request();
        let logs: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(logs.as_array().unwrap().len(), 1);
        assert_eq!(logs[0]["operation"], "memory_update");
    }

    #[actix_web::test]
    async fn test_sync_without_source_is_400() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(test_state()))
                .app_data(json_config(1024 * 1024))
                .configure(config),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/sync")
            .set_json(json!({"source_agent": "", "operation": "op"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
