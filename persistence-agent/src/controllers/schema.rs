use actix_web::{web, HttpResponse};

use crate::error::AgentError;
use crate::models::SchemaRequest;
use crate::AppState;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/api/schema").route(web::post().to(create_table)));
}

/// POST /api/schema: CREATE TABLE IF NOT EXISTS
async fn create_table(
    state: web::Data<AppState>,
    body: web::Json<SchemaRequest>,
) -> Result<HttpResponse, AgentError> {
    let table = state.records.create_table(&body)?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "table": table,
        "message": format!("Table {} created or already present", table)
    })))
}
