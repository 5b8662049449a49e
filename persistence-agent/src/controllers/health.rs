use actix_web::{web, HttpResponse, Responder};
use chrono::Utc;

use crate::agent::AgentStatus;
use crate::db::timestamp;
use crate::AppState;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/health").route(web::get().to(health_check)));
    cfg.service(web::resource("/discovery").route(web::get().to(discovery)));
}

/// Liveness check. Pings the database and flips the agent status to match.
async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let db = state.db.clone();
    let healthy = web::block(move || db.ping()).await.unwrap_or(false);

    if healthy {
        state.agent.set_status(AgentStatus::Active);
    } else {
        log::error!("Health check: database unreachable");
        state.agent.set_status(AgentStatus::Error);
    }

    HttpResponse::Ok().json(serde_json::json!({
        "status": state.agent.status(),
        "agent": state.agent.name,
        "uptime": state.agent.uptime_secs(),
        "timestamp": timestamp(Utc::now())
    }))
}

async fn discovery(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(state.agent.metadata())
}
