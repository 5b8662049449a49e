pub mod agent_protocol;
pub mod health;
pub mod records;
pub mod schema;
pub mod sync;
pub mod well_known;

use actix_web::web;

use crate::error::AgentError;

/// Register every route the agent serves.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.configure(health::config)
        .configure(well_known::config)
        .configure(records::config)
        .configure(sync::config)
        .configure(schema::config)
        .configure(agent_protocol::config);
}

/// JSON extractor settings: body limit, and malformed bodies answered as
/// validation errors instead of actix's plain-text default.
pub fn json_config(limit: usize) -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(limit)
        .error_handler(|err, req| {
            log::warn!("Rejected body for {}: {}", req.path(), err);
            AgentError::Validation(format!("invalid request body: {}", err)).into()
        })
}

#[cfg(test)]
pub(crate) fn test_state() -> crate::AppState {
    use std::sync::Arc;

    crate::AppState::new(
        crate::config::Config::default(),
        Arc::new(crate::db::Database::in_memory()),
    )
}
