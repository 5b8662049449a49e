//! Error taxonomy shared by the record store, the sync log and the HTTP layer.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    /// No live record for the requested key
    #[error("no data found for key '{key}'")]
    NotFound { key: String },

    /// Statement rejected before it reached the database
    #[error("{0}")]
    Permission(String),

    /// Request is missing or carries malformed fields
    #[error("{0}")]
    Validation(String),

    /// The database driver failed; the driver message is kept for diagnostics
    #[error("storage error: {0}")]
    Storage(String),

    /// Best-effort forwarding failed; logged, never returned to callers
    #[error("sync forwarding failed: {0}")]
    SyncForwarding(String),
}

pub type AgentResult<T> = Result<T, AgentError>;

impl From<rusqlite::Error> for AgentError {
    fn from(e: rusqlite::Error) -> Self {
        AgentError::Storage(e.to_string())
    }
}

impl From<r2d2::Error> for AgentError {
    fn from(e: r2d2::Error) -> Self {
        AgentError::Storage(format!("connection pool: {}", e))
    }
}

impl From<serde_json::Error> for AgentError {
    fn from(e: serde_json::Error) -> Self {
        AgentError::Storage(format!("serialization: {}", e))
    }
}

impl ResponseError for AgentError {
    fn status_code(&self) -> StatusCode {
        match self {
            AgentError::NotFound { .. } => StatusCode::NOT_FOUND,
            AgentError::Permission(_) => StatusCode::FORBIDDEN,
            AgentError::Validation(_) => StatusCode::BAD_REQUEST,
            AgentError::Storage(_) | AgentError::SyncForwarding(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "error": self.to_string()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let not_found = AgentError::NotFound { key: "k1".to_string() };
        assert_eq!(not_found.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(not_found.to_string(), "no data found for key 'k1'");

        assert_eq!(
            AgentError::Permission("only SELECT".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AgentError::Validation("table_name is required".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AgentError::Storage("disk I/O error".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_driver_message_is_preserved() {
        let err: AgentError = rusqlite::Error::QueryReturnedNoRows.into();
        match err {
            AgentError::Storage(msg) => assert!(msg.contains("Query returned no rows")),
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
