// Error taxonomy for the agent hub

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use contracts::ErrorBody;
use serde_json::{json, Value};
use thiserror::Error;

pub type HubResult<T> = Result<T, HubError>;

#[derive(Error, Debug)]
pub enum HubError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("unknown agent: {agent}")]
    UnknownAgent { agent: String, known: Vec<String> },

    #[error("unknown topic: {topic}")]
    UnknownTopic { topic: String, known: Vec<String> },

    #[error("unknown session: {0}")]
    UnknownSession(String),

    #[error("unknown escalation: {0}")]
    UnknownEscalation(String),

    #[error("escalation {id} is {status}, not pending")]
    AlreadyResolved { id: String, status: String },

    #[error("action 'correct' requires a response")]
    MissingResponse,

    #[error("session {0} has expired")]
    SessionExpired(String),

    #[error("worker timed out: {0}")]
    WorkerTimeout(String),

    #[error("worker call failed: {0}")]
    WorkerError(String),

    #[error("audit write failed: {0}")]
    AuditWriteFailure(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl HubError {
    fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::UnknownAgent { .. } => "unknown_agent",
            Self::UnknownTopic { .. } => "unknown_topic",
            Self::UnknownSession(_) => "unknown_session",
            Self::UnknownEscalation(_) => "unknown_escalation",
            Self::AlreadyResolved { .. } => "already_resolved",
            Self::MissingResponse => "missing_response",
            Self::SessionExpired(_) => "session_expired",
            Self::WorkerTimeout(_) => "worker_timeout",
            Self::WorkerError(_) => "worker_error",
            Self::AuditWriteFailure(_) => "audit_write_failure",
            Self::Database(_) | Self::Internal(_) => "internal",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::MissingResponse | Self::SessionExpired(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::UnknownAgent { .. }
            | Self::UnknownTopic { .. }
            | Self::UnknownSession(_)
            | Self::UnknownEscalation(_) => StatusCode::NOT_FOUND,
            Self::AlreadyResolved { .. } => StatusCode::CONFLICT,
            Self::WorkerTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::WorkerError(_) => StatusCode::BAD_GATEWAY,
            Self::AuditWriteFailure(_) | Self::Database(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn details(&self) -> Option<Value> {
        match self {
            Self::UnknownAgent { known, .. } => Some(json!({ "known_agents": known })),
            Self::UnknownTopic { known, .. } => Some(json!({ "known_topics": known })),
            Self::AlreadyResolved { status, .. } => Some(json!({ "status": status })),
            _ => None,
        }
    }
}

impl IntoResponse for HubError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("request failed: {}", self);
        }
        let mut body = ErrorBody::new(self.code(), self.to_string());
        if let Some(details) = self.details() {
            body = body.with_details(details);
        }
        (status, Json(body)).into_response()
    }
}
