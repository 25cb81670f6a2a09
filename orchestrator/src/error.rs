// Error taxonomy for the orchestrator service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use contracts::ErrorBody;
use thiserror::Error;

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("unknown workflow: {0}")]
    UnknownWorkflow(String),

    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    #[error("agent hub call failed: {0}")]
    Hub(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl OrchestratorError {
    fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::UnknownWorkflow(_) => "unknown_workflow",
            Self::InvalidTransition(_) => "invalid_transition",
            Self::Hub(_) => "hub_error",
            Self::Database(_) | Self::Internal(_) => "internal",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::InvalidTransition(_) => StatusCode::BAD_REQUEST,
            Self::UnknownWorkflow(_) => StatusCode::NOT_FOUND,
            Self::Hub(_) => StatusCode::BAD_GATEWAY,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for OrchestratorError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("request failed: {}", self);
        }
        let body = ErrorBody::new(self.code(), self.to_string());
        (status, Json(body)).into_response()
    }
}
