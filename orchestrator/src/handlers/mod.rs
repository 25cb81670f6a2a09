use std::sync::Arc;

use axum::{extract::State, Json};
use contracts::HealthResponse;

use crate::error::OrchestratorResult;
use crate::AppState;

pub mod workflows;

// GET /health
pub async fn health(State(state): State<Arc<AppState>>) -> OrchestratorResult<Json<HealthResponse>> {
    state.db.health_check().await?;

    Ok(Json(HealthResponse::ok(
        state.started_at.elapsed().as_secs(),
        env!("CARGO_PKG_VERSION"),
    )))
}
