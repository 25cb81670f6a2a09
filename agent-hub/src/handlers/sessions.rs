// Session handlers

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{HubError, HubResult};
use crate::models::SessionResponse;
use crate::routing;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub agent_id: String,
    #[serde(default)]
    pub feature_id: Option<String>,
}

// POST /sessions
pub async fn create_session(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateSessionRequest>,
) -> HubResult<(StatusCode, Json<SessionResponse>)> {
    if !state.config.routing.agents.contains_key(&payload.agent_id) {
        return Err(HubError::UnknownAgent {
            agent: payload.agent_id,
            known: routing::known_agents(&state.config.routing),
        });
    }

    let session = state
        .sessions
        .create(
            &Uuid::new_v4().to_string(),
            &payload.agent_id,
            payload.feature_id.as_deref(),
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(SessionResponse::from_session(session, Vec::new())),
    ))
}

// GET /sessions/:id
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> HubResult<Json<SessionResponse>> {
    let session = state.sessions.get(&id).await?;
    let messages = state.sessions.messages(&id).await?;
    Ok(Json(SessionResponse::from_session(session, messages)))
}

// DELETE /sessions/:id
pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> HubResult<Json<SessionResponse>> {
    let session = state.sessions.close(&id).await?;
    let messages = state.sessions.messages(&id).await?;
    Ok(Json(SessionResponse::from_session(session, messages)))
}
