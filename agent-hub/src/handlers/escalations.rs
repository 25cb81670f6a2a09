// Escalation handlers

use std::str::FromStr;
use std::sync::Arc;
use std::sync::LazyLock;

use axum::{
    extract::{Path, State},
    Json,
};
use regex::Regex;
use serde::Deserialize;

use crate::error::{HubError, HubResult};
use crate::escalations::reroute_question;
use crate::models::{EscalationResponse, HumanAction};
use crate::AppState;

static RESPONDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^@?[a-z0-9][a-z0-9-]*$").expect("static pattern"));

#[derive(Debug, Deserialize)]
pub struct ResolveEscalationRequest {
    pub action: String,
    #[serde(default)]
    pub response: Option<String>,
    pub responder: String,
}

// GET /escalations/:id
pub async fn get_escalation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> HubResult<Json<EscalationResponse>> {
    let escalation = state.escalations.get(&id).await?;
    Ok(Json(escalation.into()))
}

// POST /escalations/:id
pub async fn resolve_escalation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<ResolveEscalationRequest>,
) -> HubResult<Json<EscalationResponse>> {
    let action = HumanAction::from_str(&payload.action).map_err(HubError::Validation)?;

    if !RESPONDER_RE.is_match(&payload.responder) {
        return Err(HubError::Validation(format!(
            "responder '{}' must match ^@?[a-z0-9][a-z0-9-]*$",
            payload.responder
        )));
    }

    let escalation = state
        .escalations
        .resolve(&id, action, payload.response, &payload.responder)
        .await?;

    let mut response = EscalationResponse::from(escalation.clone());
    if action == HumanAction::AddContext {
        // Hand the enriched question back so the caller can re-ask in the
        // same session.
        response.reroute_question = Some(reroute_question(&escalation));
    }

    Ok(Json(response))
}
