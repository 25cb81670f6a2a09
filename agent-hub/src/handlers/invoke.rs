// Direct worker invocation: no topic routing, no confidence gate.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use uuid::Uuid;

use contracts::{HubInvokeResponse, InvokeRequest};

use crate::audit::{AuditRecord, AuditStatus};
use crate::error::{HubError, HubResult};
use crate::routing;
use crate::sessions::SessionStore;
use crate::AppState;

// POST /invoke/:agent
pub async fn invoke_agent(
    State(state): State<Arc<AppState>>,
    Path(agent_id): Path<String>,
    Json(payload): Json<InvokeRequest>,
) -> HubResult<Json<HubInvokeResponse>> {
    let agent = state
        .config
        .routing
        .agents
        .get(&agent_id)
        .cloned()
        .ok_or_else(|| HubError::UnknownAgent {
            agent: agent_id.clone(),
            known: routing::known_agents(&state.config.routing),
        })?;

    let feature_id = payload
        .context
        .get("feature_id")
        .and_then(Value::as_str)
        .map(str::to_owned);

    // A returned session_id must resolve, so make sure one exists.
    let session_uuid = match payload.session_id {
        Some(uuid) => {
            let session = state.sessions.get(&uuid.to_string()).await?;
            SessionStore::ensure_active(&session)?;
            uuid
        }
        None => {
            let uuid = Uuid::new_v4();
            state
                .sessions
                .create(&uuid.to_string(), &agent_id, feature_id.as_deref())
                .await?;
            uuid
        }
    };

    let request = InvokeRequest {
        workflow_type: payload.workflow_type.clone(),
        context: payload.context.clone(),
        parameters: payload.parameters.clone(),
        session_id: Some(session_uuid),
    };

    let started = Instant::now();
    let response = state.worker.invoke(&agent, &request).await?;
    let duration_ms = started.elapsed().as_millis() as u64;

    let record = AuditRecord {
        id: Uuid::new_v4().to_string(),
        timestamp: Utc::now(),
        session_id: Some(session_uuid.to_string()),
        feature_id: feature_id.unwrap_or_else(|| "unassigned".to_string()),
        topic: agent_id.clone(),
        question: format!("invoke:{}", payload.workflow_type),
        answer: response.answer_text(),
        confidence: response.confidence,
        status: AuditStatus::Resolved,
        escalation_id: None,
        duration_ms,
        metadata: json!({
            "workflow_type": payload.workflow_type,
            "success": response.success,
        }),
    };
    state.audit.append(&record).await?;

    Ok(Json(HubInvokeResponse::from_worker(response, session_uuid)))
}
