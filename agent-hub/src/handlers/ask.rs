// Topic-routed expert consultation: route, converse, gate, audit.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::warn;
use uuid::Uuid;

use contracts::{AskExpertRequest, AskExpertResponse, AskStatus, InvokeRequest};

use crate::audit::{AuditRecord, AuditStatus};
use crate::error::{HubError, HubResult};
use crate::escalations::NewEscalation;
use crate::forge::EscalationNotice;
use crate::models::{MessageRole, Session};
use crate::routing;
use crate::sessions::SessionStore;
use crate::AppState;

// POST /ask/:topic
pub async fn ask_expert(
    State(state): State<Arc<AppState>>,
    Path(topic): Path<String>,
    Json(payload): Json<AskExpertRequest>,
) -> HubResult<Json<AskExpertResponse>> {
    if payload.question.chars().count() < 10 {
        return Err(HubError::Validation(
            "question must be at least 10 characters".to_string(),
        ));
    }
    if payload.feature_id.trim().is_empty() {
        return Err(HubError::Validation("feature_id must not be empty".to_string()));
    }

    let resolution = routing::resolve_topic(&state.config.routing, &topic)?;
    let agent = state
        .config
        .routing
        .agents
        .get(&resolution.agent_id)
        .cloned()
        .ok_or_else(|| {
            HubError::Internal(anyhow::anyhow!(
                "resolved agent '{}' missing from routing table",
                resolution.agent_id
            ))
        })?;

    // Resolve or create the session, then hold its writer lock for the
    // whole exchange so concurrent asks serialize in arrival order.
    let session_uuid = match payload.session_id {
        Some(uuid) => uuid,
        None => {
            let uuid = Uuid::new_v4();
            state
                .sessions
                .create(
                    &uuid.to_string(),
                    &resolution.agent_id,
                    Some(payload.feature_id.as_str()),
                )
                .await?;
            uuid
        }
    };

    let lock = state.sessions.lock_for(&session_uuid.to_string());
    let _guard = lock.lock().await;

    let session = state.sessions.get(&session_uuid.to_string()).await?;
    SessionStore::ensure_active(&session)?;
    if session.agent_id != resolution.agent_id {
        warn!(
            session_id = %session.id,
            session_agent = %session.agent_id,
            resolved_agent = %resolution.agent_id,
            "session continues with a different agent than the topic resolves to"
        );
    }

    // Prior turns travel to the stateless worker inside the request.
    let history: Vec<Value> = state
        .sessions
        .messages(&session.id)
        .await?
        .into_iter()
        .map(|m| json!({ "role": m.role, "content": m.content }))
        .collect();

    state
        .sessions
        .append_message(
            &session.id,
            MessageRole::User,
            &payload.question,
            json!({ "topic": &topic }),
        )
        .await?;

    let request = InvokeRequest {
        workflow_type: "consult".to_string(),
        context: json!({
            "topic": &topic,
            "question": &payload.question,
            "feature_id": &payload.feature_id,
            "context": &payload.context,
            "history": history,
        }),
        parameters: None,
        session_id: Some(session_uuid),
    };

    let started = Instant::now();
    let response = state.worker.invoke(&agent, &request).await?;
    let duration_ms = started.elapsed().as_millis() as u64;

    if !response.success {
        return Err(HubError::WorkerError(
            response
                .error
                .unwrap_or_else(|| "worker reported failure".to_string()),
        ));
    }

    let answer = response.answer_text();
    let uncertainty_reasons = response.uncertainty_reasons();
    let confidence = response.confidence;
    let model_used = response
        .metadata
        .get("model_used")
        .and_then(Value::as_str)
        .map(str::to_owned)
        .or_else(|| agent.default_model.clone());
    let assistant_metadata = json!({
        "confidence": confidence,
        "model_used": model_used,
        "duration_ms": duration_ms,
    });

    let question_id = Uuid::new_v4().to_string();

    let (status, escalation_id) = if routing::meets_threshold(confidence, resolution.threshold) {
        state
            .sessions
            .append_message(&session.id, MessageRole::Assistant, &answer, assistant_metadata)
            .await?;
        (AskStatus::Resolved, None)
    } else {
        let escalation_uuid = Uuid::new_v4();
        open_escalation(
            &state,
            &session,
            escalation_uuid,
            &question_id,
            &topic,
            &payload.question,
            &answer,
            confidence,
            &uncertainty_reasons,
            assistant_metadata,
        )
        .await?;
        (AskStatus::PendingHuman, Some(escalation_uuid))
    };

    // The exchange is complete only once the audit line is on disk.
    let record = AuditRecord {
        id: question_id,
        timestamp: Utc::now(),
        session_id: Some(session.id.clone()),
        feature_id: payload.feature_id.clone(),
        topic: topic.clone(),
        question: payload.question.clone(),
        answer: answer.clone(),
        confidence,
        status: match status {
            AskStatus::Resolved => AuditStatus::Resolved,
            AskStatus::PendingHuman => AuditStatus::Escalated,
        },
        escalation_id: escalation_id.map(|id| id.to_string()),
        duration_ms,
        metadata: json!({
            "agent_id": resolution.agent_id,
            "threshold": resolution.threshold,
        }),
    };
    state.audit.append(&record).await?;

    Ok(Json(AskExpertResponse {
        status,
        answer,
        confidence,
        session_id: session_uuid,
        escalation_id,
        uncertainty_reasons,
    }))
}

#[allow(clippy::too_many_arguments)]
async fn open_escalation(
    state: &Arc<AppState>,
    session: &Session,
    escalation_uuid: Uuid,
    question_id: &str,
    topic: &str,
    question: &str,
    tentative_answer: &str,
    confidence: u8,
    uncertainty_reasons: &[String],
    assistant_metadata: Value,
) -> HubResult<()> {
    let new = NewEscalation {
        id: escalation_uuid.to_string(),
        session_id: Some(session.id.clone()),
        question_id: question_id.to_string(),
        topic: topic.to_string(),
        question: question.to_string(),
        tentative_answer: tentative_answer.to_string(),
        confidence,
        uncertainty_reasons: uncertainty_reasons.to_vec(),
    };
    state
        .escalations
        .create_with_message(new, assistant_metadata)
        .await?;

    if state.forge.enabled() {
        let notice = EscalationNotice {
            escalation_id: escalation_uuid.to_string(),
            topic: topic.to_string(),
            question: question.to_string(),
            tentative_answer: tentative_answer.to_string(),
            confidence,
            uncertainty_reasons: uncertainty_reasons.to_vec(),
        };
        if let Some(comment_id) = state.forge.post(notice).await {
            state
                .escalations
                .set_external_comment_id(&escalation_uuid.to_string(), &comment_id)
                .await?;
        }
    }

    Ok(())
}
