// Workflow handlers

use std::str::FromStr;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::Value;

use crate::error::{OrchestratorError, OrchestratorResult};
use crate::executor;
use crate::feature;
use crate::models::{HistoryResponse, Trigger, WorkflowResponse, WorkflowType};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateWorkflowRequest {
    pub workflow_type: String,
    pub feature_description: String,
    #[serde(default)]
    pub context: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct AdvanceRequest {
    pub trigger: String,
    #[serde(default)]
    pub phase_result: Option<Value>,
}

// POST /workflows
pub async fn create_workflow(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateWorkflowRequest>,
) -> OrchestratorResult<(StatusCode, Json<WorkflowResponse>)> {
    let workflow_type = WorkflowType::from_str(&payload.workflow_type)
        .map_err(OrchestratorError::Validation)?;

    if payload.feature_description.chars().count() < 10 {
        return Err(OrchestratorError::Validation(
            "feature_description must be at least 10 characters".to_string(),
        ));
    }
    if feature::slug(&payload.feature_description).is_empty() {
        return Err(OrchestratorError::Validation(
            "feature_description must contain at least one alphanumeric character".to_string(),
        ));
    }

    let phases = state.config.phases_for(workflow_type);
    let first_phase = phases.first().cloned().unwrap_or_else(|| {
        workflow_type.as_str().to_string()
    });

    let description = payload.feature_description.clone();
    let workflow = state
        .store
        .create(
            workflow_type,
            move |seq| feature::feature_id(seq, &description),
            &payload.feature_description,
            payload.context.unwrap_or_else(|| Value::Object(Default::default())),
            &first_phase,
        )
        .await?;

    executor::spawn_phase(state.clone(), workflow.id.clone());

    Ok((StatusCode::CREATED, Json(workflow.into())))
}

// GET /workflows
pub async fn list_workflows(
    State(state): State<Arc<AppState>>,
) -> OrchestratorResult<Json<Vec<WorkflowResponse>>> {
    let workflows = state.store.list().await?;
    Ok(Json(workflows.into_iter().map(Into::into).collect()))
}

// GET /workflows/:id
pub async fn get_workflow(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> OrchestratorResult<Json<WorkflowResponse>> {
    let workflow = state.store.get(&id).await?;
    Ok(Json(workflow.into()))
}

// POST /workflows/:id/advance
pub async fn advance_workflow(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<AdvanceRequest>,
) -> OrchestratorResult<Json<WorkflowResponse>> {
    let trigger =
        Trigger::from_str(&payload.trigger).map_err(OrchestratorError::Validation)?;

    let workflow = executor::advance(&state, &id, trigger, payload.phase_result).await?;
    Ok(Json(workflow.into()))
}

// GET /workflows/:id/history
pub async fn get_history(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> OrchestratorResult<Json<Vec<HistoryResponse>>> {
    // 404 before listing so an unknown id is not an empty history.
    state.store.get(&id).await?;
    let rows = state.store.history(&id).await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}
