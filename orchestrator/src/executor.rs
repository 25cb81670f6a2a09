//! Phase executor and the single advance path.
//!
//! [`advance`] is the only way a workflow changes status: the HTTP handler
//! and the executor both funnel through it, under the workflow's writer
//! lock. [`run_phase`] performs the long worker invocation outside that
//! lock, then re-enters `advance` with `agent_complete` or `error`; a
//! workflow that moved on in the meantime simply rejects the stale trigger.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{error, info, warn};

use contracts::InvokeRequest;

use crate::error::{OrchestratorError, OrchestratorResult};
use crate::models::{Trigger, Workflow, WorkflowStatus};
use crate::state_machine::target_status;
use crate::store::TransitionChanges;
use crate::AppState;

/// Apply a trigger to a workflow. Holds the workflow's writer lock for the
/// whole read-decide-write sequence.
pub async fn advance(
    state: &Arc<AppState>,
    workflow_id: &str,
    trigger: Trigger,
    phase_result: Option<Value>,
) -> OrchestratorResult<Workflow> {
    let lock = state.store.lock_for(workflow_id);
    let _guard = lock.lock().await;

    let workflow = state.store.get(workflow_id).await?;

    let plan = state.config.phases_for(workflow.workflow_type);
    let phase_index = workflow
        .current_phase
        .as_deref()
        .and_then(|phase| plan.iter().position(|p| p == phase));
    let has_more_phases = phase_index.map(|i| i + 1 < plan.len()).unwrap_or(false);

    let Some(to) = target_status(workflow.status, trigger, has_more_phases) else {
        // Redelivered error reports against an already-failed workflow are
        // idempotent: same snapshot back, no new history row.
        if workflow.status == WorkflowStatus::Failed && trigger == Trigger::Error {
            return Ok(workflow);
        }
        return Err(OrchestratorError::InvalidTransition(format!(
            "trigger '{}' is not legal from status '{}'",
            trigger.as_str(),
            workflow.status.as_str()
        )));
    };

    let changes = build_changes(&workflow, trigger, to, &plan, phase_index, phase_result);
    let updated = state.store.apply_transition(&workflow, trigger, to, changes).await?;

    info!(
        workflow_id = %updated.id,
        from = workflow.status.as_str(),
        to = updated.status.as_str(),
        trigger = trigger.as_str(),
        "workflow transitioned"
    );

    // Approval into the next phase (or rejected rework) re-enters execution.
    if updated.status == WorkflowStatus::InProgress
        && matches!(trigger, Trigger::HumanApproved | Trigger::HumanRejected)
    {
        spawn_phase(state.clone(), updated.id.clone());
    }

    Ok(updated)
}

fn build_changes(
    workflow: &Workflow,
    trigger: Trigger,
    to: WorkflowStatus,
    plan: &[String],
    phase_index: Option<usize>,
    phase_result: Option<Value>,
) -> TransitionChanges {
    let phase = workflow.current_phase.clone().unwrap_or_default();

    match trigger {
        Trigger::AgentComplete => TransitionChanges {
            result: Some(phase_result.unwrap_or(Value::Null)),
            metadata: json!({ "phase": phase }),
            ..Default::default()
        },
        Trigger::HumanApproved if to == WorkflowStatus::InProgress => {
            let next_phase = phase_index
                .and_then(|i| plan.get(i + 1))
                .cloned()
                .unwrap_or_else(|| phase.clone());
            TransitionChanges {
                current_phase: Some(next_phase.clone()),
                metadata: json!({ "phase": next_phase, "approved_phase": phase }),
                ..Default::default()
            }
        }
        Trigger::HumanApproved => TransitionChanges {
            metadata: json!({ "phase": phase }),
            ..Default::default()
        },
        Trigger::HumanRejected => TransitionChanges {
            metadata: json!({ "phase": phase, "rework": true }),
            ..Default::default()
        },
        Trigger::Error => {
            let message = phase_result
                .as_ref()
                .and_then(|v| v.get("error"))
                .and_then(Value::as_str)
                .unwrap_or("phase execution failed")
                .to_string();
            TransitionChanges {
                error: Some(message.clone()),
                metadata: json!({ "phase": phase, "error": message }),
                ..Default::default()
            }
        }
        Trigger::Start => TransitionChanges {
            metadata: json!({ "phase": phase }),
            ..Default::default()
        },
    }
}

/// Kick off the workflow's current phase on its own task so the HTTP layer
/// never waits on a worker.
pub fn spawn_phase(state: Arc<AppState>, workflow_id: String) {
    tokio::spawn(async move {
        run_phase(state, workflow_id).await;
    });
}

async fn run_phase(state: Arc<AppState>, workflow_id: String) {
    // Snapshot without the writer lock; the worker call must not block
    // other writers for its full duration.
    let workflow = match state.store.get(&workflow_id).await {
        Ok(workflow) => workflow,
        Err(e) => {
            warn!(%workflow_id, "phase run skipped: {}", e);
            return;
        }
    };

    if workflow.status != WorkflowStatus::InProgress {
        warn!(
            %workflow_id,
            status = workflow.status.as_str(),
            "phase run skipped: workflow is not in progress"
        );
        return;
    }

    let Some(phase) = workflow.current_phase.clone() else {
        let _ = advance(
            &state,
            &workflow_id,
            Trigger::Error,
            Some(json!({ "error": "workflow has no current phase" })),
        )
        .await;
        return;
    };

    let agent = state.config.agent_for(workflow.workflow_type).to_string();
    let request = InvokeRequest {
        workflow_type: phase.clone(),
        context: json!({
            "feature_id": &workflow.feature_id,
            "feature_description": &workflow.feature_description,
            "phase": &phase,
            "workflow_context": workflow.context.0,
        }),
        parameters: None,
        session_id: None,
    };

    info!(%workflow_id, %phase, %agent, "invoking phase agent");

    let outcome = state
        .hub
        .invoke(&agent, &request, state.config.invoke_timeout)
        .await;

    let result = match outcome {
        Ok(response) if response.success => advance(
            &state,
            &workflow_id,
            Trigger::AgentComplete,
            Some(response.result.unwrap_or(Value::Null)),
        )
        .await,
        Ok(response) => {
            let message = response
                .error
                .unwrap_or_else(|| "worker reported failure".to_string());
            advance(
                &state,
                &workflow_id,
                Trigger::Error,
                Some(json!({ "error": message })),
            )
            .await
        }
        Err(e) => advance(
            &state,
            &workflow_id,
            Trigger::Error,
            Some(json!({ "error": e.to_string() })),
        )
        .await,
    };

    if let Err(e) = result {
        error!(%workflow_id, "failed to record phase outcome: {}", e);
    }
}
