use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::FromRow;

/// The SDLC run a workflow executes. Closed set; unknown values fail
/// request validation before any side effect.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum WorkflowType {
    Specify,
    Plan,
    Tasks,
    Implement,
}

impl WorkflowType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Specify => "specify",
            Self::Plan => "plan",
            Self::Tasks => "tasks",
            Self::Implement => "implement",
        }
    }
}

impl std::str::FromStr for WorkflowType {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "specify" => Ok(Self::Specify),
            "plan" => Ok(Self::Plan),
            "tasks" => Ok(Self::Tasks),
            "implement" => Ok(Self::Implement),
            other => Err(format!(
                "unknown workflow_type '{other}' (expected specify, plan, tasks or implement)"
            )),
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Pending,
    InProgress,
    WaitingApproval,
    Completed,
    Failed,
}

impl WorkflowStatus {
    /// Terminal states accept no outgoing transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::WaitingApproval => "waiting_approval",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// Named event justifying a workflow state transition.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum Trigger {
    Start,
    AgentComplete,
    HumanApproved,
    HumanRejected,
    Error,
}

impl Trigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::AgentComplete => "agent_complete",
            Self::HumanApproved => "human_approved",
            Self::HumanRejected => "human_rejected",
            Self::Error => "error",
        }
    }
}

impl std::str::FromStr for Trigger {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "start" => Ok(Self::Start),
            "agent_complete" => Ok(Self::AgentComplete),
            "human_approved" => Ok(Self::HumanApproved),
            "human_rejected" => Ok(Self::HumanRejected),
            "error" => Ok(Self::Error),
            other => Err(format!("unknown trigger '{other}'")),
        }
    }
}

/// A single end-to-end SDLC run. Mutated only through the store's
/// transactional transition path.
#[derive(Debug, Clone, FromRow)]
pub struct Workflow {
    pub id: String,
    pub workflow_type: WorkflowType,
    pub status: WorkflowStatus,
    pub feature_id: String,
    pub feature_description: String,
    pub current_phase: Option<String>,
    pub context: Json<Value>,
    pub result: Option<Json<Value>>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Append-only transition record. Consecutive rows chain:
/// `row[i+1].from_status == row[i].to_status`.
#[derive(Debug, Clone, FromRow)]
pub struct WorkflowHistory {
    pub id: String,
    pub workflow_id: String,
    pub from_status: WorkflowStatus,
    pub to_status: WorkflowStatus,
    pub trigger: Trigger,
    pub metadata: Json<Value>,
    pub created_at: DateTime<Utc>,
}

/// Wire snapshot of a workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowResponse {
    pub id: String,
    pub workflow_type: WorkflowType,
    pub status: WorkflowStatus,
    pub feature_id: String,
    pub feature_description: String,
    pub current_phase: Option<String>,
    pub context: Value,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<Workflow> for WorkflowResponse {
    fn from(workflow: Workflow) -> Self {
        Self {
            id: workflow.id,
            workflow_type: workflow.workflow_type,
            status: workflow.status,
            feature_id: workflow.feature_id,
            feature_description: workflow.feature_description,
            current_phase: workflow.current_phase,
            context: workflow.context.0,
            result: workflow.result.map(|r| r.0),
            error: workflow.error,
            created_at: workflow.created_at,
            updated_at: workflow.updated_at,
            completed_at: workflow.completed_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub id: String,
    pub workflow_id: String,
    pub from_status: WorkflowStatus,
    pub to_status: WorkflowStatus,
    pub trigger: Trigger,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}

impl From<WorkflowHistory> for HistoryResponse {
    fn from(row: WorkflowHistory) -> Self {
        Self {
            id: row.id,
            workflow_id: row.workflow_id,
            from_status: row.from_status,
            to_status: row.to_status,
            trigger: row.trigger,
            metadata: row.metadata.0,
            created_at: row.created_at,
        }
    }
}
