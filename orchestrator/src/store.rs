//! Workflow store, the single writer for workflow rows and their history.
//!
//! A status change and its history row commit in one transaction; readers
//! observe either the pre- or post-transition snapshot. Per-workflow write
//! order is enforced by the keyed lock map in [`WorkflowStore::lock_for`],
//! which callers hold across the read-decide-write sequence.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use serde_json::Value;
use sqlx::sqlite::SqlitePool;
use sqlx::types::Json;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::{OrchestratorError, OrchestratorResult};
use crate::models::{Trigger, Workflow, WorkflowHistory, WorkflowStatus, WorkflowType};

const WORKFLOW_COLUMNS: &str = "id, workflow_type, status, feature_id, feature_description, \
     current_phase, context, result, error, created_at, updated_at, completed_at";

/// Field updates applied together with a status transition.
#[derive(Debug, Default)]
pub struct TransitionChanges {
    pub result: Option<Value>,
    pub error: Option<String>,
    pub current_phase: Option<String>,
    pub metadata: Value,
}

#[derive(Debug, Clone)]
pub struct WorkflowStore {
    pool: SqlitePool,
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
    create_lock: Arc<Mutex<()>>,
}

impl WorkflowStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            locks: Arc::new(DashMap::new()),
            create_lock: Arc::new(Mutex::new(())),
        }
    }

    /// The serialization point for all writes to one workflow.
    pub fn lock_for(&self, workflow_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(workflow_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Persist a new workflow and its initial `pending → in_progress`
    /// transition atomically. The feature sequence is read inside the same
    /// transaction; creations are serialized so two workflows never race on
    /// the next sequence number.
    pub async fn create(
        &self,
        workflow_type: WorkflowType,
        feature_id_fn: impl FnOnce(u32) -> String,
        feature_description: &str,
        context: Value,
        first_phase: &str,
    ) -> OrchestratorResult<Workflow> {
        let _creating = self.create_lock.lock().await;

        let mut tx = self.pool.begin().await?;

        let max_seq: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(CAST(substr(feature_id, 1, 3) AS INTEGER)), 0) FROM workflows",
        )
        .fetch_one(&mut *tx)
        .await?;

        let feature_id = feature_id_fn(max_seq as u32 + 1);
        if !crate::feature::is_valid_feature_id(&feature_id) {
            return Err(OrchestratorError::Validation(format!(
                "derived feature id '{feature_id}' is not canonical"
            )));
        }
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO workflows (id, workflow_type, status, feature_id, feature_description, \
             current_phase, context, result, error, created_at, updated_at, completed_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, NULL, NULL, ?, ?, NULL)",
        )
        .bind(&id)
        .bind(workflow_type)
        .bind(WorkflowStatus::InProgress)
        .bind(&feature_id)
        .bind(feature_description)
        .bind(first_phase)
        .bind(Json(context))
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO workflow_history (id, workflow_id, from_status, to_status, \"trigger\", \
             metadata, created_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&id)
        .bind(WorkflowStatus::Pending)
        .bind(WorkflowStatus::InProgress)
        .bind(Trigger::Start)
        .bind(Json(serde_json::json!({ "phase": first_phase })))
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        self.get(&id).await
    }

    pub async fn get(&self, id: &str) -> OrchestratorResult<Workflow> {
        let query = format!("SELECT {WORKFLOW_COLUMNS} FROM workflows WHERE id = ?");
        sqlx::query_as::<_, Workflow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| OrchestratorError::UnknownWorkflow(id.to_string()))
    }

    pub async fn list(&self) -> OrchestratorResult<Vec<Workflow>> {
        let query =
            format!("SELECT {WORKFLOW_COLUMNS} FROM workflows ORDER BY created_at DESC, rowid DESC");
        Ok(sqlx::query_as::<_, Workflow>(&query)
            .fetch_all(&self.pool)
            .await?)
    }

    pub async fn history(&self, workflow_id: &str) -> OrchestratorResult<Vec<WorkflowHistory>> {
        Ok(sqlx::query_as::<_, WorkflowHistory>(
            "SELECT id, workflow_id, from_status, to_status, \"trigger\", metadata, created_at \
             FROM workflow_history WHERE workflow_id = ? ORDER BY created_at ASC, rowid ASC",
        )
        .bind(workflow_id)
        .fetch_all(&self.pool)
        .await?)
    }

    /// Commit a transition and its history row atomically. Callers must hold
    /// the workflow's lock and have already validated the edge.
    pub async fn apply_transition(
        &self,
        workflow: &Workflow,
        trigger: Trigger,
        to: WorkflowStatus,
        changes: TransitionChanges,
    ) -> OrchestratorResult<Workflow> {
        let now = Utc::now();
        let completed_at = (to == WorkflowStatus::Completed).then_some(now);

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "UPDATE workflows SET status = ?, updated_at = ?, \
             completed_at = COALESCE(?, completed_at), \
             result = COALESCE(?, result), \
             error = COALESCE(?, error), \
             current_phase = COALESCE(?, current_phase) \
             WHERE id = ?",
        )
        .bind(to)
        .bind(now)
        .bind(completed_at)
        .bind(changes.result.map(Json))
        .bind(changes.error)
        .bind(changes.current_phase)
        .bind(&workflow.id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO workflow_history (id, workflow_id, from_status, to_status, \"trigger\", \
             metadata, created_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&workflow.id)
        .bind(workflow.status)
        .bind(to)
        .bind(trigger)
        .bind(Json(changes.metadata))
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        self.get(&workflow.id).await
    }
}
