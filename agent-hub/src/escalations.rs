//! Escalation engine.
//!
//! Creation is one atomic step: the pending row and the assistant message
//! carrying the tentative answer commit in a single transaction; the forge
//! notice rides outside it, best-effort. Resolution is per-escalation
//! serial and happens at most once.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde_json::{json, Value};
use sqlx::sqlite::SqlitePool;
use sqlx::types::Json;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::{HubError, HubResult};
use crate::models::{Escalation, EscalationStatus, HumanAction, MessageRole};
use crate::sessions::insert_message;

const ESCALATION_COLUMNS: &str = "id, session_id, question_id, topic, question, \
     tentative_answer, confidence, uncertainty_reasons, status, human_action, human_response, \
     human_responder, external_comment_id, created_at, resolved_at, updated_at, expires_at";

/// Everything needed to open an escalation for a low-confidence answer.
#[derive(Debug, Clone)]
pub struct NewEscalation {
    pub id: String,
    pub session_id: Option<String>,
    pub question_id: String,
    pub topic: String,
    pub question: String,
    pub tentative_answer: String,
    pub confidence: u8,
    pub uncertainty_reasons: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct EscalationStore {
    pool: SqlitePool,
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
    ttl: chrono::Duration,
}

impl EscalationStore {
    pub fn new(pool: SqlitePool, ttl: std::time::Duration) -> Self {
        Self {
            pool,
            locks: Arc::new(DashMap::new()),
            ttl: chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::days(7)),
        }
    }

    fn lock_for(&self, escalation_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(escalation_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Insert the pending escalation and its assistant message atomically.
    /// `assistant_metadata` lands on the message (confidence, model, timing).
    pub async fn create_with_message(
        &self,
        new: NewEscalation,
        assistant_metadata: Value,
    ) -> HubResult<Escalation> {
        let now = Utc::now();
        let expires_at = now + self.ttl;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO escalations (id, session_id, question_id, topic, question, \
             tentative_answer, confidence, uncertainty_reasons, status, human_action, \
             human_response, human_responder, external_comment_id, created_at, resolved_at, \
             updated_at, expires_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, NULL, NULL, NULL, NULL, ?, NULL, ?, ?)",
        )
        .bind(&new.id)
        .bind(&new.session_id)
        .bind(&new.question_id)
        .bind(&new.topic)
        .bind(&new.question)
        .bind(&new.tentative_answer)
        .bind(new.confidence as i64)
        .bind(Json(new.uncertainty_reasons.clone()))
        .bind(EscalationStatus::Pending)
        .bind(now)
        .bind(now)
        .bind(expires_at)
        .execute(&mut *tx)
        .await?;

        if let Some(session_id) = &new.session_id {
            insert_message(
                &mut *tx,
                &Uuid::new_v4().to_string(),
                session_id,
                MessageRole::Assistant,
                &new.tentative_answer,
                &assistant_metadata,
                now,
            )
            .await?;
            sqlx::query("UPDATE sessions SET updated_at = ? WHERE id = ?")
                .bind(now)
                .bind(session_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        self.get(&new.id).await
    }

    /// Load an escalation, lazily expiring overdue pending ones.
    pub async fn get(&self, id: &str) -> HubResult<Escalation> {
        let query = format!("SELECT {ESCALATION_COLUMNS} FROM escalations WHERE id = ?");
        let escalation = sqlx::query_as::<_, Escalation>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| HubError::UnknownEscalation(id.to_string()))?;

        let now = Utc::now();
        if escalation.is_expired_at(now) {
            sqlx::query("UPDATE escalations SET status = ?, updated_at = ? WHERE id = ?")
                .bind(EscalationStatus::Expired)
                .bind(now)
                .bind(id)
                .execute(&self.pool)
                .await?;
            let query = format!("SELECT {ESCALATION_COLUMNS} FROM escalations WHERE id = ?");
            return Ok(sqlx::query_as::<_, Escalation>(&query)
                .bind(id)
                .fetch_one(&self.pool)
                .await?);
        }

        Ok(escalation)
    }

    /// Resolve a pending escalation exactly once. Appends the `human`
    /// message to the linked session in the same transaction; the session's
    /// own TTL does not gate this append, since escalations outlive sessions.
    pub async fn resolve(
        &self,
        id: &str,
        action: HumanAction,
        response: Option<String>,
        responder: &str,
    ) -> HubResult<Escalation> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        let escalation = self.get(id).await?;
        if escalation.status != EscalationStatus::Pending {
            return Err(HubError::AlreadyResolved {
                id: id.to_string(),
                status: escalation.status.as_str().to_string(),
            });
        }
        if action == HumanAction::Correct && response.is_none() {
            return Err(HubError::MissingResponse);
        }

        let now = Utc::now();

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "UPDATE escalations SET status = ?, human_action = ?, human_response = ?, \
             human_responder = ?, resolved_at = ?, updated_at = ? WHERE id = ?",
        )
        .bind(EscalationStatus::Resolved)
        .bind(action)
        .bind(&response)
        .bind(responder)
        .bind(now)
        .bind(now)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        if let Some(session_id) = &escalation.session_id {
            let content = human_message_content(&escalation, action, response.as_deref());
            let metadata = human_message_metadata(action, responder);
            insert_message(
                &mut *tx,
                &Uuid::new_v4().to_string(),
                session_id,
                MessageRole::Human,
                &content,
                &metadata,
                now,
            )
            .await?;
            sqlx::query("UPDATE sessions SET updated_at = ? WHERE id = ?")
                .bind(now)
                .bind(session_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        self.get(id).await
    }

    pub async fn set_external_comment_id(&self, id: &str, comment_id: &str) -> HubResult<()> {
        sqlx::query(
            "UPDATE escalations SET external_comment_id = ?, updated_at = ? WHERE id = ?",
        )
        .bind(comment_id)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Periodic sweep for pending escalations past their TTL.
    pub async fn expire_overdue(&self, now: DateTime<Utc>) -> HubResult<u64> {
        let result = sqlx::query(
            "UPDATE escalations SET status = ?, updated_at = ? \
             WHERE status = ? AND expires_at <= ?",
        )
        .bind(EscalationStatus::Expired)
        .bind(now)
        .bind(EscalationStatus::Pending)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

fn human_message_content(
    escalation: &Escalation,
    action: HumanAction,
    response: Option<&str>,
) -> String {
    match action {
        // The human affirmed the tentative answer; it becomes the canonical
        // content of the reply.
        HumanAction::Confirm => escalation.tentative_answer.clone(),
        HumanAction::Correct => response.unwrap_or_default().to_string(),
        HumanAction::AddContext => response.unwrap_or_default().to_string(),
    }
}

fn human_message_metadata(action: HumanAction, responder: &str) -> Value {
    let mut metadata = json!({
        "responder": responder,
        "action": action,
    });
    if action == HumanAction::Correct {
        metadata["confidence"] = json!(100);
    }
    metadata
}

/// Question handed back to the caller after an `add_context` resolution.
pub fn reroute_question(escalation: &Escalation) -> String {
    match &escalation.human_response {
        Some(context) if !context.is_empty() => {
            format!("{}\n\nAdditional context: {}", escalation.question, context)
        }
        _ => escalation.question.clone(),
    }
}
