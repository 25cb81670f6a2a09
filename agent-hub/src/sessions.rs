//! Session engine: conversation rows, ordered messages, lazy expiry.
//!
//! Sessions are strictly single-writer. Callers take the session's lock via
//! [`SessionStore::lock_for`] before any append and hold it for the whole
//! exchange, so concurrent asks on one session serialize in arrival order
//! while readers keep seeing the pre-write snapshot.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde_json::Value;
use sqlx::sqlite::{Sqlite, SqlitePool};
use sqlx::types::Json;
use sqlx::Executor;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::{HubError, HubResult};
use crate::models::{Message, MessageRole, Session, SessionStatus};

const SESSION_COLUMNS: &str =
    "id, agent_id, feature_id, status, created_at, updated_at, expires_at";
const MESSAGE_COLUMNS: &str = "id, session_id, role, content, metadata, created_at";

#[derive(Debug, Clone)]
pub struct SessionStore {
    pool: SqlitePool,
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
    ttl: chrono::Duration,
}

impl SessionStore {
    pub fn new(pool: SqlitePool, ttl: std::time::Duration) -> Self {
        Self {
            pool,
            locks: Arc::new(DashMap::new()),
            ttl: chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::hours(1)),
        }
    }

    pub fn lock_for(&self, session_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    pub async fn create(
        &self,
        id: &str,
        agent_id: &str,
        feature_id: Option<&str>,
    ) -> HubResult<Session> {
        let now = Utc::now();
        let expires_at = now + self.ttl;

        sqlx::query(
            "INSERT INTO sessions (id, agent_id, feature_id, status, created_at, updated_at, \
             expires_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(agent_id)
        .bind(feature_id)
        .bind(SessionStatus::Active)
        .bind(now)
        .bind(now)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        self.get(id).await
    }

    /// Load a session, lazily expiring it when its TTL has passed.
    pub async fn get(&self, id: &str) -> HubResult<Session> {
        let query = format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?");
        let session = sqlx::query_as::<_, Session>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| HubError::UnknownSession(id.to_string()))?;

        let now = Utc::now();
        if session.is_expired_at(now) {
            sqlx::query("UPDATE sessions SET status = ?, updated_at = ? WHERE id = ?")
                .bind(SessionStatus::Expired)
                .bind(now)
                .bind(id)
                .execute(&self.pool)
                .await?;
            let query = format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?");
            return Ok(sqlx::query_as::<_, Session>(&query)
                .bind(id)
                .fetch_one(&self.pool)
                .await?);
        }

        Ok(session)
    }

    /// Reject message-appending access to anything but an `active` session.
    pub fn ensure_active(session: &Session) -> HubResult<()> {
        match session.status {
            SessionStatus::Active => Ok(()),
            SessionStatus::Expired => Err(HubError::SessionExpired(session.id.clone())),
            SessionStatus::Closed => Err(HubError::Validation(format!(
                "session {} is closed",
                session.id
            ))),
        }
    }

    pub async fn messages(&self, session_id: &str) -> HubResult<Vec<Message>> {
        let query = format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE session_id = ? \
             ORDER BY created_at ASC, rowid ASC"
        );
        Ok(sqlx::query_as::<_, Message>(&query)
            .bind(session_id)
            .fetch_all(&self.pool)
            .await?)
    }

    pub async fn append_message(
        &self,
        session_id: &str,
        role: MessageRole,
        content: &str,
        metadata: Value,
    ) -> HubResult<Message> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;
        insert_message(&mut *tx, &id, session_id, role, content, &metadata, now).await?;
        sqlx::query("UPDATE sessions SET updated_at = ? WHERE id = ?")
            .bind(now)
            .bind(session_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        let query = format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?");
        Ok(sqlx::query_as::<_, Message>(&query)
            .bind(&id)
            .fetch_one(&self.pool)
            .await?)
    }

    pub async fn close(&self, id: &str) -> HubResult<Session> {
        let session = self.get(id).await?;

        sqlx::query("UPDATE sessions SET status = ?, updated_at = ? WHERE id = ?")
            .bind(SessionStatus::Closed)
            .bind(Utc::now())
            .bind(&session.id)
            .execute(&self.pool)
            .await?;

        self.get(id).await
    }

    /// Periodic sweep marking overdue active sessions expired; complements
    /// the lazy path for sessions nobody touches again.
    pub async fn expire_overdue(&self, now: DateTime<Utc>) -> HubResult<u64> {
        let result = sqlx::query(
            "UPDATE sessions SET status = ?, updated_at = ? \
             WHERE status = ? AND expires_at IS NOT NULL AND expires_at <= ?",
        )
        .bind(SessionStatus::Expired)
        .bind(now)
        .bind(SessionStatus::Active)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

/// Shared message insert so the escalation engine can append inside its own
/// transaction.
pub async fn insert_message<'e, E>(
    executor: E,
    id: &str,
    session_id: &str,
    role: MessageRole,
    content: &str,
    metadata: &Value,
    created_at: DateTime<Utc>,
) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "INSERT INTO messages (id, session_id, role, content, metadata, created_at) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind(session_id)
    .bind(role)
    .bind(content)
    .bind(Json(metadata.clone()))
    .bind(created_at)
    .execute(executor)
    .await?;

    Ok(())
}
