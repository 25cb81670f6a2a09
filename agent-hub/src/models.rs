use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::FromRow;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Closed,
    Expired,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Closed => "closed",
            Self::Expired => "expired",
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
    Human,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum EscalationStatus {
    Pending,
    Resolved,
    Expired,
}

impl EscalationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Resolved => "resolved",
            Self::Expired => "expired",
        }
    }
}

/// What the human reviewer did with an escalation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum HumanAction {
    Confirm,
    Correct,
    AddContext,
}

impl std::str::FromStr for HumanAction {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "confirm" => Ok(Self::Confirm),
            "correct" => Ok(Self::Correct),
            "add_context" => Ok(Self::AddContext),
            other => Err(format!(
                "unknown action '{other}' (expected confirm, correct or add_context)"
            )),
        }
    }
}

/// An ordered conversation between one caller and one agent.
#[derive(Debug, Clone, FromRow)]
pub struct Session {
    pub id: String,
    pub agent_id: String,
    pub feature_id: Option<String>,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.status == SessionStatus::Active
            && self.expires_at.map(|at| now >= at).unwrap_or(false)
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct Message {
    pub id: String,
    pub session_id: String,
    pub role: MessageRole,
    pub content: String,
    pub metadata: Json<Value>,
    pub created_at: DateTime<Utc>,
}

/// A human-review request opened when confidence fell below the
/// effective threshold.
#[derive(Debug, Clone, FromRow)]
pub struct Escalation {
    pub id: String,
    pub session_id: Option<String>,
    pub question_id: String,
    pub topic: String,
    pub question: String,
    pub tentative_answer: String,
    pub confidence: i64,
    pub uncertainty_reasons: Json<Vec<String>>,
    pub status: EscalationStatus,
    pub human_action: Option<HumanAction>,
    pub human_response: Option<String>,
    pub human_responder: Option<String>,
    pub external_comment_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Escalation {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.status == EscalationStatus::Pending && now >= self.expires_at
    }
}

// ---- wire shapes ----

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub id: String,
    pub session_id: String,
    pub role: MessageRole,
    pub content: String,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}

impl From<Message> for MessageResponse {
    fn from(message: Message) -> Self {
        Self {
            id: message.id,
            session_id: message.session_id,
            role: message.role,
            content: message.content,
            metadata: message.metadata.0,
            created_at: message.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResponse {
    pub id: String,
    pub agent_id: String,
    pub feature_id: Option<String>,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub messages: Vec<MessageResponse>,
}

impl SessionResponse {
    pub fn from_session(session: Session, messages: Vec<Message>) -> Self {
        Self {
            id: session.id,
            agent_id: session.agent_id,
            feature_id: session.feature_id,
            status: session.status,
            created_at: session.created_at,
            updated_at: session.updated_at,
            expires_at: session.expires_at,
            messages: messages.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationResponse {
    pub id: String,
    pub session_id: Option<String>,
    pub question_id: String,
    pub topic: String,
    pub question: String,
    pub tentative_answer: String,
    pub confidence: u8,
    pub uncertainty_reasons: Vec<String>,
    pub status: EscalationStatus,
    pub human_action: Option<HumanAction>,
    pub human_response: Option<String>,
    pub human_responder: Option<String>,
    pub external_comment_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    /// Set when a resolution with `add_context` hands the enriched question
    /// back to the caller for a follow-up ask in the same session.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reroute_question: Option<String>,
}

impl From<Escalation> for EscalationResponse {
    fn from(escalation: Escalation) -> Self {
        Self {
            id: escalation.id,
            session_id: escalation.session_id,
            question_id: escalation.question_id,
            topic: escalation.topic,
            question: escalation.question,
            tentative_answer: escalation.tentative_answer,
            confidence: escalation.confidence.clamp(0, 100) as u8,
            uncertainty_reasons: escalation.uncertainty_reasons.0,
            status: escalation.status,
            human_action: escalation.human_action,
            human_response: escalation.human_response,
            human_responder: escalation.human_responder,
            external_comment_id: escalation.external_comment_id,
            created_at: escalation.created_at,
            resolved_at: escalation.resolved_at,
            updated_at: escalation.updated_at,
            reroute_question: None,
        }
    }
}
