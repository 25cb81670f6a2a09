use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Topic-routed expert consultation, `POST /ask/{topic}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskExpertRequest {
    pub question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
    pub feature_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<Uuid>,
}

/// Outcome of the confidence gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AskStatus {
    /// Confidence met the effective threshold; the answer stands.
    Resolved,
    /// Confidence fell short; an escalation is open and a human will weigh in.
    PendingHuman,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskExpertResponse {
    pub status: AskStatus,
    pub answer: String,
    pub confidence: u8,
    pub session_id: Uuid,
    pub escalation_id: Option<Uuid>,
    #[serde(default)]
    pub uncertainty_reasons: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ask_status_uses_snake_case_on_the_wire() {
        assert_eq!(
            serde_json::to_string(&AskStatus::PendingHuman).unwrap(),
            "\"pending_human\""
        );
        assert_eq!(
            serde_json::from_str::<AskStatus>("\"resolved\"").unwrap(),
            AskStatus::Resolved
        );
    }
}
