use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Request accepted by every worker's `POST /invoke` and forwarded verbatim
/// by the hub's `POST /invoke/{agent}`.
///
/// Workers are stateless: `context` carries everything the call needs,
/// including prior conversation turns when a session is in play.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvokeRequest {
    pub workflow_type: String,
    pub context: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<Uuid>,
}

/// Worker answer plus self-reported confidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvokeResponse {
    pub success: bool,
    #[serde(default)]
    pub result: Option<Value>,
    pub confidence: u8,
    #[serde(default)]
    pub metadata: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl InvokeResponse {
    /// Confidence is a closed 0..=100 range; anything else is a protocol
    /// violation by the worker.
    pub fn validate(&self) -> Result<(), String> {
        if self.confidence > 100 {
            return Err(format!(
                "confidence {} outside 0..=100",
                self.confidence
            ));
        }
        Ok(())
    }

    /// Best-effort extraction of the human-readable answer: workers put it
    /// under `result.answer`; fall back to the raw result body.
    pub fn answer_text(&self) -> String {
        match &self.result {
            Some(Value::Object(map)) => match map.get("answer") {
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
                None => Value::Object(map.clone()).to_string(),
            },
            Some(other) => other.to_string(),
            None => String::new(),
        }
    }

    /// `uncertainty_reasons` from the result object, falling back to
    /// metadata, else empty.
    pub fn uncertainty_reasons(&self) -> Vec<String> {
        let from = |v: &Value| -> Option<Vec<String>> {
            v.get("uncertainty_reasons")?.as_array().map(|arr| {
                arr.iter()
                    .filter_map(|r| r.as_str().map(str::to_owned))
                    .collect()
            })
        };
        self.result
            .as_ref()
            .and_then(from)
            .or_else(|| from(&self.metadata))
            .unwrap_or_default()
    }
}

/// Hub response for a direct invocation: the worker's answer plus the
/// session the exchange ran under (generated when the caller sent none).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubInvokeResponse {
    pub success: bool,
    #[serde(default)]
    pub result: Option<Value>,
    pub confidence: u8,
    #[serde(default)]
    pub metadata: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub session_id: Uuid,
}

impl HubInvokeResponse {
    pub fn from_worker(response: InvokeResponse, session_id: Uuid) -> Self {
        Self {
            success: response.success,
            result: response.result,
            confidence: response.confidence,
            metadata: response.metadata,
            error: response.error,
            session_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn invoke_response_rejects_out_of_range_confidence() {
        let response = InvokeResponse {
            success: true,
            result: None,
            confidence: 101,
            metadata: Value::Null,
            error: None,
        };
        assert!(response.validate().is_err());
    }

    #[test]
    fn answer_text_prefers_result_answer_field() {
        let response = InvokeResponse {
            success: true,
            result: Some(json!({"answer": "Use OAuth2 with JWT", "rationale": "standard"})),
            confidence: 92,
            metadata: Value::Null,
            error: None,
        };
        assert_eq!(response.answer_text(), "Use OAuth2 with JWT");
    }

    #[test]
    fn uncertainty_reasons_fall_back_to_metadata() {
        let response = InvokeResponse {
            success: true,
            result: Some(json!({"answer": "maybe"})),
            confidence: 40,
            metadata: json!({"uncertainty_reasons": ["ambiguous requirements"]}),
            error: None,
        };
        assert_eq!(
            response.uncertainty_reasons(),
            vec!["ambiguous requirements".to_string()]
        );
    }

    #[test]
    fn invoke_request_omits_absent_optionals() {
        let request = InvokeRequest {
            workflow_type: "specify".into(),
            context: json!({}),
            parameters: None,
            session_id: None,
        };
        let wire = serde_json::to_value(&request).unwrap();
        assert!(wire.get("parameters").is_none());
        assert!(wire.get("session_id").is_none());
    }
}
