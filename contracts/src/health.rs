use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_seconds: u64,
    pub version: String,
}

impl HealthResponse {
    pub fn ok(uptime_seconds: u64, version: &str) -> Self {
        Self {
            status: "ok".to_string(),
            uptime_seconds,
            version: version.to_string(),
        }
    }
}
