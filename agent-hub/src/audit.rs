//! Append-only JSONL audit log, one file per feature.
//!
//! Writes are serialized per feature and flushed before the HTTP response
//! goes out, so a 2xx always means the exchange is on disk. With no log
//! directory configured the logger is a no-op (startup warns).

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::warn;

use crate::error::{HubError, HubResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    Resolved,
    Escalated,
}

/// One completed exchange. Exactly one line per `ask_expert` call;
/// escalation creation counts as completion with `status = escalated`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub session_id: Option<String>,
    pub feature_id: String,
    pub topic: String,
    pub question: String,
    pub answer: String,
    pub confidence: u8,
    pub status: AuditStatus,
    pub escalation_id: Option<String>,
    pub duration_ms: u64,
    pub metadata: Value,
}

#[derive(Debug)]
pub struct AuditLogger {
    dir: Option<PathBuf>,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl AuditLogger {
    pub fn new(dir: Option<PathBuf>) -> Self {
        if dir.is_none() {
            warn!("AUDIT_LOG_PATH is unset, auditing is disabled");
        }
        Self {
            dir,
            locks: DashMap::new(),
        }
    }

    pub fn enabled(&self) -> bool {
        self.dir.is_some()
    }

    pub async fn append(&self, record: &AuditRecord) -> HubResult<()> {
        let Some(dir) = &self.dir else {
            return Ok(());
        };

        let file_name = format!("{}.jsonl", sanitize_feature_id(&record.feature_id));
        let path = dir.join(file_name);

        let lock = self
            .locks
            .entry(record.feature_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        let mut line = serde_json::to_string(record)
            .map_err(|e| HubError::AuditWriteFailure(e.to_string()))?;
        line.push('\n');

        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| HubError::AuditWriteFailure(e.to_string()))?;

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| HubError::AuditWriteFailure(e.to_string()))?;

        file.write_all(line.as_bytes())
            .await
            .map_err(|e| HubError::AuditWriteFailure(e.to_string()))?;
        file.flush()
            .await
            .map_err(|e| HubError::AuditWriteFailure(e.to_string()))?;

        Ok(())
    }
}

/// Feature ids become file names; anything outside `[A-Za-z0-9._-]` is
/// replaced so a hostile id cannot escape the log directory.
fn sanitize_feature_id(feature_id: &str) -> String {
    let cleaned: String = feature_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '-'
            }
        })
        .collect();

    if cleaned.trim_matches('-').is_empty() {
        "unassigned".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_path_separators() {
        assert_eq!(sanitize_feature_id("005-auth"), "005-auth");
        assert_eq!(sanitize_feature_id("../etc/passwd"), "..-etc-passwd");
        assert_eq!(sanitize_feature_id("///"), "unassigned");
    }

    #[tokio::test]
    async fn append_is_a_noop_when_disabled() {
        let logger = AuditLogger::new(None);
        let record = AuditRecord {
            id: "r1".into(),
            timestamp: Utc::now(),
            session_id: None,
            feature_id: "005-auth".into(),
            topic: "architecture".into(),
            question: "What auth method should we use?".into(),
            answer: "OAuth2".into(),
            confidence: 92,
            status: AuditStatus::Resolved,
            escalation_id: None,
            duration_ms: 12,
            metadata: serde_json::json!({}),
        };
        assert!(logger.append(&record).await.is_ok());
    }
}
