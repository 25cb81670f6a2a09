// Test utilities: a hub instance on an ephemeral port plus a scriptable
// mock worker standing in for the expert process.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::{extract::State, routing::post, Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use uuid::Uuid;

use agent_hub::config::{AgentConfig, HubConfig, RoutingTable, TopicOverride};
use agent_hub::db::Database;
use agent_hub::{create_app, AppState};

pub struct MockWorkerState {
    pub requests: Mutex<Vec<Value>>,
    pub response: Mutex<Value>,
}

/// A stand-in expert worker: records every `POST /invoke` body and answers
/// with whatever the test scripted last.
pub struct MockWorker {
    pub url: String,
    pub state: Arc<MockWorkerState>,
}

impl MockWorker {
    pub async fn spawn() -> Result<Self> {
        let state = Arc::new(MockWorkerState {
            requests: Mutex::new(Vec::new()),
            response: Mutex::new(json!({
                "success": true,
                "result": { "answer": "Use OAuth2 with JWT", "rationale": "industry standard" },
                "confidence": 92,
                "metadata": { "model_used": "baron-large" },
            })),
        });

        async fn invoke(
            State(state): State<Arc<MockWorkerState>>,
            Json(body): Json<Value>,
        ) -> Json<Value> {
            state.requests.lock().push(body);
            Json(state.response.lock().clone())
        }

        let app = Router::new()
            .route("/invoke", post(invoke))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("mock worker crashed");
        });

        Ok(Self {
            url: format!("http://127.0.0.1:{}", addr.port()),
            state,
        })
    }

    pub fn set_response(&self, response: Value) {
        *self.state.response.lock() = response;
    }

    pub fn answer_with_confidence(&self, answer: &str, confidence: u8) {
        self.set_response(json!({
            "success": true,
            "result": {
                "answer": answer,
                "uncertainty_reasons": ["limited context"],
            },
            "confidence": confidence,
            "metadata": {},
        }));
    }

    pub fn requests(&self) -> Vec<Value> {
        self.state.requests.lock().clone()
    }
}

pub struct TestApp {
    pub base_url: String,
    pub client: reqwest::Client,
    pub state: Arc<AppState>,
    pub worker: MockWorker,
    pub audit_dir: PathBuf,
}

impl TestApp {
    pub async fn spawn() -> Result<Self> {
        Self::spawn_with_session_ttl(Duration::from_secs(3600)).await
    }

    pub async fn spawn_with_session_ttl(session_ttl: Duration) -> Result<Self> {
        let worker = MockWorker::spawn().await?;

        let mut agents = HashMap::new();
        agents.insert(
            "baron".to_string(),
            AgentConfig {
                url: worker.url.clone(),
                default_model: Some("baron-large".to_string()),
                default_timeout: 5,
                topics: vec!["architecture".to_string(), "testing".to_string()],
            },
        );

        let mut topics = HashMap::new();
        topics.insert(
            "security".to_string(),
            TopicOverride {
                agent_id: "baron".to_string(),
                confidence_threshold: Some(95),
            },
        );

        let routing = RoutingTable {
            agents,
            topics,
            default_threshold: 80,
        };

        let run_id = Uuid::new_v4();
        let audit_dir = std::env::temp_dir().join(format!("hub-audit-{run_id}"));
        let database_url = format!(
            "sqlite://{}",
            std::env::temp_dir().join(format!("hub-{run_id}.db")).display()
        );

        let config = HubConfig {
            port: 0,
            database_url: database_url.clone(),
            audit_log_path: Some(audit_dir.clone()),
            session_ttl,
            escalation_ttl: Duration::from_secs(7 * 86400),
            routing,
            forge: None,
        };

        let db = Database::new(&database_url).await?;
        db.migrate().await?;

        let state = Arc::new(AppState::new(db, config)?);
        let app = create_app(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("hub crashed");
        });

        Ok(Self {
            base_url: format!("http://127.0.0.1:{}", addr.port()),
            client: reqwest::Client::new(),
            state,
            worker,
            audit_dir,
        })
    }

    pub async fn post(&self, path: &str, body: &Value) -> reqwest::Response {
        self.client
            .post(format!("{}{}", self.base_url, path))
            .json(body)
            .send()
            .await
            .expect("request failed")
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await
            .expect("request failed")
    }

    pub async fn delete(&self, path: &str) -> reqwest::Response {
        self.client
            .delete(format!("{}{}", self.base_url, path))
            .send()
            .await
            .expect("request failed")
    }

    /// Audit lines written so far for a feature.
    pub fn audit_lines(&self, feature_id: &str) -> Vec<Value> {
        let path = self.audit_dir.join(format!("{feature_id}.jsonl"));
        match std::fs::read_to_string(path) {
            Ok(content) => content
                .lines()
                .map(|line| serde_json::from_str(line).expect("invalid audit line"))
                .collect(),
            Err(_) => Vec::new(),
        }
    }
}
