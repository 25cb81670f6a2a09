// Test utilities: an orchestrator on an ephemeral port plus a mock agent
// hub that answers `POST /invoke/:agent`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::http::StatusCode;
use axum::{extract::Path, extract::State, routing::post, Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use uuid::Uuid;

use orchestrator::config::OrchestratorConfig;
use orchestrator::db::Database;
use orchestrator::{create_app, AppState};

pub struct MockHubState {
    pub requests: Mutex<Vec<(String, Value)>>,
    pub response: Mutex<Value>,
    /// When set, `/invoke/:agent` answers with this status instead.
    pub fail_status: Mutex<Option<u16>>,
}

pub struct MockHub {
    pub url: String,
    pub state: Arc<MockHubState>,
}

impl MockHub {
    pub async fn spawn() -> Result<Self> {
        let state = Arc::new(MockHubState {
            requests: Mutex::new(Vec::new()),
            response: Mutex::new(json!({
                "success": true,
                "result": { "document": "spec.md", "summary": "drafted" },
                "confidence": 90,
                "metadata": {},
                "error": null,
                "session_id": Uuid::new_v4(),
            })),
            fail_status: Mutex::new(None),
        });

        async fn invoke(
            State(state): State<Arc<MockHubState>>,
            Path(agent): Path<String>,
            Json(body): Json<Value>,
        ) -> Result<Json<Value>, StatusCode> {
            state.requests.lock().push((agent, body));
            if let Some(status) = *state.fail_status.lock() {
                return Err(StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY));
            }
            Ok(Json(state.response.lock().clone()))
        }

        let app = Router::new()
            .route("/invoke/:agent", post(invoke))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("mock hub crashed");
        });

        Ok(Self {
            url: format!("http://127.0.0.1:{}", addr.port()),
            state,
        })
    }

    pub fn fail_with(&self, status: u16) {
        *self.state.fail_status.lock() = Some(status);
    }

    pub fn requests(&self) -> Vec<(String, Value)> {
        self.state.requests.lock().clone()
    }
}

pub struct TestApp {
    pub base_url: String,
    pub client: reqwest::Client,
    pub state: Arc<AppState>,
    pub hub: MockHub,
}

impl TestApp {
    pub async fn spawn() -> Result<Self> {
        let hub = MockHub::spawn().await?;

        let database_url = format!(
            "sqlite://{}",
            std::env::temp_dir()
                .join(format!("orchestrator-{}.db", Uuid::new_v4()))
                .display()
        );

        let config = OrchestratorConfig::with_endpoints(database_url.clone(), hub.url.clone());

        let db = Database::new(&database_url).await?;
        db.migrate().await?;

        let state = Arc::new(AppState::new(db, config));
        let app = create_app(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("orchestrator crashed");
        });

        Ok(Self {
            base_url: format!("http://127.0.0.1:{}", addr.port()),
            client: reqwest::Client::new(),
            state,
            hub,
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

    /// Poll a workflow until it reaches `status` (the executor runs on its
    /// own task) or the timeout elapses.
    pub async fn wait_for_status(&self, id: &str, status: &str, timeout: Duration) -> Value {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let workflow: Value = self
                .get(&format!("/workflows/{id}"))
                .await
                .json()
                .await
                .expect("workflow snapshot");
            if workflow["status"] == status {
                return workflow;
            }
            if tokio::time::Instant::now() >= deadline {
                panic!(
                    "workflow {id} never reached '{status}', last snapshot: {workflow}"
                );
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    }
}
