// Orchestrator service - workflow state machine with persistent history
//
// Drives specify/plan/tasks/implement runs phase by phase: every status
// change goes through the state machine, commits atomically with its
// history row, and worker invocations ride through the Agent Hub on
// background tasks gated by human approval.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

pub mod config;
pub mod db;
pub mod error;
pub mod executor;
pub mod feature;
pub mod handlers;
pub mod hub;
pub mod models;
pub mod state_machine;
pub mod store;

use crate::config::OrchestratorConfig;
use crate::db::Database;
use crate::hub::HubClient;
use crate::store::WorkflowStore;

pub struct AppState {
    pub db: Database,
    pub store: WorkflowStore,
    pub hub: HubClient,
    pub config: OrchestratorConfig,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(db: Database, config: OrchestratorConfig) -> Self {
        let store = WorkflowStore::new(db.pool.clone());
        let hub = HubClient::new(config.agent_hub_url.clone());
        Self {
            db,
            store,
            hub,
            config,
            started_at: Instant::now(),
        }
    }
}

pub fn create_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/workflows",
            post(handlers::workflows::create_workflow).get(handlers::workflows::list_workflows),
        )
        .route("/workflows/:id", get(handlers::workflows::get_workflow))
        .route(
            "/workflows/:id/advance",
            post(handlers::workflows::advance_workflow),
        )
        .route(
            "/workflows/:id/history",
            get(handlers::workflows::get_history),
        )
        .route("/health", get(handlers::health))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(Duration::from_secs(30))),
        )
        .with_state(state)
}
