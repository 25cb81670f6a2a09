// Agent Hub - expert routing, sessions, escalations and audit
//
// Routes topic-tagged questions to stateless expert workers, gates every
// answer on its self-reported confidence, opens human escalations for the
// doubtful ones, and appends an immutable audit line for each completed
// exchange before the caller hears back.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    routing::{get, post},
    Router,
};
use chrono::Utc;
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{error, info};

pub mod audit;
pub mod config;
pub mod db;
pub mod error;
pub mod escalations;
pub mod forge;
pub mod handlers;
pub mod models;
pub mod routing;
pub mod sessions;
pub mod worker;

use crate::audit::AuditLogger;
use crate::config::HubConfig;
use crate::db::Database;
use crate::escalations::EscalationStore;
use crate::forge::ForgeNotifier;
use crate::sessions::SessionStore;
use crate::worker::WorkerClient;

pub struct AppState {
    pub db: Database,
    pub config: HubConfig,
    pub sessions: SessionStore,
    pub escalations: EscalationStore,
    pub worker: WorkerClient,
    pub audit: AuditLogger,
    pub forge: ForgeNotifier,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(db: Database, config: HubConfig) -> anyhow::Result<Self> {
        let sessions = SessionStore::new(db.pool.clone(), config.session_ttl);
        let escalations = EscalationStore::new(db.pool.clone(), config.escalation_ttl);
        let audit = AuditLogger::new(config.audit_log_path.clone());
        let forge = ForgeNotifier::new(config.forge.clone())?;

        Ok(Self {
            db,
            sessions,
            escalations,
            worker: WorkerClient::new(),
            audit,
            forge,
            config,
            started_at: Instant::now(),
        })
    }
}

pub fn create_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/invoke/:agent", post(handlers::invoke::invoke_agent))
        .route("/ask/:topic", post(handlers::ask::ask_expert))
        .route("/sessions", post(handlers::sessions::create_session))
        .route(
            "/sessions/:id",
            get(handlers::sessions::get_session).delete(handlers::sessions::delete_session),
        )
        .route(
            "/escalations/:id",
            get(handlers::escalations::get_escalation)
                .post(handlers::escalations::resolve_escalation),
        )
        .route("/health", get(handlers::health))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(Duration::from_secs(300))),
        )
        .with_state(state)
}

/// Periodic maintenance: TTL sweeps for sessions and escalations, and the
/// forge retry-queue drain. Lazy expiry on access remains authoritative;
/// the sweep only catches rows nobody touches again.
pub fn spawn_background_tasks(state: Arc<AppState>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;

            let now = Utc::now();
            match state.sessions.expire_overdue(now).await {
                Ok(0) => {}
                Ok(n) => info!("expired {} overdue sessions", n),
                Err(e) => error!("session expiry sweep failed: {}", e),
            }
            match state.escalations.expire_overdue(now).await {
                Ok(0) => {}
                Ok(n) => info!("expired {} overdue escalations", n),
                Err(e) => error!("escalation expiry sweep failed: {}", e),
            }

            for (escalation_id, comment_id) in state.forge.drain().await {
                if let Err(e) = state
                    .escalations
                    .set_external_comment_id(&escalation_id, &comment_id)
                    .await
                {
                    error!(
                        %escalation_id,
                        "failed to record late forge comment id: {}", e
                    );
                }
            }
        }
    });
}
