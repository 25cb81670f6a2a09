use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use orchestrator::config::OrchestratorConfig;
use orchestrator::db::Database;
use orchestrator::{create_app, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "orchestrator=info,tower_http=info".into()),
        )
        .init();

    dotenvy::dotenv().ok();

    let config = OrchestratorConfig::from_env()?;

    let db = Database::new(&config.database_url).await?;
    db.migrate().await?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let state = Arc::new(AppState::new(db, config));
    let app = create_app(state);

    info!("orchestrator listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
