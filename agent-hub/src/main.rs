use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use agent_hub::config::HubConfig;
use agent_hub::db::Database;
use agent_hub::{create_app, spawn_background_tasks, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "agent_hub=info,tower_http=info".into()),
        )
        .init();

    dotenvy::dotenv().ok();

    let config = HubConfig::from_env()?;

    let db = Database::new(&config.database_url).await?;
    db.migrate().await?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let state = Arc::new(AppState::new(db, config)?);

    spawn_background_tasks(state.clone());

    let app = create_app(state);

    info!("agent hub listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
