mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::info;

use linkvault_api::storage::Storage;
use linkvault_api::{AppState, ContentEngine, IdentityGate, build_router, sweeper};
use linkvault_db::Database;

use crate::config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "linkvault_server=debug,linkvault_api=debug,tower_http=debug".into()),
        )
        .init();

    let config = ServerConfig::from_env()?;

    // Init DB and storage
    let db = Arc::new(Database::open(&config.db_path)?);
    let storage = Arc::new(Storage::new(config.upload_dir.clone()).await?);

    let sweep_interval = config.vault.sweep_interval;
    let session_ttl = config.vault.session_ttl;
    let engine = Arc::new(ContentEngine::new(db.clone(), storage, config.vault));
    let identity = Arc::new(IdentityGate::new(db, session_ttl));

    tokio::spawn(sweeper::run_sweep_loop(
        engine.clone(),
        identity.clone(),
        sweep_interval,
    ));

    let app = build_router(AppState { engine, identity });

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("LinkVault listening on {}", addr);
    info!("Sweeping expired content every {}s", sweep_interval.as_secs());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
