use std::sync::Arc;

use anyhow::Result;
use mexc_copier_server::api::{create_router, AppState};
use mexc_copier_server::config::Config;
use mexc_copier_server::db::Database;
use mexc_copier_server::engine::Engine;
use mexc_copier_server::logging;
use mexc_copier_server::modes::{MirrorDriver, PushDriver, TokenRegistry};
use mexc_copier_server::session::SessionManager;

#[tokio::main]
async fn main() -> Result<()> {
    // Determine config directory from CONFIG_DIR environment variable,
    // falling back to the working directory
    let config_dir = std::env::var("CONFIG_DIR").unwrap_or_else(|_| ".".to_string());
    let config_base = format!("{}/config", config_dir);

    // Loads config.toml, config.{CONFIG_ENV}.toml and config.local.toml (if they exist)
    let config = match Config::from_file(&config_base) {
        Ok(cfg) => {
            eprintln!("Configuration loaded from {}", config_base);
            cfg
        }
        Err(e) => {
            eprintln!("Failed to load configuration: {}, using defaults", e);
            Config::default()
        }
    };

    // the guard keeps buffered file logging alive until main returns
    let _log_guard = logging::init(&config.logging);

    tracing::info!("Starting MEXC copier server...");

    if config.copy.dry_run {
        tracing::info!("DRY_RUN enabled - writes are logged and skipped");
    } else {
        tracing::warn!("DRY_RUN disabled - real trades will be executed!");
    }

    // DATABASE_URL environment variable overrides config.toml
    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| config.database.url.clone());
    let db = Arc::new(Database::new(&database_url).await?);
    tracing::info!("Database initialized: {}", database_url);

    // Core services, constructed once and shared by reference
    let engine = Arc::new(Engine::new(
        db.clone(),
        db.clone(),
        db.clone(),
        db.clone(),
        config.exchange.base_url.clone(),
        config.copy.dry_run,
    ));
    let manager = Arc::new(SessionManager::new(engine, db.clone()));
    let tokens = Arc::new(TokenRegistry::new());
    let push = Arc::new(PushDriver::new(
        manager.clone(),
        config.exchange.ws_url.clone(),
        config.copy.action_timeout_secs,
    ));
    let mirror = Arc::new(MirrorDriver::new(
        manager.clone(),
        tokens,
        config.mirror.api_url.clone(),
    ));

    let state = AppState {
        db: db.clone(),
        manager: manager.clone(),
        push: push.clone(),
        mirror,
        config: Arc::new(config.clone()),
    };

    let app = create_router(state);

    let address = config.server_address();
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!("HTTP server listening on {}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutting down...");

    // disconnect push streams first, then let sessions observe the cleared flag
    push.stop_all().await;
    manager.stop_all().await;
    db.close().await;

    tracing::info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install ctrl-c handler");
}
