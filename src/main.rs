use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use lockbox::{AppState, Config, Database, FileStorage, StoreMonitor, WebServer};

#[tokio::main]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    // Load configuration
    let (mut config, load_error) = match Config::load(&config_path) {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    };
    config.apply_env_overrides();

    // Initialize logging
    if let Err(e) = lockbox::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        // Fall back to console-only logging
        lockbox::logging::init_console_only(&config.logging.level);
    }

    if let Some(e) = load_error {
        warn!("Failed to load {}: {}. Using default configuration.", config_path, e);
    }

    if let Err(e) = run(config).await {
        error!("Fatal: {}", e);
        std::process::exit(1);
    }
}

async fn run(config: Config) -> lockbox::Result<()> {
    config.validate()?;

    info!("Lockbox - password-protected file sharing");
    info!(
        "Server configured on {}:{}, links under {}",
        config.server.host, config.server.port, config.server.public_url
    );

    let acquire_timeout = Duration::from_secs(config.database.acquire_timeout_secs);
    let db = Database::open(&config.database.path, acquire_timeout).await?;
    let storage = FileStorage::new(&config.storage.path)?;

    let monitor = Arc::new(StoreMonitor::new(true));
    if !monitor.probe(&db, acquire_timeout).await {
        warn!("Database not reachable at startup; requests will get 503 until it recovers");
    }
    let probe_task = monitor.spawn(
        db.clone(),
        Duration::from_secs(config.database.health_check_interval_secs),
    );

    let state = AppState::from_database(&db, storage, monitor, &config)?;
    let server = WebServer::new(&config, Arc::new(state))?;

    server.run(shutdown_signal()).await?;

    probe_task.abort();
    db.close().await;
    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
