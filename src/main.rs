use anyhow::{Context, Result};
use spotdash::app::{create_app, run_cache_cleanup, AppServices};
use spotdash::config::ServerConfig;
use spotdash::credentials::SqliteCredentialStore;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            return Err(e).context("Failed to read .env file");
        }
    }

    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "spotdash=info".into()),
        )
        .init();

    info!("Spotdash starting...");

    let config_path = std::env::var("SPOTDASH_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("spotdash.toml"));
    let config = ServerConfig::load(&config_path)?;
    config.validate().context("Invalid configuration")?;

    info!(
        config_path = %config_path.display(),
        frontend_origin = %config.server.frontend_origin,
        redirect_uri = %config.spotify.redirect_uri,
        credentials_db = %config.storage.credentials_db,
        cookie_secure = config.session.secure,
        "Configuration loaded"
    );

    let credential_store = Arc::new(
        SqliteCredentialStore::new(&config.storage.credentials_db, &config.storage.encryption_key)
            .context("Failed to initialize credential store")?,
    );
    info!("Credential store initialized");

    let services = AppServices::new(&config, credential_store)?;
    let app = create_app(&config, &services)?;

    let cleanup_handle = tokio::spawn(run_cache_cleanup(
        services.clone(),
        config.auth.cleanup_interval_seconds,
    ));

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(addr = %addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    cleanup_handle.abort();
    info!("Spotdash stopped");

    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => warn!(error = %e, "Failed to listen for ctrl_c signal"),
    }
}
