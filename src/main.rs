//! CamHub API server
//!
//! Main entry point for the event coordination API.

use std::process::ExitCode;
use std::time::Duration;

use axum::http::HeaderValue;
use camhub::config::AppConfig;
use camhub::store::Store;
use camhub::{db, web_api, AppState};
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Exit codes: 0 success, 1 unhandled failure, 2 misconfiguration,
/// 3 storage unreachable at startup.
const EXIT_FAILURE: u8 = 1;
const EXIT_MISCONFIGURED: u8 = 2;
const EXIT_STORAGE_UNREACHABLE: u8 = 3;

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "camhub=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting CamHub central server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            return ExitCode::from(EXIT_MISCONFIGURED);
        }
    };
    tracing::info!(
        db_host = %config.database.host,
        db_name = %config.database.database,
        media_root = %config.storage.media_root.display(),
        bind = %config.http.bind_addr(),
        "Configuration loaded"
    );

    // Create database pool; storage must be reachable at startup.
    let pool = match db::connect(&config.database, &config.pool).await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!(error = %e, "Database unreachable");
            return ExitCode::from(EXIT_STORAGE_UNREACHABLE);
        }
    };
    tracing::info!("Database connected");

    if let Err(e) = db::migrate(&pool).await {
        tracing::error!(error = %e, "Migrations failed");
        return ExitCode::from(EXIT_STORAGE_UNREACHABLE);
    }
    tracing::info!("Migrations applied");

    let store = Store::new(pool);

    // Spawn the daily log-retention task when a horizon is configured.
    if let Some(days) = config.log_retention_days {
        let logs = store.logs().clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(24 * 3600));
            loop {
                interval.tick().await;
                let cutoff = chrono::Utc::now() - chrono::Duration::days(days as i64);
                match logs.prune_older_than(cutoff).await {
                    Ok(0) => {}
                    Ok(pruned) => tracing::info!(pruned = pruned, "Pruned old log rows"),
                    Err(e) => tracing::warn!(error = %e, "Log retention pass failed"),
                }
            }
        });
        tracing::info!(retention_days = days, "Log retention task started");
    }

    let state = AppState::new(store, config.clone());

    // CORS: explicit origin list when configured, otherwise any.
    let cors = if config.http.allowed_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .http
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    };

    let app = web_api::create_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(config.http.request_timeout));

    // Start server
    let listener = match tokio::net::TcpListener::bind(config.http.bind_addr()).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, addr = %config.http.bind_addr(), "Bind failed");
            return ExitCode::from(EXIT_FAILURE);
        }
    };
    tracing::info!("Listening on {}", config.http.bind_addr());

    let serve = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal());
    if let Err(e) = serve.await {
        tracing::error!(error = %e, "Server error");
        return ExitCode::from(EXIT_FAILURE);
    }

    tracing::info!("Shutdown complete");
    ExitCode::SUCCESS
}

/// Resolve on ctrl-c or SIGTERM; in-flight requests then get the graceful
/// drain axum provides.
async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
