//! WebAPI - REST API endpoints
//!
//! ## Responsibilities
//!
//! - HTTP routes under the `/api/v1` prefix
//! - Request validation (schemas) before any store access
//! - Response formatting and error shaping

mod cameras;
mod events;
mod logs;
pub mod schemas;
mod stats;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{delete, get, patch, post};
use axum::{Json, Router};
use serde_json::json;

use crate::db;
use crate::state::AppState;
use crate::web_api::schemas::HealthResponse;

/// Create the API router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/api/v1/health", get(health_check))
        // Cameras
        .route("/api/v1/cameras/register", post(cameras::register_camera))
        .route("/api/v1/cameras", get(cameras::list_cameras))
        .route("/api/v1/cameras/:camera_id", get(cameras::get_camera))
        .route("/api/v1/cameras/:camera_id", delete(cameras::delete_camera))
        .route(
            "/api/v1/cameras/:camera_id/heartbeat",
            post(cameras::camera_heartbeat),
        )
        .route("/api/v1/cameras/:camera_id/stats", get(stats::camera_stats))
        // Events
        .route("/api/v1/events", post(events::create_event))
        .route("/api/v1/events", get(events::list_events))
        .route("/api/v1/events/:event_id", get(events::get_event))
        .route(
            "/api/v1/events/:event_id/neighbors",
            get(events::get_event_neighbors),
        )
        .route(
            "/api/v1/events/:event_id/files",
            patch(events::update_event_files),
        )
        .route(
            "/api/v1/events/:event_id/status",
            patch(events::update_event_status),
        )
        // Logs
        .route("/api/v1/logs", post(logs::ingest_logs))
        .route("/api/v1/logs", get(logs::query_logs))
        .route("/api/v1/logs/since/:watermark", get(logs::logs_since))
        // Statistics
        .route("/api/v1/stats/overview", get(stats::overview))
        .with_state(state)
}

/// Root endpoint - API identification for anything that pokes the port.
async fn root() -> impl IntoResponse {
    Json(json!({
        "name": "CamHub Central Server API",
        "version": env!("CARGO_PKG_VERSION"),
        "health": "/api/v1/health",
    }))
}

/// Health check: healthy only when the database answers a trivial probe
/// within the configured bound.
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let database_connected =
        db::health_probe(state.store.pool(), state.config.http.health_probe_timeout).await;

    let status = if database_connected {
        "healthy"
    } else {
        "unhealthy"
    };

    Json(HealthResponse {
        status: status.to_string(),
        database_connected,
        timestamp: chrono::Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
