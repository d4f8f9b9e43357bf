//! Statistics endpoints
//!
//! Read-only aggregate counters for dashboards. File sizes are not recorded
//! per artifact, so the byte figures are estimates from typical sizes.

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{Duration, Utc};

use crate::error::{Error, Result};
use crate::state::AppState;
use crate::web_api::schemas::{
    CameraStatsQuery, CameraStatsResponse, CountEntry, OverviewResponse,
};

/// Rough per-artifact byte estimates (no sizes in the data model).
const IMAGE_BYTES: i64 = 200_000;
const THUMBNAIL_BYTES: i64 = 50_000;
const VIDEO_BYTES_PER_SECOND: f64 = 500_000.0;

/// Per-camera counters over a trailing window (default 24h, max one week).
pub async fn camera_stats(
    State(state): State<AppState>,
    Path(camera_id): Path<String>,
    Query(query): Query<CameraStatsQuery>,
) -> Result<Json<CameraStatsResponse>> {
    let hours = query.hours.unwrap_or(24);
    if !(1..=168).contains(&hours) {
        return Err(Error::validation("hours", "hours must be between 1 and 168"));
    }

    if !state.store.cameras().exists(&camera_id).await? {
        return Err(Error::NotFound(format!(
            "Camera {} not registered",
            camera_id
        )));
    }

    let since = Utc::now() - Duration::hours(hours);
    let (events, images_a, images_b, thumbs, videos, video_seconds) = state
        .store
        .events()
        .camera_window_counts(&camera_id, since)
        .await?;

    let files = images_a + images_b + thumbs + videos;
    let bytes = (images_a + images_b) * IMAGE_BYTES
        + thumbs * THUMBNAIL_BYTES
        + (video_seconds * VIDEO_BYTES_PER_SECOND) as i64;

    Ok(Json(CameraStatsResponse {
        events,
        files,
        bytes,
        period_hours: hours,
    }))
}

/// Deployment-wide counters for the dashboard landing page.
pub async fn overview(State(state): State<AppState>) -> Result<Json<OverviewResponse>> {
    let events = state.store.events();

    let to_entries = |rows: Vec<(String, i64)>| {
        rows.into_iter()
            .map(|(key, count)| CountEntry { key, count })
            .collect::<Vec<_>>()
    };

    Ok(Json(OverviewResponse {
        events_by_status: to_entries(events.counts_by_status().await?),
        events_by_mp4_status: to_entries(events.counts_by_mp4_status().await?),
        events_by_camera: to_entries(events.counts_by_camera().await?),
        events_by_day: to_entries(events.counts_by_day(30).await?),
        ai_backlog: events.ai_backlog().await?,
    }))
}
