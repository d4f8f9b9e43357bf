//! Log endpoints
//!
//! Batch intake from cameras and the coordinator's own components, plus the
//! viewer's query surfaces. Ordering and tailing are keyed on the
//! DB-assigned id, never on client timestamps.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use crate::error::{Error, Result};
use crate::state::AppState;
use crate::web_api::schemas::{
    LogEntry, LogIngestResponse, LogListQuery, LogListResponse, LogResponse, LogSinceQuery,
};

/// Ingest a batch of log lines. The batch is atomic: one invalid line
/// rejects the whole request before anything is written.
pub async fn ingest_logs(
    State(state): State<AppState>,
    Json(entries): Json<Vec<LogEntry>>,
) -> Result<impl IntoResponse> {
    if entries.is_empty() {
        return Err(Error::validation("logs", "log batch must not be empty"));
    }

    let mut lines = Vec::with_capacity(entries.len());
    for entry in &entries {
        lines.push(entry.validate()?);
    }

    let (first_id, last_id) = state.store.logs().insert_batch(&lines).await?;

    tracing::debug!(
        accepted = lines.len(),
        first_id = first_id,
        last_id = last_id,
        source = %lines[0].source,
        "Log batch ingested"
    );

    Ok((
        StatusCode::CREATED,
        Json(LogIngestResponse {
            accepted: lines.len(),
            first_id,
            last_id,
        }),
    ))
}

/// Paginated log query with source/level/time filters.
pub async fn query_logs(
    State(state): State<AppState>,
    Query(query): Query<LogListQuery>,
) -> Result<Json<LogListResponse>> {
    let (filter, order, limit, offset) = query.validate()?;

    let (logs, total) = state.store.logs().query(&filter, order, limit, offset).await?;

    Ok(Json(LogListResponse {
        logs: logs.into_iter().map(LogResponse::from).collect(),
        total,
        limit,
        offset,
    }))
}

/// Tail logs after an id watermark, ascending, so the caller can advance a
/// monotonically increasing cursor without re-reading history.
pub async fn logs_since(
    State(state): State<AppState>,
    Path(watermark): Path<i64>,
    Query(query): Query<LogSinceQuery>,
) -> Result<Json<Vec<LogResponse>>> {
    let (filter, limit) = query.validate()?;

    let logs = state.store.logs().since(watermark, &filter, limit).await?;

    Ok(Json(logs.into_iter().map(LogResponse::from).collect()))
}
