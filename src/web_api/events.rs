//! Event endpoints
//!
//! Cameras drive the event lifecycle through these handlers: create at
//! motion detection, progressive file updates as artifacts land on shared
//! storage, then a single terminal status commit. The viewer reads the same
//! records through the list/get/neighbor queries.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use crate::error::{Error, Result};
use crate::models::Event;
use crate::state::AppState;
use crate::web_api::schemas::{
    CreateEventRequest, EventListQuery, EventListResponse, EventResponse,
    EventStatusUpdateRequest, FileUpdateRequest, NeighborsQuery, NeighborsResponse,
};

/// Create a motion event in its initial state.
pub async fn create_event(
    State(state): State<AppState>,
    Json(req): Json<CreateEventRequest>,
) -> Result<impl IntoResponse> {
    req.validate()?;

    if !state.store.cameras().exists(&req.camera_id).await? {
        return Err(Error::NotFound(format!(
            "Camera {} not registered",
            req.camera_id
        )));
    }

    let event = state
        .store
        .events()
        .create(
            &req.camera_id,
            req.timestamp,
            req.motion_score,
            req.confidence_score,
        )
        .await?;

    tracing::info!(
        event_id = event.id,
        camera_id = %event.camera_id,
        motion_score = event.motion_score,
        "Event created"
    );

    Ok((StatusCode::CREATED, Json(EventResponse::from(event))))
}

/// Paginated event listing, newest first.
pub async fn list_events(
    State(state): State<AppState>,
    Query(query): Query<EventListQuery>,
) -> Result<Json<EventListResponse>> {
    let (filter, limit, offset) = query.validate()?;

    let (events, total) = state.store.events().list(&filter, limit, offset).await?;

    Ok(Json(EventListResponse {
        events: events.into_iter().map(EventResponse::from).collect(),
        total,
        limit,
        offset,
    }))
}

/// Full event record by id.
pub async fn get_event(
    State(state): State<AppState>,
    Path(event_id): Path<i32>,
) -> Result<Json<EventResponse>> {
    let event = fetch_event(&state, event_id).await?;
    Ok(Json(EventResponse::from(event)))
}

/// Previous/next event ids by id order, optionally scoped to one camera.
pub async fn get_event_neighbors(
    State(state): State<AppState>,
    Path(event_id): Path<i32>,
    Query(query): Query<NeighborsQuery>,
) -> Result<Json<NeighborsResponse>> {
    // 404 for a nonexistent anchor keeps the viewer honest.
    fetch_event(&state, event_id).await?;

    let (previous_id, next_id) = state
        .store
        .events()
        .neighbors(event_id, query.camera_id.as_deref())
        .await?;

    Ok(Json(NeighborsResponse {
        previous_id,
        next_id,
    }))
}

/// Record an artifact transfer: path column + transfer flag, idempotent on
/// re-send, conflict on a differing path for the same slot.
pub async fn update_event_files(
    State(state): State<AppState>,
    Path(event_id): Path<i32>,
    Json(req): Json<FileUpdateRequest>,
) -> Result<Json<EventResponse>> {
    let kind = req.validate()?;

    let event = fetch_event(&state, event_id).await?;

    match event.artifact_path(kind) {
        // Re-sending the identical update is a no-op.
        Some(existing) if existing == req.file_path => {
            return Ok(Json(EventResponse::from(event)));
        }
        Some(existing) => {
            return Err(Error::Conflict(format!(
                "{} for event {} is already {}",
                kind.as_str(),
                event_id,
                existing
            )));
        }
        None => {}
    }

    let updated = state
        .store
        .events()
        .set_artifact(event_id, kind, &req.file_path, req.video_duration)
        .await?;

    if !updated {
        // Lost a race with a concurrent update for the same slot; re-read to
        // tell the idempotent case from a genuine conflict.
        let current = fetch_event(&state, event_id).await?;
        match current.artifact_path(kind) {
            Some(existing) if existing == req.file_path => {
                return Ok(Json(EventResponse::from(current)));
            }
            other => {
                return Err(Error::Conflict(format!(
                    "{} for event {} is already {}",
                    kind.as_str(),
                    event_id,
                    other.unwrap_or_default()
                )));
            }
        }
    }

    tracing::info!(
        event_id = event_id,
        camera_id = %event.camera_id,
        file_type = kind.as_str(),
        file_path = %req.file_path,
        "Event file transferred"
    );

    let event = fetch_event(&state, event_id).await?;
    Ok(Json(EventResponse::from(event)))
}

/// Camera-driven terminal status commit. Legal only from `processing`.
pub async fn update_event_status(
    State(state): State<AppState>,
    Path(event_id): Path<i32>,
    Json(req): Json<EventStatusUpdateRequest>,
) -> Result<Json<EventResponse>> {
    let target = req.validate()?;

    let event = fetch_event(&state, event_id).await?;

    if !state.store.events().update_status(event_id, target).await? {
        // Re-read for the message: the row may have gone terminal between
        // the fetch above and the conditional update.
        let current = fetch_event(&state, event_id).await?;
        return Err(Error::Conflict(format!(
            "Event {} is already {}",
            event_id,
            current.status.as_str()
        )));
    }

    tracing::info!(
        event_id = event_id,
        camera_id = %event.camera_id,
        from = event.status.as_str(),
        to = target.as_str(),
        "Event status updated"
    );

    let event = fetch_event(&state, event_id).await?;
    Ok(Json(EventResponse::from(event)))
}

async fn fetch_event(state: &AppState, event_id: i32) -> Result<Event> {
    state
        .store
        .events()
        .get(event_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Event {} not found", event_id)))
}
