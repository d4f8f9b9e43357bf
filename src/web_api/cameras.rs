//! Camera endpoints

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use crate::error::{Error, Result};
use crate::state::AppState;
use crate::web_api::schemas::{CameraResponse, RegisterCameraRequest};

/// Register or update a camera (idempotent upsert by camera_id).
pub async fn register_camera(
    State(state): State<AppState>,
    Json(req): Json<RegisterCameraRequest>,
) -> Result<impl IntoResponse> {
    req.validate()?;

    let existed = state.store.cameras().exists(&req.camera_id).await?;
    let camera = state
        .store
        .cameras()
        .register(&req.camera_id, &req.name, &req.location, &req.ip_address)
        .await?;

    tracing::info!(
        camera_id = %camera.camera_id,
        updated = existed,
        "Camera registered"
    );

    let status = if existed {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(CameraResponse::from(camera))))
}

/// List all cameras ordered by camera_id.
pub async fn list_cameras(State(state): State<AppState>) -> Result<Json<Vec<CameraResponse>>> {
    let cameras = state.store.cameras().list().await?;
    Ok(Json(cameras.into_iter().map(CameraResponse::from).collect()))
}

/// Fetch one camera by its stable id.
pub async fn get_camera(
    State(state): State<AppState>,
    Path(camera_id): Path<String>,
) -> Result<Json<CameraResponse>> {
    let camera = state
        .store
        .cameras()
        .get(&camera_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Camera {} not registered", camera_id)))?;

    Ok(Json(CameraResponse::from(camera)))
}

/// Stamp the camera's heartbeat timestamp.
pub async fn camera_heartbeat(
    State(state): State<AppState>,
    Path(camera_id): Path<String>,
) -> Result<Json<CameraResponse>> {
    if !state.store.cameras().heartbeat(&camera_id).await? {
        return Err(Error::NotFound(format!(
            "Camera {} not registered",
            camera_id
        )));
    }

    let camera = state
        .store
        .cameras()
        .get(&camera_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Camera {} not registered", camera_id)))?;

    Ok(Json(CameraResponse::from(camera)))
}

/// Delete a camera; its events cascade away with it.
pub async fn delete_camera(
    State(state): State<AppState>,
    Path(camera_id): Path<String>,
) -> Result<impl IntoResponse> {
    if !state.store.cameras().delete(&camera_id).await? {
        return Err(Error::NotFound(format!(
            "Camera {} not registered",
            camera_id
        )));
    }

    tracing::info!(camera_id = %camera_id, "Camera deleted (events cascaded)");
    Ok(StatusCode::NO_CONTENT)
}
