//! Camera repository

use sqlx::MySqlPool;

use crate::error::{Error, Result};
use crate::models::Camera;

const CAMERA_COLUMNS: &str =
    "id, camera_id, name, location, ip_address, status, last_seen, created_at, updated_at";

#[derive(Clone)]
pub struct CameraRepository {
    pool: MySqlPool,
}

impl CameraRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Idempotent upsert keyed by the stable camera id. Re-registering with
    /// identical fields is a no-op; differing fields are last-write-wins.
    pub async fn register(
        &self,
        camera_id: &str,
        name: &str,
        location: &str,
        ip_address: &str,
    ) -> Result<Camera> {
        sqlx::query(
            r#"
            INSERT INTO cameras (camera_id, name, location, ip_address, status)
            VALUES (?, ?, ?, ?, 'online')
            ON DUPLICATE KEY UPDATE
                name = VALUES(name),
                location = VALUES(location),
                ip_address = VALUES(ip_address),
                status = 'online'
            "#,
        )
        .bind(camera_id)
        .bind(name)
        .bind(location)
        .bind(ip_address)
        .execute(&self.pool)
        .await?;

        self.get(camera_id)
            .await?
            .ok_or_else(|| Error::Internal(format!("camera {} missing after upsert", camera_id)))
    }

    pub async fn get(&self, camera_id: &str) -> Result<Option<Camera>> {
        let camera = sqlx::query_as::<_, Camera>(&format!(
            "SELECT {} FROM cameras WHERE camera_id = ?",
            CAMERA_COLUMNS
        ))
        .bind(camera_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(camera)
    }

    pub async fn list(&self) -> Result<Vec<Camera>> {
        let cameras = sqlx::query_as::<_, Camera>(&format!(
            "SELECT {} FROM cameras ORDER BY camera_id",
            CAMERA_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(cameras)
    }

    pub async fn exists(&self, camera_id: &str) -> Result<bool> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM cameras WHERE camera_id = ?")
            .bind(camera_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    /// Stamp the last-heartbeat timestamp. Returns false when the camera is
    /// not registered.
    pub async fn heartbeat(&self, camera_id: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE cameras SET last_seen = NOW(6), status = 'online' WHERE camera_id = ?",
        )
        .bind(camera_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete a camera; its events cascade via the foreign key.
    pub async fn delete(&self, camera_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM cameras WHERE camera_id = ?")
            .bind(camera_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
