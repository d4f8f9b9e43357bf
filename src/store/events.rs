//! Event repository
//!
//! Owns event rows end to end: creation, queries, the camera-driven status
//! transition, progressive file updates, and the worker claim primitives.
//!
//! Claims are conditional updates. A worker first selects a candidate id,
//! then issues an UPDATE whose WHERE clause re-checks the claim predicate;
//! only a rows_affected of 1 means the claim was won. Commits re-check the
//! claimant in the same way, so a worker whose claim was reclaimed cannot
//! overwrite the thief's result.

use chrono::{DateTime, Utc};
use sqlx::mysql::MySql;
use sqlx::{MySqlPool, QueryBuilder};

use crate::models::{ArtifactKind, Event, EventStatus, Mp4Status};
use crate::error::Result;

const EVENT_COLUMNS: &str = "id, camera_id, timestamp, motion_score, confidence_score, status, \
     image_a_path, image_b_path, thumbnail_path, video_h264_path, video_mp4_path, \
     video_duration, image_a_transferred, image_b_transferred, thumbnail_transferred, \
     video_transferred, mp4_conversion_status, mp4_converted_at, mp4_claimed_by, \
     mp4_claimed_at, ai_processed, ai_processed_at, ai_claimed_by, ai_claimed_at, \
     ai_person_detected, ai_confidence, ai_objects, ai_description, ai_phrase, ai_error, \
     created_at, updated_at";

/// Filters for event listing
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub camera_id: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub status: Option<EventStatus>,
    pub mp4_status: Option<Mp4Status>,
    pub ai_processed: Option<bool>,
}

/// Result columns written by a successful AI analysis
#[derive(Debug, Clone, Default)]
pub struct AiOutcome {
    pub person_detected: Option<bool>,
    pub confidence: Option<f64>,
    pub objects: Option<String>,
    pub description: Option<String>,
    pub phrase: Option<String>,
}

#[derive(Clone)]
pub struct EventRepository {
    pool: MySqlPool,
}

fn push_event_filters(qb: &mut QueryBuilder<'_, MySql>, filter: &EventFilter) {
    if let Some(ref camera_id) = filter.camera_id {
        qb.push(" AND camera_id = ").push_bind(camera_id.clone());
    }
    if let Some(start) = filter.start {
        qb.push(" AND timestamp >= ").push_bind(start);
    }
    if let Some(end) = filter.end {
        qb.push(" AND timestamp <= ").push_bind(end);
    }
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(mp4_status) = filter.mp4_status {
        qb.push(" AND mp4_conversion_status = ")
            .push_bind(mp4_status.as_str());
    }
    if let Some(ai_processed) = filter.ai_processed {
        qb.push(" AND ai_processed = ").push_bind(ai_processed);
    }
}

impl EventRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Create an event in its initial state: status processing, MP4 pending,
    /// no artifacts, all transfer flags false.
    pub async fn create(
        &self,
        camera_id: &str,
        timestamp: DateTime<Utc>,
        motion_score: f64,
        confidence_score: Option<f64>,
    ) -> Result<Event> {
        let result = sqlx::query(
            r#"
            INSERT INTO events (camera_id, timestamp, motion_score, confidence_score)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(camera_id)
        .bind(timestamp)
        .bind(motion_score)
        .bind(confidence_score)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_id() as i32;
        self.get(id)
            .await?
            .ok_or_else(|| crate::error::Error::Internal(format!("event {} missing after insert", id)))
    }

    pub async fn get(&self, id: i32) -> Result<Option<Event>> {
        let event = sqlx::query_as::<_, Event>(&format!(
            "SELECT {} FROM events WHERE id = ?",
            EVENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(event)
    }

    /// List events newest-first with pagination; returns the page and the
    /// total count matching the filter.
    pub async fn list(
        &self,
        filter: &EventFilter,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Event>, i64)> {
        let mut count_qb =
            QueryBuilder::<MySql>::new("SELECT COUNT(*) FROM events WHERE 1=1");
        push_event_filters(&mut count_qb, filter);
        let total: i64 = count_qb.build_query_scalar().fetch_one(&self.pool).await?;

        let mut qb = QueryBuilder::<MySql>::new(format!(
            "SELECT {} FROM events WHERE 1=1",
            EVENT_COLUMNS
        ));
        push_event_filters(&mut qb, filter);
        qb.push(" ORDER BY timestamp DESC, id DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let events = qb.build_query_as::<Event>().fetch_all(&self.pool).await?;

        Ok((events, total))
    }

    /// Neighbor event ids by id order, optionally scoped to one camera.
    /// Id order matches creation order, not necessarily event timestamps.
    pub async fn neighbors(
        &self,
        id: i32,
        camera_id: Option<&str>,
    ) -> Result<(Option<i32>, Option<i32>)> {
        let (previous,): (Option<i64>,) = match camera_id {
            Some(camera) => {
                sqlx::query_as(
                    "SELECT MAX(id) FROM events WHERE id < ? AND camera_id = ?",
                )
                .bind(id)
                .bind(camera)
                .fetch_one(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as("SELECT MAX(id) FROM events WHERE id < ?")
                    .bind(id)
                    .fetch_one(&self.pool)
                    .await?
            }
        };

        let (next,): (Option<i64>,) = match camera_id {
            Some(camera) => {
                sqlx::query_as(
                    "SELECT MIN(id) FROM events WHERE id > ? AND camera_id = ?",
                )
                .bind(id)
                .bind(camera)
                .fetch_one(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as("SELECT MIN(id) FROM events WHERE id > ?")
                    .bind(id)
                    .fetch_one(&self.pool)
                    .await?
            }
        };

        Ok((previous.map(|v| v as i32), next.map(|v| v as i32)))
    }

    /// Write an artifact path and flip its transfer flag.
    ///
    /// Conditional on the stored path being NULL or already equal to the new
    /// one, which makes re-sends a no-op while a different path for the same
    /// slot affects zero rows (the caller maps that to a conflict).
    pub async fn set_artifact(
        &self,
        event_id: i32,
        kind: ArtifactKind,
        path: &str,
        video_duration: Option<f64>,
    ) -> Result<bool> {
        let (path_col, flag_col) = match kind {
            ArtifactKind::ImageA => ("image_a_path", "image_a_transferred"),
            ArtifactKind::ImageB => ("image_b_path", "image_b_transferred"),
            ArtifactKind::Thumbnail => ("thumbnail_path", "thumbnail_transferred"),
            ArtifactKind::VideoH264 => ("video_h264_path", "video_transferred"),
        };

        let duration_clause = if kind == ArtifactKind::VideoH264 {
            ", video_duration = COALESCE(?, video_duration)"
        } else {
            ""
        };

        let sql = format!(
            "UPDATE events SET {path} = ?, {flag} = TRUE{duration} \
             WHERE id = ? AND ({path} IS NULL OR {path} = ?)",
            path = path_col,
            flag = flag_col,
            duration = duration_clause,
        );

        let mut query = sqlx::query(&sql).bind(path);
        if kind == ArtifactKind::VideoH264 {
            query = query.bind(video_duration);
        }
        let result = query.bind(event_id).bind(path).execute(&self.pool).await?;

        Ok(result.rows_affected() > 0)
    }

    /// Camera-driven terminal transition. Only legal from `processing`;
    /// returns false when the row was already terminal (or absent).
    pub async fn update_status(&self, event_id: i32, target: EventStatus) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE events SET status = ? WHERE id = ? AND status = 'processing'",
        )
        .bind(target.as_str())
        .bind(event_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    // ========================================
    // Conversion worker primitives
    // ========================================

    /// Reset conversion claims stuck in `processing` past the horizon.
    pub async fn recover_stale_conversions(&self, horizon_secs: u64) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE events
            SET mp4_conversion_status = 'pending',
                mp4_claimed_by = NULL,
                mp4_claimed_at = NULL
            WHERE mp4_conversion_status = 'processing'
              AND mp4_claimed_at < NOW(6) - INTERVAL ? SECOND
            "#,
        )
        .bind(horizon_secs)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Atomically claim up to `batch` events pending conversion.
    pub async fn claim_for_conversion(
        &self,
        worker_id: &str,
        batch: u32,
    ) -> Result<Vec<Event>> {
        let mut claimed = Vec::new();

        while claimed.len() < batch as usize {
            let candidate: Option<(i32,)> = sqlx::query_as(
                r#"
                SELECT id FROM events
                WHERE mp4_conversion_status = 'pending'
                  AND video_transferred = TRUE
                  AND video_h264_path IS NOT NULL
                  AND video_h264_path != ''
                ORDER BY timestamp DESC
                LIMIT 1
                "#,
            )
            .fetch_optional(&self.pool)
            .await?;

            let Some((candidate_id,)) = candidate else {
                break;
            };

            let won = sqlx::query(
                r#"
                UPDATE events
                SET mp4_conversion_status = 'processing',
                    mp4_claimed_by = ?,
                    mp4_claimed_at = NOW(6)
                WHERE id = ?
                  AND mp4_conversion_status = 'pending'
                  AND video_transferred = TRUE
                "#,
            )
            .bind(worker_id)
            .bind(candidate_id)
            .execute(&self.pool)
            .await?;

            if won.rows_affected() != 1 {
                // Lost the race to another worker; its next candidate select
                // will skip this row. Give up until the next poll.
                break;
            }

            if let Some(event) = self.get(candidate_id).await? {
                claimed.push(event);
            }
        }

        Ok(claimed)
    }

    /// Put a claimed event back to `pending` (artifact not trustworthy yet).
    pub async fn release_conversion_claim(
        &self,
        event_id: i32,
        worker_id: &str,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE events
            SET mp4_conversion_status = 'pending',
                mp4_claimed_by = NULL,
                mp4_claimed_at = NULL
            WHERE id = ? AND mp4_conversion_status = 'processing' AND mp4_claimed_by = ?
            "#,
        )
        .bind(event_id)
        .bind(worker_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Commit a successful conversion. Returns false when the claim was
    /// reclaimed in the meantime, in which case nothing was written.
    pub async fn complete_conversion(
        &self,
        event_id: i32,
        worker_id: &str,
        mp4_path: &str,
        duration_secs: f64,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE events
            SET mp4_conversion_status = 'complete',
                video_mp4_path = ?,
                video_duration = ?,
                mp4_converted_at = NOW(6),
                mp4_claimed_by = NULL,
                mp4_claimed_at = NULL
            WHERE id = ? AND mp4_conversion_status = 'processing' AND mp4_claimed_by = ?
            "#,
        )
        .bind(mp4_path)
        .bind(duration_secs)
        .bind(event_id)
        .bind(worker_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Latch the conversion sub-state to `failed`.
    pub async fn fail_conversion(
        &self,
        event_id: i32,
        worker_id: &str,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE events
            SET mp4_conversion_status = 'failed',
                mp4_claimed_by = NULL,
                mp4_claimed_at = NULL
            WHERE id = ? AND mp4_conversion_status = 'processing' AND mp4_claimed_by = ?
            "#,
        )
        .bind(event_id)
        .bind(worker_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    // ========================================
    // Optimization worker primitives
    // ========================================

    /// Clear optimization claims older than the horizon. The sub-state stays
    /// `complete`; only the claimant columns are used for this phase.
    pub async fn recover_stale_optimizations(&self, horizon_secs: u64) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE events
            SET mp4_claimed_by = NULL,
                mp4_claimed_at = NULL
            WHERE mp4_conversion_status = 'complete'
              AND mp4_claimed_by IS NOT NULL
              AND mp4_claimed_at < NOW(6) - INTERVAL ? SECOND
            "#,
        )
        .bind(horizon_secs)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Atomically claim up to `batch` converted events for optimization.
    pub async fn claim_for_optimization(
        &self,
        worker_id: &str,
        batch: u32,
    ) -> Result<Vec<Event>> {
        let mut claimed = Vec::new();

        while claimed.len() < batch as usize {
            let candidate: Option<(i32,)> = sqlx::query_as(
                r#"
                SELECT id FROM events
                WHERE mp4_conversion_status = 'complete'
                  AND video_mp4_path IS NOT NULL
                  AND mp4_claimed_by IS NULL
                ORDER BY timestamp DESC
                LIMIT 1
                "#,
            )
            .fetch_optional(&self.pool)
            .await?;

            let Some((candidate_id,)) = candidate else {
                break;
            };

            let won = sqlx::query(
                r#"
                UPDATE events
                SET mp4_claimed_by = ?,
                    mp4_claimed_at = NOW(6)
                WHERE id = ?
                  AND mp4_conversion_status = 'complete'
                  AND mp4_claimed_by IS NULL
                "#,
            )
            .bind(worker_id)
            .bind(candidate_id)
            .execute(&self.pool)
            .await?;

            if won.rows_affected() != 1 {
                break;
            }

            if let Some(event) = self.get(candidate_id).await? {
                claimed.push(event);
            }
        }

        Ok(claimed)
    }

    pub async fn release_optimization_claim(
        &self,
        event_id: i32,
        worker_id: &str,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE events
            SET mp4_claimed_by = NULL,
                mp4_claimed_at = NULL
            WHERE id = ? AND mp4_conversion_status = 'complete' AND mp4_claimed_by = ?
            "#,
        )
        .bind(event_id)
        .bind(worker_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Commit a successful optimization: sub-state to `optimized`, path
    /// rewritten to the optimized file.
    pub async fn complete_optimization(
        &self,
        event_id: i32,
        worker_id: &str,
        mp4_path: &str,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE events
            SET mp4_conversion_status = 'optimized',
                video_mp4_path = ?,
                mp4_claimed_by = NULL,
                mp4_claimed_at = NULL
            WHERE id = ? AND mp4_conversion_status = 'complete' AND mp4_claimed_by = ?
            "#,
        )
        .bind(mp4_path)
        .bind(event_id)
        .bind(worker_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn fail_optimization(&self, event_id: i32, worker_id: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE events
            SET mp4_conversion_status = 'failed',
                mp4_claimed_by = NULL,
                mp4_claimed_at = NULL
            WHERE id = ? AND mp4_conversion_status = 'complete' AND mp4_claimed_by = ?
            "#,
        )
        .bind(event_id)
        .bind(worker_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    // ========================================
    // AI worker primitives
    // ========================================

    /// Clear stale analysis claims (worker died mid-iteration).
    pub async fn recover_stale_analyses(&self, horizon_secs: u64) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE events
            SET ai_claimed_by = NULL,
                ai_claimed_at = NULL
            WHERE ai_processed = FALSE
              AND ai_claimed_by IS NOT NULL
              AND ai_claimed_at < NOW(6) - INTERVAL ? SECOND
            "#,
        )
        .bind(horizon_secs)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Atomically claim up to `batch` events awaiting analysis.
    pub async fn claim_for_analysis(&self, worker_id: &str, batch: u32) -> Result<Vec<Event>> {
        let mut claimed = Vec::new();

        while claimed.len() < batch as usize {
            let candidate: Option<(i32,)> = sqlx::query_as(
                r#"
                SELECT id FROM events
                WHERE ai_processed = FALSE
                  AND image_a_transferred = TRUE
                  AND image_b_transferred = TRUE
                  AND image_a_path IS NOT NULL
                  AND image_b_path IS NOT NULL
                  AND ai_claimed_by IS NULL
                ORDER BY timestamp DESC
                LIMIT 1
                "#,
            )
            .fetch_optional(&self.pool)
            .await?;

            let Some((candidate_id,)) = candidate else {
                break;
            };

            let won = sqlx::query(
                r#"
                UPDATE events
                SET ai_claimed_by = ?,
                    ai_claimed_at = NOW(6)
                WHERE id = ? AND ai_processed = FALSE AND ai_claimed_by IS NULL
                "#,
            )
            .bind(worker_id)
            .bind(candidate_id)
            .execute(&self.pool)
            .await?;

            if won.rows_affected() != 1 {
                break;
            }

            if let Some(event) = self.get(candidate_id).await? {
                claimed.push(event);
            }
        }

        Ok(claimed)
    }

    pub async fn release_analysis_claim(
        &self,
        event_id: i32,
        worker_id: &str,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE events
            SET ai_claimed_by = NULL,
                ai_claimed_at = NULL
            WHERE id = ? AND ai_processed = FALSE AND ai_claimed_by = ?
            "#,
        )
        .bind(event_id)
        .bind(worker_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Latch a successful analysis: all AI columns and the processed flag in
    /// one conditional write.
    pub async fn complete_analysis(
        &self,
        event_id: i32,
        worker_id: &str,
        outcome: &AiOutcome,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE events
            SET ai_processed = TRUE,
                ai_processed_at = NOW(6),
                ai_person_detected = ?,
                ai_confidence = ?,
                ai_objects = ?,
                ai_description = ?,
                ai_phrase = ?,
                ai_error = NULL,
                ai_claimed_by = NULL,
                ai_claimed_at = NULL
            WHERE id = ? AND ai_processed = FALSE AND ai_claimed_by = ?
            "#,
        )
        .bind(outcome.person_detected)
        .bind(outcome.confidence)
        .bind(outcome.objects.as_deref())
        .bind(outcome.description.as_deref())
        .bind(outcome.phrase.as_deref())
        .bind(event_id)
        .bind(worker_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Latch an exhausted analysis: processed with an error and no
    /// description, so the event is never reselected.
    pub async fn fail_analysis(
        &self,
        event_id: i32,
        worker_id: &str,
        error: &str,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE events
            SET ai_processed = TRUE,
                ai_processed_at = NOW(6),
                ai_error = ?,
                ai_claimed_by = NULL,
                ai_claimed_at = NULL
            WHERE id = ? AND ai_processed = FALSE AND ai_claimed_by = ?
            "#,
        )
        .bind(error)
        .bind(event_id)
        .bind(worker_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    // ========================================
    // Statistics
    // ========================================

    /// Per-camera counters over a trailing window: event count and per-slot
    /// transferred-file counts plus total transferred video seconds.
    pub async fn camera_window_counts(
        &self,
        camera_id: &str,
        since: DateTime<Utc>,
    ) -> Result<(i64, i64, i64, i64, i64, f64)> {
        let row: (i64, Option<i64>, Option<i64>, Option<i64>, Option<i64>, Option<f64>) =
            sqlx::query_as(
                r#"
                SELECT COUNT(*),
                       CAST(SUM(image_a_transferred) AS SIGNED),
                       CAST(SUM(image_b_transferred) AS SIGNED),
                       CAST(SUM(thumbnail_transferred) AS SIGNED),
                       CAST(SUM(video_transferred) AS SIGNED),
                       SUM(CASE WHEN video_transferred THEN COALESCE(video_duration, 0) ELSE 0 END)
                FROM events
                WHERE camera_id = ? AND timestamp >= ?
                "#,
            )
            .bind(camera_id)
            .bind(since)
            .fetch_one(&self.pool)
            .await?;

        Ok((
            row.0,
            row.1.unwrap_or(0),
            row.2.unwrap_or(0),
            row.3.unwrap_or(0),
            row.4.unwrap_or(0),
            row.5.unwrap_or(0.0),
        ))
    }

    pub async fn counts_by_status(&self) -> Result<Vec<(String, i64)>> {
        let rows = sqlx::query_as("SELECT status, COUNT(*) FROM events GROUP BY status")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn counts_by_mp4_status(&self) -> Result<Vec<(String, i64)>> {
        let rows = sqlx::query_as(
            "SELECT mp4_conversion_status, COUNT(*) FROM events GROUP BY mp4_conversion_status",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn counts_by_camera(&self) -> Result<Vec<(String, i64)>> {
        let rows = sqlx::query_as(
            "SELECT camera_id, COUNT(*) FROM events GROUP BY camera_id ORDER BY camera_id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Event counts per day, newest first, bounded.
    pub async fn counts_by_day(&self, days: u32) -> Result<Vec<(String, i64)>> {
        let rows = sqlx::query_as(
            r#"
            SELECT DATE_FORMAT(timestamp, '%Y-%m-%d') AS day, COUNT(*)
            FROM events
            GROUP BY day
            ORDER BY day DESC
            LIMIT ?
            "#,
        )
        .bind(days)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn ai_backlog(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM events
            WHERE ai_processed = FALSE
              AND image_a_transferred = TRUE
              AND image_b_transferred = TRUE
            "#,
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_sql_contains_only_requested_clauses() {
        let filter = EventFilter {
            camera_id: Some("camera_1".into()),
            status: Some(EventStatus::Processing),
            ..Default::default()
        };
        let mut qb = QueryBuilder::<MySql>::new("SELECT COUNT(*) FROM events WHERE 1=1");
        push_event_filters(&mut qb, &filter);
        let sql = qb.sql();
        assert!(sql.contains("camera_id ="));
        assert!(sql.contains("status ="));
        assert!(!sql.contains("timestamp >="));
        assert!(!sql.contains("mp4_conversion_status"));
        assert!(!sql.contains("ai_processed"));
    }

    #[test]
    fn test_filter_sql_with_time_range_and_flags() {
        let filter = EventFilter {
            start: Some(Utc::now()),
            end: Some(Utc::now()),
            mp4_status: Some(Mp4Status::Pending),
            ai_processed: Some(false),
            ..Default::default()
        };
        let mut qb = QueryBuilder::<MySql>::new("SELECT COUNT(*) FROM events WHERE 1=1");
        push_event_filters(&mut qb, &filter);
        let sql = qb.sql();
        assert!(sql.contains("timestamp >="));
        assert!(sql.contains("timestamp <="));
        assert!(sql.contains("mp4_conversion_status ="));
        assert!(sql.contains("ai_processed ="));
        assert!(!sql.contains("camera_id ="));
    }
}
