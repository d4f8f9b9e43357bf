//! Transport shapes and request validation
//!
//! Every inbound payload is validated here before any store access, and
//! every response body is built from these types rather than the persistence
//! rows. Validation is pure: no I/O, no side effects.

use chrono::{DateTime, Datelike, Duration as ChronoDuration, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::artifact_store::validate_relative_path;
use crate::error::{Error, Result};
use crate::models::{
    ArtifactKind, Camera, CameraStatus, Event, EventStatus, LogLevel, LogLine, Mp4Status,
    CENTRAL_SOURCE,
};
use crate::store::{EventFilter, LogFilter, LogOrder, NewLogLine};

/// Hard cap on an event listing page.
pub const EVENT_PAGE_CAP: i64 = 200;
/// Hard cap on a log listing page.
pub const LOG_PAGE_CAP: i64 = 500;
/// Default page sizes when the caller does not specify a limit.
pub const EVENT_PAGE_DEFAULT: i64 = 50;
pub const LOG_PAGE_DEFAULT: i64 = 100;

/// Camera ids are `[A-Za-z0-9_]+`, at most 50 chars.
pub fn validate_camera_id(camera_id: &str) -> std::result::Result<(), &'static str> {
    if camera_id.is_empty() {
        return Err("camera_id must not be empty");
    }
    if camera_id.len() > 50 {
        return Err("camera_id must be at most 50 characters");
    }
    if !camera_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err("camera_id must contain only alphanumeric characters and underscores");
    }
    Ok(())
}

/// Log sources are a camera id or the reserved `central` literal.
pub fn validate_source(source: &str) -> std::result::Result<(), &'static str> {
    if source == CENTRAL_SOURCE {
        return Ok(());
    }
    validate_camera_id(source).map_err(|_| {
        "source must be a camera id ([A-Za-z0-9_]+) or the literal 'central'"
    })
}

/// Clamp a requested page limit: negatives are rejected, anything above the
/// cap is clamped down.
pub fn clamp_limit(
    requested: Option<i64>,
    default: i64,
    cap: i64,
) -> std::result::Result<i64, &'static str> {
    let limit = requested.unwrap_or(default);
    if limit < 0 {
        return Err("limit must be non-negative");
    }
    Ok(limit.min(cap))
}

pub fn validate_offset(offset: Option<i64>) -> std::result::Result<i64, &'static str> {
    let offset = offset.unwrap_or(0);
    if offset < 0 {
        return Err("offset must be non-negative");
    }
    Ok(offset)
}

// ============================================================================
// Camera schemas
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct RegisterCameraRequest {
    pub camera_id: String,
    pub name: String,
    pub location: String,
    pub ip_address: String,
}

impl RegisterCameraRequest {
    pub fn validate(&self) -> Result<()> {
        validate_camera_id(&self.camera_id).map_err(|r| Error::validation("camera_id", r))?;
        if self.name.is_empty() || self.name.len() > 100 {
            return Err(Error::validation("name", "name must be 1-100 characters"));
        }
        if self.location.is_empty() || self.location.len() > 200 {
            return Err(Error::validation(
                "location",
                "location must be 1-200 characters",
            ));
        }
        if self.ip_address.is_empty() || self.ip_address.len() > 45 {
            return Err(Error::validation(
                "ip_address",
                "ip_address must be 1-45 characters",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct CameraResponse {
    pub id: i32,
    pub camera_id: String,
    pub name: String,
    pub location: String,
    pub ip_address: String,
    pub status: CameraStatus,
    pub last_seen: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Camera> for CameraResponse {
    fn from(c: Camera) -> Self {
        Self {
            id: c.id,
            camera_id: c.camera_id,
            name: c.name,
            location: c.location,
            ip_address: c.ip_address,
            status: c.status,
            last_seen: c.last_seen,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

// ============================================================================
// Event schemas
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateEventRequest {
    pub camera_id: String,
    pub timestamp: DateTime<Utc>,
    pub motion_score: f64,
    pub confidence_score: Option<f64>,
}

impl CreateEventRequest {
    pub fn validate(&self) -> Result<()> {
        validate_camera_id(&self.camera_id).map_err(|r| Error::validation("camera_id", r))?;
        if !self.motion_score.is_finite() || self.motion_score < 0.0 {
            return Err(Error::validation(
                "motion_score",
                "motion_score must be a non-negative number",
            ));
        }
        if let Some(confidence) = self.confidence_score {
            if !confidence.is_finite() || !(0.0..=100.0).contains(&confidence) {
                return Err(Error::validation(
                    "confidence_score",
                    "confidence_score must be between 0 and 100",
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct FileUpdateRequest {
    pub file_type: String,
    pub file_path: String,
    pub video_duration: Option<f64>,
}

impl FileUpdateRequest {
    /// Validate and resolve the artifact slot.
    pub fn validate(&self) -> Result<ArtifactKind> {
        let kind = ArtifactKind::parse(&self.file_type).ok_or_else(|| {
            Error::validation(
                "file_type",
                "file_type must be one of: image_a, image_b, thumbnail, video_h264",
            )
        })?;
        if self.file_path.len() > 500 {
            return Err(Error::validation(
                "file_path",
                "file_path must be at most 500 characters",
            ));
        }
        validate_relative_path(&self.file_path)
            .map_err(|r| Error::validation("file_path", r))?;
        if let Some(duration) = self.video_duration {
            if kind != ArtifactKind::VideoH264 {
                return Err(Error::validation(
                    "video_duration",
                    "video_duration is only valid for file_type video_h264",
                ));
            }
            if !duration.is_finite() || duration <= 0.0 {
                return Err(Error::validation(
                    "video_duration",
                    "video_duration must be a positive number of seconds",
                ));
            }
        }
        Ok(kind)
    }
}

#[derive(Debug, Deserialize)]
pub struct EventStatusUpdateRequest {
    pub status: String,
}

impl EventStatusUpdateRequest {
    /// Only terminal targets are legal; `processing` is not a valid target.
    pub fn validate(&self) -> Result<EventStatus> {
        let status = EventStatus::parse(&self.status).ok_or_else(|| {
            Error::validation(
                "status",
                "status must be one of: complete, interrupted, failed",
            )
        })?;
        if !status.is_terminal() {
            return Err(Error::validation(
                "status",
                "status must be one of: complete, interrupted, failed",
            ));
        }
        Ok(status)
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct EventListQuery {
    pub camera_id: Option<String>,
    /// `today`, `yesterday`, or `YYYY-MM-DD` (UTC day).
    pub date: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub status: Option<String>,
    pub mp4_status: Option<String>,
    pub ai_processed: Option<bool>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl EventListQuery {
    pub fn validate(&self) -> Result<(EventFilter, i64, i64)> {
        let limit = clamp_limit(self.limit, EVENT_PAGE_DEFAULT, EVENT_PAGE_CAP)
            .map_err(|r| Error::validation("limit", r))?;
        let offset = validate_offset(self.offset).map_err(|r| Error::validation("offset", r))?;

        if let Some(ref camera_id) = self.camera_id {
            validate_camera_id(camera_id).map_err(|r| Error::validation("camera_id", r))?;
        }

        let status = match self.status.as_deref() {
            Some(s) => Some(EventStatus::parse(s).ok_or_else(|| {
                Error::validation(
                    "status",
                    "status must be one of: processing, complete, interrupted, failed",
                )
            })?),
            None => None,
        };
        let mp4_status = match self.mp4_status.as_deref() {
            Some(s) => Some(Mp4Status::parse(s).ok_or_else(|| {
                Error::validation(
                    "mp4_status",
                    "mp4_status must be one of: pending, processing, complete, optimized, failed",
                )
            })?),
            None => None,
        };

        let (mut start, mut end) = (self.start, self.end);
        if let Some(ref date) = self.date {
            if start.is_some() || end.is_some() {
                return Err(Error::validation(
                    "date",
                    "date cannot be combined with start/end",
                ));
            }
            let (day_start, day_end) = parse_date_window(date)
                .ok_or_else(|| {
                    Error::validation("date", "date must be 'today', 'yesterday', or YYYY-MM-DD")
                })?;
            start = Some(day_start);
            end = Some(day_end);
        }
        if let (Some(s), Some(e)) = (start, end) {
            if s > e {
                return Err(Error::validation("start", "start must not be after end"));
            }
        }

        Ok((
            EventFilter {
                camera_id: self.camera_id.clone(),
                start,
                end,
                status,
                mp4_status,
                ai_processed: self.ai_processed,
            },
            limit,
            offset,
        ))
    }
}

/// Resolve a date keyword or `YYYY-MM-DD` into an inclusive UTC day window.
fn parse_date_window(date: &str) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let today = Utc::now().date_naive();
    let day = match date {
        "today" => today,
        "yesterday" => today.pred_opt()?,
        other => NaiveDate::parse_from_str(other, "%Y-%m-%d").ok()?,
    };
    let start = Utc.with_ymd_and_hms(day.year(), day.month(), day.day(), 0, 0, 0).single()?;
    let end = start + ChronoDuration::days(1) - ChronoDuration::seconds(1);
    Some((start, end))
}

#[derive(Debug, Serialize)]
pub struct EventResponse {
    pub id: i32,
    pub camera_id: String,
    pub timestamp: DateTime<Utc>,
    pub motion_score: f64,
    pub confidence_score: Option<f64>,
    pub status: EventStatus,

    pub image_a_path: Option<String>,
    pub image_b_path: Option<String>,
    pub thumbnail_path: Option<String>,
    pub video_h264_path: Option<String>,
    pub video_mp4_path: Option<String>,
    pub video_duration: Option<f64>,

    pub image_a_transferred: bool,
    pub image_b_transferred: bool,
    pub thumbnail_transferred: bool,
    pub video_transferred: bool,

    pub mp4_conversion_status: Mp4Status,
    pub mp4_converted_at: Option<DateTime<Utc>>,

    pub ai_processed: bool,
    pub ai_processed_at: Option<DateTime<Utc>>,
    pub ai_person_detected: Option<bool>,
    pub ai_confidence: Option<f64>,
    pub ai_objects: Option<String>,
    pub ai_description: Option<String>,
    pub ai_phrase: Option<String>,
    pub ai_error: Option<String>,

    pub created_at: DateTime<Utc>,
}

impl From<Event> for EventResponse {
    fn from(e: Event) -> Self {
        Self {
            id: e.id,
            camera_id: e.camera_id,
            timestamp: e.timestamp,
            motion_score: e.motion_score,
            confidence_score: e.confidence_score,
            status: e.status,
            image_a_path: e.image_a_path,
            image_b_path: e.image_b_path,
            thumbnail_path: e.thumbnail_path,
            video_h264_path: e.video_h264_path,
            video_mp4_path: e.video_mp4_path,
            video_duration: e.video_duration,
            image_a_transferred: e.image_a_transferred,
            image_b_transferred: e.image_b_transferred,
            thumbnail_transferred: e.thumbnail_transferred,
            video_transferred: e.video_transferred,
            mp4_conversion_status: e.mp4_conversion_status,
            mp4_converted_at: e.mp4_converted_at,
            ai_processed: e.ai_processed,
            ai_processed_at: e.ai_processed_at,
            ai_person_detected: e.ai_person_detected,
            ai_confidence: e.ai_confidence,
            ai_objects: e.ai_objects,
            ai_description: e.ai_description,
            ai_phrase: e.ai_phrase,
            ai_error: e.ai_error,
            created_at: e.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EventListResponse {
    pub events: Vec<EventResponse>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Deserialize, Default)]
pub struct NeighborsQuery {
    pub camera_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct NeighborsResponse {
    pub previous_id: Option<i32>,
    pub next_id: Option<i32>,
}

// ============================================================================
// Log schemas
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct LogEntry {
    pub source: String,
    pub timestamp: DateTime<Utc>,
    pub level: String,
    pub message: String,
}

impl LogEntry {
    pub fn validate(&self) -> Result<NewLogLine> {
        validate_source(&self.source).map_err(|r| Error::validation("source", r))?;
        let level = LogLevel::parse(&self.level).ok_or_else(|| {
            Error::validation("level", "level must be one of: INFO, WARNING, ERROR")
        })?;
        if self.message.is_empty() {
            return Err(Error::validation("message", "message must not be empty"));
        }
        Ok(NewLogLine {
            source: self.source.clone(),
            timestamp: self.timestamp,
            level,
            message: self.message.clone(),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct LogIngestResponse {
    pub accepted: usize,
    pub first_id: i64,
    pub last_id: i64,
}

#[derive(Debug, Deserialize, Default)]
pub struct LogListQuery {
    /// Exact source, or `all`.
    pub source: Option<String>,
    /// Comma-separated subset of INFO,WARNING,ERROR.
    pub levels: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    /// `newest` (default) or `oldest`.
    pub order: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl LogListQuery {
    pub fn validate(&self) -> Result<(LogFilter, LogOrder, i64, i64)> {
        let limit = clamp_limit(self.limit, LOG_PAGE_DEFAULT, LOG_PAGE_CAP)
            .map_err(|r| Error::validation("limit", r))?;
        let offset = validate_offset(self.offset).map_err(|r| Error::validation("offset", r))?;

        let order = match self.order.as_deref() {
            None | Some("newest") => LogOrder::NewestFirst,
            Some("oldest") => LogOrder::OldestFirst,
            Some(_) => {
                return Err(Error::validation("order", "order must be 'newest' or 'oldest'"))
            }
        };

        if let (Some(s), Some(e)) = (self.start, self.end) {
            if s > e {
                return Err(Error::validation("start", "start must not be after end"));
            }
        }

        Ok((
            LogFilter {
                source: parse_source_filter(self.source.as_deref())?,
                levels: parse_level_set(self.levels.as_deref())?,
                start: self.start,
                end: self.end,
            },
            order,
            limit,
            offset,
        ))
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct LogSinceQuery {
    pub source: Option<String>,
    pub levels: Option<String>,
    pub limit: Option<i64>,
}

impl LogSinceQuery {
    pub fn validate(&self) -> Result<(LogFilter, i64)> {
        let limit = clamp_limit(self.limit, LOG_PAGE_DEFAULT, LOG_PAGE_CAP)
            .map_err(|r| Error::validation("limit", r))?;
        Ok((
            LogFilter {
                source: parse_source_filter(self.source.as_deref())?,
                levels: parse_level_set(self.levels.as_deref())?,
                start: None,
                end: None,
            },
            limit,
        ))
    }
}

fn parse_source_filter(source: Option<&str>) -> Result<Option<String>> {
    match source {
        None | Some("all") => Ok(None),
        Some(s) => {
            validate_source(s).map_err(|r| Error::validation("source", r))?;
            Ok(Some(s.to_string()))
        }
    }
}

fn parse_level_set(levels: Option<&str>) -> Result<Option<Vec<LogLevel>>> {
    let Some(raw) = levels else {
        return Ok(None);
    };
    let mut parsed = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let level = LogLevel::parse(part).ok_or_else(|| {
            Error::validation("levels", "levels must be a comma-separated subset of INFO, WARNING, ERROR")
        })?;
        if !parsed.contains(&level) {
            parsed.push(level);
        }
    }
    Ok(Some(parsed))
}

#[derive(Debug, Serialize)]
pub struct LogResponse {
    pub id: i64,
    pub source: String,
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

impl From<LogLine> for LogResponse {
    fn from(l: LogLine) -> Self {
        Self {
            id: l.id,
            source: l.source,
            timestamp: l.timestamp,
            level: l.level,
            message: l.message,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LogListResponse {
    pub logs: Vec<LogResponse>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

// ============================================================================
// Health & stats schemas
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub database_connected: bool,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}

#[derive(Debug, Deserialize, Default)]
pub struct CameraStatsQuery {
    pub hours: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct CameraStatsResponse {
    pub events: i64,
    pub files: i64,
    pub bytes: i64,
    pub period_hours: i64,
}

#[derive(Debug, Serialize)]
pub struct OverviewResponse {
    pub events_by_status: Vec<CountEntry>,
    pub events_by_mp4_status: Vec<CountEntry>,
    pub events_by_camera: Vec<CountEntry>,
    pub events_by_day: Vec<CountEntry>,
    pub ai_backlog: i64,
}

#[derive(Debug, Serialize)]
pub struct CountEntry {
    pub key: String,
    pub count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camera_id_pattern() {
        assert!(validate_camera_id("camera_1").is_ok());
        assert!(validate_camera_id("Cam42").is_ok());
        assert!(validate_camera_id("").is_err());
        assert!(validate_camera_id("camera-1").is_err());
        assert!(validate_camera_id("camera 1").is_err());
        assert!(validate_camera_id(&"x".repeat(51)).is_err());
    }

    #[test]
    fn test_source_accepts_central() {
        assert!(validate_source("central").is_ok());
        assert!(validate_source("camera_1").is_ok());
        assert!(validate_source("front-door").is_err());
    }

    #[test]
    fn test_limit_clamping() {
        assert_eq!(clamp_limit(None, 50, 200), Ok(50));
        assert_eq!(clamp_limit(Some(0), 50, 200), Ok(0));
        assert_eq!(clamp_limit(Some(1), 50, 200), Ok(1));
        assert_eq!(clamp_limit(Some(200), 50, 200), Ok(200));
        assert_eq!(clamp_limit(Some(9999), 50, 200), Ok(200));
        assert!(clamp_limit(Some(-1), 50, 200).is_err());
    }

    fn event_request(motion_score: f64, confidence_score: Option<f64>) -> CreateEventRequest {
        CreateEventRequest {
            camera_id: "camera_1".into(),
            timestamp: Utc::now(),
            motion_score,
            confidence_score,
        }
    }

    #[test]
    fn test_motion_score_bounds() {
        assert!(event_request(0.0, None).validate().is_ok());
        assert!(event_request(187.5, None).validate().is_ok());
        assert!(event_request(-1.0, None).validate().is_err());
        assert!(event_request(f64::NAN, None).validate().is_err());
    }

    #[test]
    fn test_confidence_score_range() {
        assert!(event_request(10.0, Some(0.0)).validate().is_ok());
        assert!(event_request(10.0, Some(100.0)).validate().is_ok());
        assert!(event_request(10.0, Some(100.1)).validate().is_err());
        assert!(event_request(10.0, Some(-0.1)).validate().is_err());
    }

    #[test]
    fn test_file_update_rejects_traversal_and_absolute() {
        let req = |path: &str| FileUpdateRequest {
            file_type: "image_a".into(),
            file_path: path.into(),
            video_duration: None,
        };
        assert!(req("camera_1/pictures/1_20251126_143022_a.jpg").validate().is_ok());
        assert!(req("/etc/passwd").validate().is_err());
        assert!(req("camera_1/../secrets.jpg").validate().is_err());
    }

    #[test]
    fn test_file_update_duration_only_for_video() {
        let image_with_duration = FileUpdateRequest {
            file_type: "image_a".into(),
            file_path: "camera_1/pictures/1_a.jpg".into(),
            video_duration: Some(30.0),
        };
        assert!(image_with_duration.validate().is_err());

        let video = FileUpdateRequest {
            file_type: "video_h264".into(),
            file_path: "camera_1/videos/1_video.h264".into(),
            video_duration: Some(61.2),
        };
        assert_eq!(video.validate().unwrap(), ArtifactKind::VideoH264);
    }

    #[test]
    fn test_status_update_targets() {
        for target in ["complete", "interrupted", "failed"] {
            let req = EventStatusUpdateRequest {
                status: target.into(),
            };
            assert!(req.validate().is_ok(), "{}", target);
        }
        for target in ["processing", "done", ""] {
            let req = EventStatusUpdateRequest {
                status: target.into(),
            };
            assert!(req.validate().is_err(), "{}", target);
        }
    }

    #[test]
    fn test_event_list_query_parses_filters() {
        let query = EventListQuery {
            camera_id: Some("camera_1".into()),
            status: Some("processing".into()),
            mp4_status: Some("pending".into()),
            ai_processed: Some(false),
            ..Default::default()
        };
        let (filter, limit, offset) = query.validate().unwrap();
        assert_eq!(filter.camera_id.as_deref(), Some("camera_1"));
        assert_eq!(filter.status, Some(EventStatus::Processing));
        assert_eq!(filter.mp4_status, Some(Mp4Status::Pending));
        assert_eq!(filter.ai_processed, Some(false));
        assert_eq!(limit, EVENT_PAGE_DEFAULT);
        assert_eq!(offset, 0);
    }

    #[test]
    fn test_event_list_query_date_window() {
        let query = EventListQuery {
            date: Some("2025-11-26".into()),
            ..Default::default()
        };
        let (filter, _, _) = query.validate().unwrap();
        let start = filter.start.unwrap();
        let end = filter.end.unwrap();
        assert_eq!(start.to_rfc3339(), "2025-11-26T00:00:00+00:00");
        assert_eq!(end.to_rfc3339(), "2025-11-26T23:59:59+00:00");
    }

    #[test]
    fn test_event_list_query_date_conflicts_with_range() {
        let query = EventListQuery {
            date: Some("today".into()),
            start: Some(Utc::now()),
            ..Default::default()
        };
        assert!(query.validate().is_err());
    }

    #[test]
    fn test_log_entry_validation() {
        let entry = LogEntry {
            source: "camera_1".into(),
            timestamp: Utc::now(),
            level: "INFO".into(),
            message: "Motion detected".into(),
        };
        assert!(entry.validate().is_ok());

        let bad_level = LogEntry {
            source: "camera_1".into(),
            timestamp: Utc::now(),
            level: "TRACE".into(),
            message: "x".into(),
        };
        assert!(bad_level.validate().is_err());

        let bad_source = LogEntry {
            source: "nope nope".into(),
            timestamp: Utc::now(),
            level: "INFO".into(),
            message: "x".into(),
        };
        assert!(bad_source.validate().is_err());
    }

    #[test]
    fn test_level_set_parsing() {
        let levels = parse_level_set(Some("INFO,ERROR")).unwrap().unwrap();
        assert_eq!(levels, vec![LogLevel::Info, LogLevel::Error]);
        assert!(parse_level_set(Some("INFO,VERBOSE")).is_err());
        assert!(parse_level_set(None).unwrap().is_none());
    }

    #[test]
    fn test_log_query_order() {
        let newest = LogListQuery::default().validate().unwrap().1;
        assert_eq!(newest, LogOrder::NewestFirst);

        let oldest = LogListQuery {
            order: Some("oldest".into()),
            ..Default::default()
        };
        assert_eq!(oldest.validate().unwrap().1, LogOrder::OldestFirst);

        let bad = LogListQuery {
            order: Some("sideways".into()),
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }
}
