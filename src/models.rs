//! Persistence models
//!
//! Row types owned by the store, plus the status enums and their transition
//! rules. Transport shapes live in `web_api::schemas` and are never reused
//! here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reserved log source for the coordinator and its workers; every other
/// source is a camera stable id.
pub const CENTRAL_SOURCE: &str = "central";

/// Coarse camera status (advisory only)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum CameraStatus {
    Online,
    Offline,
    Error,
}

impl CameraStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CameraStatus::Online => "online",
            CameraStatus::Offline => "offline",
            CameraStatus::Error => "error",
        }
    }
}

/// Camera-owned event processing status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum EventStatus {
    Processing,
    Complete,
    Interrupted,
    Failed,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Processing => "processing",
            EventStatus::Complete => "complete",
            EventStatus::Interrupted => "interrupted",
            EventStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "processing" => Some(EventStatus::Processing),
            "complete" => Some(EventStatus::Complete),
            "interrupted" => Some(EventStatus::Interrupted),
            "failed" => Some(EventStatus::Failed),
            _ => None,
        }
    }

    /// Terminal states are write-once; nothing transitions out of them.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, EventStatus::Processing)
    }

    /// Only the camera moves an event out of `processing`, and only into a
    /// terminal state.
    pub fn can_transition_to(&self, target: EventStatus) -> bool {
        matches!(self, EventStatus::Processing) && target.is_terminal()
    }
}

/// Worker-owned MP4 conversion sub-state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Mp4Status {
    Pending,
    Processing,
    Complete,
    Optimized,
    Failed,
}

impl Mp4Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mp4Status::Pending => "pending",
            Mp4Status::Processing => "processing",
            Mp4Status::Complete => "complete",
            Mp4Status::Optimized => "optimized",
            Mp4Status::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Mp4Status::Pending),
            "processing" => Some(Mp4Status::Processing),
            "complete" => Some(Mp4Status::Complete),
            "optimized" => Some(Mp4Status::Optimized),
            "failed" => Some(Mp4Status::Failed),
            _ => None,
        }
    }

    /// Forward edges only: pending → processing → complete → optimized,
    /// with failed reachable from the non-terminal states.
    pub fn can_transition_to(&self, target: Mp4Status) -> bool {
        matches!(
            (self, target),
            (Mp4Status::Pending, Mp4Status::Processing)
                | (Mp4Status::Pending, Mp4Status::Failed)
                | (Mp4Status::Processing, Mp4Status::Complete)
                | (Mp4Status::Processing, Mp4Status::Failed)
                | (Mp4Status::Complete, Mp4Status::Optimized)
                | (Mp4Status::Complete, Mp4Status::Failed)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Mp4Status::Optimized | Mp4Status::Failed)
    }
}

/// Log severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "INFO" => Some(LogLevel::Info),
            "WARNING" => Some(LogLevel::Warning),
            "ERROR" => Some(LogLevel::Error),
            _ => None,
        }
    }
}

/// The artifact slots an event can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    ImageA,
    ImageB,
    Thumbnail,
    VideoH264,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::ImageA => "image_a",
            ArtifactKind::ImageB => "image_b",
            ArtifactKind::Thumbnail => "thumbnail",
            ArtifactKind::VideoH264 => "video_h264",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "image_a" => Some(ArtifactKind::ImageA),
            "image_b" => Some(ArtifactKind::ImageB),
            "thumbnail" => Some(ArtifactKind::Thumbnail),
            "video_h264" => Some(ArtifactKind::VideoH264),
            _ => None,
        }
    }
}

/// Camera row
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Camera {
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

/// Event row
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Event {
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
    pub mp4_claimed_by: Option<String>,
    pub mp4_claimed_at: Option<DateTime<Utc>>,

    pub ai_processed: bool,
    pub ai_processed_at: Option<DateTime<Utc>>,
    pub ai_claimed_by: Option<String>,
    pub ai_claimed_at: Option<DateTime<Utc>>,
    pub ai_person_detected: Option<bool>,
    pub ai_confidence: Option<f64>,
    pub ai_objects: Option<String>,
    pub ai_description: Option<String>,
    pub ai_phrase: Option<String>,
    pub ai_error: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    /// Current path stored for an artifact slot.
    pub fn artifact_path(&self, kind: ArtifactKind) -> Option<&str> {
        match kind {
            ArtifactKind::ImageA => self.image_a_path.as_deref(),
            ArtifactKind::ImageB => self.image_b_path.as_deref(),
            ArtifactKind::Thumbnail => self.thumbnail_path.as_deref(),
            ArtifactKind::VideoH264 => self.video_h264_path.as_deref(),
        }
    }
}

/// Log row
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LogLine {
    pub id: i64,
    pub source: String,
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_status_terminal_is_sticky() {
        for terminal in [
            EventStatus::Complete,
            EventStatus::Interrupted,
            EventStatus::Failed,
        ] {
            assert!(terminal.is_terminal());
            for target in [
                EventStatus::Processing,
                EventStatus::Complete,
                EventStatus::Interrupted,
                EventStatus::Failed,
            ] {
                assert!(!terminal.can_transition_to(target));
            }
        }
    }

    #[test]
    fn test_event_status_processing_reaches_only_terminals() {
        let s = EventStatus::Processing;
        assert!(s.can_transition_to(EventStatus::Complete));
        assert!(s.can_transition_to(EventStatus::Interrupted));
        assert!(s.can_transition_to(EventStatus::Failed));
        assert!(!s.can_transition_to(EventStatus::Processing));
    }

    #[test]
    fn test_mp4_status_dag_has_no_backward_edges() {
        use Mp4Status::*;
        let all = [Pending, Processing, Complete, Optimized, Failed];
        let forward = [
            (Pending, Processing),
            (Pending, Failed),
            (Processing, Complete),
            (Processing, Failed),
            (Complete, Optimized),
            (Complete, Failed),
        ];
        for from in all {
            for to in all {
                let legal = forward.contains(&(from, to));
                assert_eq!(
                    from.can_transition_to(to),
                    legal,
                    "{:?} -> {:?}",
                    from,
                    to
                );
            }
        }
    }

    #[test]
    fn test_mp4_terminals() {
        assert!(Mp4Status::Optimized.is_terminal());
        assert!(Mp4Status::Failed.is_terminal());
        assert!(!Mp4Status::Complete.is_terminal());
    }

    #[test]
    fn test_log_level_parse_is_case_sensitive() {
        assert_eq!(LogLevel::parse("INFO"), Some(LogLevel::Info));
        assert_eq!(LogLevel::parse("info"), None);
        assert_eq!(LogLevel::parse("FATAL"), None);
    }

    #[test]
    fn test_artifact_kind_names_are_exact() {
        assert_eq!(
            ArtifactKind::parse("video_h264"),
            Some(ArtifactKind::VideoH264)
        );
        assert_eq!(ArtifactKind::parse("video"), None);
        assert_eq!(ArtifactKind::parse("video_mp4"), None);
        assert_eq!(ArtifactKind::parse("Image_A"), None);
    }
}
