//! CamHub - central coordination server for multi-camera security
//! deployments
//!
//! ## Architecture
//!
//! 1. Store - relational persistence (cameras, events, logs) and the
//!    transactional claim primitives
//! 2. ArtifactStore - shared-storage path conventions and quiescence checks
//! 3. WebAPI - validated REST endpoints under `/api/v1`
//! 4. Workers - conversion, optimization, and AI analysis loops that
//!    coordinate only through the store
//! 5. AiClient - vision/text model host adapter
//! 6. Media - ffmpeg/ffprobe transcoding front-end
//!
//! ## Design principles
//!
//! - The store is the only shared mutable state; all claims are conditional
//!   row updates, never in-process locks
//! - Validation happens before any store access; persistence rows and
//!   transport shapes are separate types
//! - Event status is camera-owned and terminal-once; the MP4 and AI
//!   sub-states are worker-owned and move forward only

pub mod ai_client;
pub mod artifact_store;
pub mod config;
pub mod db;
pub mod error;
pub mod media;
pub mod models;
pub mod state;
pub mod store;
pub mod web_api;
pub mod workers;

pub use error::{Error, Result};
pub use state::AppState;
