//! Background workers
//!
//! Three independent processes that coordinate only through the store:
//! conversion (H.264 → MP4), optimization (MP4 re-encode), and AI analysis.
//! Each runs the same skeleton: recover stale claims, claim a batch with a
//! conditional update, guard the artifacts, do the work under a timeout,
//! commit conditionally on still holding the claim, and back off while idle.

pub mod analyze;
pub mod convert;
pub mod optimize;

use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;

use crate::artifact_store::ArtifactStore;
use crate::config::WorkerConfig;
use crate::models::{LogLevel, CENTRAL_SOURCE};
use crate::store::{NewLogLine, Store};

/// How often a running worker re-checks for stale claims.
pub const STALE_CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// Idle backoff ceiling as a multiple of the configured floor.
const BACKOFF_CEILING_FACTOR: u32 = 16;

/// Claimant identifier for this process: `{host}:{pid}`.
pub fn instance_id() -> String {
    let host = std::env::var("HOSTNAME")
        .ok()
        .filter(|h| !h.is_empty())
        .or_else(|| {
            std::fs::read_to_string("/etc/hostname")
                .ok()
                .map(|h| h.trim().to_string())
                .filter(|h| !h.is_empty())
        })
        .unwrap_or_else(|| "localhost".to_string());
    format!("{}:{}", host, std::process::id())
}

/// Exponential idle backoff: doubles on every empty poll, resets when work
/// was claimed.
#[derive(Debug, Clone)]
pub struct Backoff {
    floor: Duration,
    ceiling: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(floor: Duration) -> Self {
        let floor = floor.max(Duration::from_millis(100));
        Self {
            floor,
            ceiling: floor * BACKOFF_CEILING_FACTOR,
            current: floor,
        }
    }

    pub fn reset(&mut self) {
        self.current = self.floor;
    }

    /// Current delay, advancing the internal state for the next idle poll.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.ceiling);
        delay
    }
}

/// Everything a worker needs, handed in at startup.
#[derive(Clone)]
pub struct WorkerContext {
    pub store: Store,
    pub artifacts: ArtifactStore,
    pub config: WorkerConfig,
    pub worker_id: String,
}

impl WorkerContext {
    pub fn new(store: Store, artifacts: ArtifactStore, config: WorkerConfig) -> Self {
        Self {
            store,
            artifacts,
            config,
            worker_id: instance_id(),
        }
    }

    /// Record a worker outcome in the central log pipeline. Failures here
    /// must never take the worker down.
    pub async fn log(&self, level: LogLevel, message: String) {
        let line = NewLogLine {
            source: CENTRAL_SOURCE.to_string(),
            timestamp: Utc::now(),
            level,
            message,
        };
        if let Err(e) = self.store.logs().insert_batch(&[line]).await {
            tracing::warn!(error = %e, "Failed to record worker log line");
        }
    }

    pub fn reclaim_horizon_secs(&self) -> u64 {
        self.config.reclaim_horizon.as_secs()
    }
}

/// Sleep that wakes early on shutdown. Returns false when shutdown was
/// requested.
pub async fn idle_sleep(shutdown: &mut watch::Receiver<bool>, delay: Duration) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(delay) => true,
        _ = shutdown.changed() => false,
    }
}

/// True once shutdown has been signalled.
pub fn shutdown_requested(shutdown: &watch::Receiver<bool>) -> bool {
    *shutdown.borrow()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_to_ceiling() {
        let mut backoff = Backoff::new(Duration::from_millis(500));
        assert_eq!(backoff.next_delay(), Duration::from_millis(500));
        assert_eq!(backoff.next_delay(), Duration::from_millis(1000));
        assert_eq!(backoff.next_delay(), Duration::from_millis(2000));
        for _ in 0..10 {
            backoff.next_delay();
        }
        assert_eq!(backoff.next_delay(), Duration::from_millis(8000));
    }

    #[test]
    fn test_backoff_resets_to_floor() {
        let mut backoff = Backoff::new(Duration::from_millis(500));
        backoff.next_delay();
        backoff.next_delay();
        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_millis(500));
    }

    #[test]
    fn test_backoff_enforces_minimum_floor() {
        let mut backoff = Backoff::new(Duration::ZERO);
        assert!(backoff.next_delay() >= Duration::from_millis(100));
    }

    #[test]
    fn test_instance_id_shape() {
        let id = instance_id();
        let (host, pid) = id.rsplit_once(':').expect("host:pid");
        assert!(!host.is_empty());
        assert!(pid.parse::<u32>().is_ok());
    }
}
