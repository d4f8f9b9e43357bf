//! Store - single source of truth
//!
//! Owns all database access. Repositories are cheap handles over the shared
//! pool; every mutation in the system goes through one of them. Claim
//! atomicity for the workers is enforced here with conditional updates, not
//! with in-process locks.

mod cameras;
mod events;
mod logs;

pub use cameras::CameraRepository;
pub use events::{AiOutcome, EventFilter, EventRepository};
pub use logs::{LogFilter, LogOrder, LogRepository, NewLogLine};

use sqlx::MySqlPool;

/// Store facade bundling the repositories.
#[derive(Clone)]
pub struct Store {
    pool: MySqlPool,
    cameras: CameraRepository,
    events: EventRepository,
    logs: LogRepository,
}

impl Store {
    pub fn new(pool: MySqlPool) -> Self {
        Self {
            cameras: CameraRepository::new(pool.clone()),
            events: EventRepository::new(pool.clone()),
            logs: LogRepository::new(pool.clone()),
            pool,
        }
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    pub fn cameras(&self) -> &CameraRepository {
        &self.cameras
    }

    pub fn events(&self) -> &EventRepository {
        &self.events
    }

    pub fn logs(&self) -> &LogRepository {
        &self.logs
    }
}
