//! Application state
//!
//! Shared state for the API handlers: the store handle and the immutable
//! configuration record. Workers run in their own processes and build their
//! own context from the same configuration.

use crate::config::AppConfig;
use crate::store::Store;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Store facade over the database pool
    pub store: Store,
    /// Application config
    pub config: AppConfig,
}

impl AppState {
    pub fn new(store: Store, config: AppConfig) -> Self {
        Self { store, config }
    }
}
