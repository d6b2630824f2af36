//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use class_schedule_core::ports::DatabaseService;
use class_schedule_core::Scheduler;
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub config: Arc<Config>,
    /// Owns the per-classroom locks, so there must be exactly one per process.
    pub scheduler: Arc<Scheduler>,
}

impl AppState {
    pub fn new(db: Arc<dyn DatabaseService>, config: Arc<Config>) -> Self {
        let scheduler = Arc::new(Scheduler::new(db.clone()));
        Self {
            db,
            config,
            scheduler,
        }
    }
}
