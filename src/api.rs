//! HTTP API for the intake service

mod handlers;
mod types;

pub use handlers::create_router;

use crate::db::Database;
use crate::runtime::RuntimeManager;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub runtime: Arc<RuntimeManager>,
    /// Direct access for profiles, trends and patient history
    pub db: Database,
}

impl AppState {
    pub fn new(runtime: Arc<RuntimeManager>, db: Database) -> Self {
        Self { runtime, db }
    }
}
