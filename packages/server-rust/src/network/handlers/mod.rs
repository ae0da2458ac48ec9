//! HTTP handler definitions.
//!
//! `AppState` is the shared state carried through axum extractors; handlers
//! are re-exported for building the router.

pub mod health;
pub mod schemas;

pub use health::{health_handler, liveness_handler};
pub use schemas::{filter_handler, list_handler, validate_handler};

use std::sync::Arc;
use std::time::Instant;

use super::NetworkConfig;
use crate::service::MappingService;

/// Shared application state. Cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    /// Named schemas, mapper and message catalog.
    pub mapping: Arc<MappingService>,
    pub config: Arc<NetworkConfig>,
    /// Server start time, used for uptime.
    pub start_time: Instant,
}
