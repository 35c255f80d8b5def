use std::sync::Arc;

use relax_engine::RelaxationService;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheap to clone: everything sits behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Job orchestration: creation, lookup, worker pool.
    pub service: Arc<RelaxationService>,
    pub config: Arc<ServerConfig>,
}
