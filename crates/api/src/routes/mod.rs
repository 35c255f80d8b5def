pub mod health;
pub mod relaxations;

use axum::Router;

use crate::state::AppState;

/// Routes mounted under `/api/v1`.
///
/// ```text
/// /relaxations    relaxation jobs
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/relaxations", relaxations::router())
}
