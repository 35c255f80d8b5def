//! Route definitions for the `/relaxations` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::relaxations;
use crate::state::AppState;

/// Routes mounted at `/relaxations`.
///
/// ```text
/// POST   /                            -> create_relaxation
/// GET    /{id}                        -> get_relaxation
/// GET    /{id}/structures/{kind}      -> get_structure
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(relaxations::create_relaxation))
        .route("/{id}", get(relaxations::get_relaxation))
        .route("/{id}/structures/{kind}", get(relaxations::get_structure))
}
