use axum::Router;

use crate::state::SharedState;

/// Admin token guard.
pub mod auth;
/// Guild settings, ranking and distribution routes.
pub mod community;
/// Swagger UI and OpenAPI document.
pub mod docs;
/// Liveness and dependency checks.
pub mod health;
/// Roster CRUD.
pub mod members;
/// Bulk update and cancellation.
pub mod operations;
/// Server-sent progress stream.
pub mod sse;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(sse::router())
        .merge(members::router(state.clone()))
        .merge(operations::router(state.clone()))
        .merge(community::router());

    api_router.merge(docs::router()).with_state(state)
}
