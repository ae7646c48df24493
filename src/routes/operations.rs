use axum::{
    Json, Router,
    extract::{Query, State},
    middleware,
    routing::{get, post},
};

use crate::{
    dto::operations::{CancelResponse, CurrentOperationResponse, RankingQuery},
    error::AppError,
    routes::auth::require_admin_token,
    services::{admin_service, ranking::RankingBoard},
    state::SharedState,
};

/// Operation slot inspection, cancellation and the ranking preview.
pub fn router(state: SharedState) -> Router<SharedState> {
    let protected = Router::new()
        .route("/operations/cancel", post(cancel_operation))
        .route_layer(middleware::from_fn_with_state(state, require_admin_token));

    Router::new()
        .route("/operations/current", get(current_operation))
        .route("/ranking", get(ranking))
        .merge(protected)
}

/// Describe the operation holding the slot, if any.
#[utoipa::path(
    get,
    path = "/operations/current",
    tag = "operations",
    responses((status = 200, description = "Running operation", body = CurrentOperationResponse))
)]
pub async fn current_operation(State(state): State<SharedState>) -> Json<CurrentOperationResponse> {
    Json(admin_service::current_operation(&state))
}

/// Cancel the running update or ranking.
#[utoipa::path(
    post,
    path = "/operations/cancel",
    tag = "operations",
    params(("X-Admin-Token" = String, Header, description = "Configured admin token")),
    responses((status = 200, description = "Cancellation requested", body = CancelResponse))
)]
pub async fn cancel_operation(State(state): State<SharedState>) -> Json<CancelResponse> {
    Json(admin_service::cancel_operation(&state))
}

/// Build the leaderboard exactly as the bot would post it.
#[utoipa::path(
    get,
    path = "/ranking",
    tag = "operations",
    params(RankingQuery),
    responses(
        (status = 200, description = "Ranking messages", body = RankingBoard),
        (status = 409, description = "Another operation is running")
    )
)]
pub async fn ranking(
    State(state): State<SharedState>,
    Query(query): Query<RankingQuery>,
) -> Result<Json<RankingBoard>, AppError> {
    Ok(Json(admin_service::ranking(&state, query.include_banned).await?))
}
