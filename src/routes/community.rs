use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};

use crate::{
    dto::{
        guilds::{GuildSettingsSummary, GuildsQuery},
        ladder::{DistributionsResponse, RegionQuery, RegionResponse},
    },
    error::AppError,
    services::admin_service,
    state::SharedState,
};

/// Read-only guild settings and ladder lookups.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/guilds", get(list_guilds))
        .route("/ladder/distributions", get(distributions))
        .route("/ladder/players/{account_id}/region", get(detect_region))
}

/// Guild settings known to the bot.
#[utoipa::path(
    get,
    path = "/guilds",
    tag = "community",
    params(GuildsQuery),
    responses((status = 200, description = "Guild settings", body = [GuildSettingsSummary]))
)]
pub async fn list_guilds(
    State(state): State<SharedState>,
    Query(query): Query<GuildsQuery>,
) -> Result<Json<Vec<GuildSettingsSummary>>, AppError> {
    Ok(Json(admin_service::list_guilds(&state, query).await?))
}

/// Total ranked players on the ladder.
#[utoipa::path(
    get,
    path = "/ladder/distributions",
    tag = "community",
    responses(
        (status = 200, description = "Ranked player total", body = DistributionsResponse),
        (status = 502, description = "Ladder unavailable or rate limited")
    )
)]
pub async fn distributions(
    State(state): State<SharedState>,
) -> Result<Json<DistributionsResponse>, AppError> {
    Ok(Json(admin_service::distributions(&state).await?))
}

/// Estimate a player's region from their recent matches.
#[utoipa::path(
    get,
    path = "/ladder/players/{account_id}/region",
    tag = "community",
    params(("account_id" = String, Path, description = "Numeric ladder account id"), RegionQuery),
    responses(
        (status = 200, description = "Region estimate", body = RegionResponse),
        (status = 400, description = "Malformed account id"),
        (status = 502, description = "Ladder unavailable or rate limited")
    )
)]
pub async fn detect_region(
    State(state): State<SharedState>,
    Path(account_id): Path<String>,
    Query(query): Query<RegionQuery>,
) -> Result<Json<RegionResponse>, AppError> {
    Ok(Json(
        admin_service::detect_region(&state, &account_id, query.sample).await?,
    ))
}
