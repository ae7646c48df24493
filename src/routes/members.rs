use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    routing::{get, post, put},
};
use validator::Validate;

use crate::{
    dto::{
        members::{AddMemberRequest, MemberPayload, MemberSummary, MembersQuery},
        operations::{OperationStartedResponse, UpdateMembersRequest},
    },
    error::AppError,
    routes::auth::require_admin_token,
    services::admin_service,
    state::SharedState,
};

/// Roster management endpoints; everything but listing requires the admin token.
pub fn router(state: SharedState) -> Router<SharedState> {
    let protected = Router::new()
        .route("/members", post(add_member))
        .route("/members/update", post(start_update))
        .route("/members/{id}", put(edit_member).delete(remove_member))
        .route_layer(middleware::from_fn_with_state(state, require_admin_token));

    Router::new()
        .route("/members", get(list_members))
        .merge(protected)
}

/// List tracked members ordered by display name.
#[utoipa::path(
    get,
    path = "/members",
    tag = "members",
    params(MembersQuery),
    responses(
        (status = 200, description = "Roster", body = [MemberSummary]),
        (status = 503, description = "Roster store unreachable")
    )
)]
pub async fn list_members(
    State(state): State<SharedState>,
    Query(query): Query<MembersQuery>,
) -> Result<Json<Vec<MemberSummary>>, AppError> {
    Ok(Json(admin_service::list_members(&state, query.refresh).await?))
}

/// Start tracking a player, optionally seeding ladder data.
#[utoipa::path(
    post,
    path = "/members",
    tag = "members",
    params(("X-Admin-Token" = String, Header, description = "Configured admin token")),
    request_body = AddMemberRequest,
    responses(
        (status = 201, description = "Member created", body = MemberSummary),
        (status = 400, description = "Invalid or duplicate account id"),
        (status = 409, description = "Another roster operation is running")
    )
)]
pub async fn add_member(
    State(state): State<SharedState>,
    Json(payload): Json<AddMemberRequest>,
) -> Result<(StatusCode, Json<MemberSummary>), AppError> {
    payload.validate()?;
    let member = admin_service::add_member(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(member)))
}

/// Overwrite a member's identity fields; ladder data is kept.
#[utoipa::path(
    put,
    path = "/members/{id}",
    tag = "members",
    params(("X-Admin-Token" = String, Header, description = "Configured admin token"),
    ("id" = String, Path, description = "Airtable record identifier")),
    request_body = MemberPayload,
    responses(
        (status = 200, description = "Member updated", body = MemberSummary),
        (status = 404, description = "Unknown member"),
        (status = 409, description = "Another roster operation is running")
    )
)]
pub async fn edit_member(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(payload): Json<MemberPayload>,
) -> Result<Json<MemberSummary>, AppError> {
    payload.validate()?;
    Ok(Json(admin_service::edit_member(&state, &id, payload).await?))
}

/// Delete a member remotely and drop it from the roster.
#[utoipa::path(
    delete,
    path = "/members/{id}",
    tag = "members",
    params(("X-Admin-Token" = String, Header, description = "Configured admin token"),
    ("id" = String, Path, description = "Airtable record identifier")),
    responses(
        (status = 204, description = "Member removed"),
        (status = 409, description = "Another roster operation is running"),
        (status = 502, description = "Roster store rejected the delete")
    )
)]
pub async fn remove_member(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    admin_service::remove_member(&state, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Refresh ladder data for stale members in the background.
#[utoipa::path(
    post,
    path = "/members/update",
    tag = "members",
    params(("X-Admin-Token" = String, Header, description = "Configured admin token")),
    request_body = UpdateMembersRequest,
    responses(
        (status = 202, description = "Update started; follow /sse/progress", body = OperationStartedResponse),
        (status = 409, description = "Another operation is running")
    )
)]
pub async fn start_update(
    State(state): State<SharedState>,
    Json(payload): Json<UpdateMembersRequest>,
) -> Result<(StatusCode, Json<OperationStartedResponse>), AppError> {
    let started = admin_service::start_update(&state, payload)?;
    Ok((StatusCode::ACCEPTED, Json(started)))
}
