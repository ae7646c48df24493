//! Roster administration backing the HTTP routes.

use tracing::{info, warn};

use crate::{
    dto::{
        guilds::{GuildSettingsSummary, GuildsQuery},
        ladder::{DistributionsResponse, RegionResponse},
        members::{AddMemberRequest, MemberPayload, MemberSummary},
        operations::{
            CancelResponse, CurrentOperationResponse, OperationStartedResponse,
            UpdateMembersRequest,
        },
        sse::OperationFinishedEvent,
    },
    error::ServiceError,
    services::{
        guild_actions::GuildUpdateRequest,
        operations::OperationKind,
        progress::{LogProgress, SseProgress, Tee},
        ranking::RankingBoard,
        sse_service::broadcast_operation_finished,
    },
    state::SharedState,
};

/// Roster summaries; `refresh` reloads from the store.
pub async fn list_members(
    state: &SharedState,
    refresh: bool,
) -> Result<Vec<MemberSummary>, ServiceError> {
    let members = state.community().members(refresh).await?;
    Ok(members.into_iter().map(MemberSummary::from).collect())
}

/// Add a member; ladder lookups report progress on the SSE stream.
pub async fn add_member(
    state: &SharedState,
    request: AddMemberRequest,
) -> Result<MemberSummary, ServiceError> {
    let options = request.options();
    let sse = SseProgress::new(state.progress_sse().clone(), None);
    let progress = Tee(&sse, &LogProgress);
    let record = state
        .community()
        .add_member(request.member.into(), options, &progress)
        .await?
        .into_result()?;
    Ok(record.into())
}

/// Replace the editable fields of a member.
pub async fn edit_member(
    state: &SharedState,
    id: &str,
    payload: MemberPayload,
) -> Result<MemberSummary, ServiceError> {
    let record = state
        .community()
        .edit_member(id, payload.into())
        .await?
        .into_result()?;
    Ok(record.into())
}

/// Delete a member by record id.
pub async fn remove_member(state: &SharedState, id: &str) -> Result<(), ServiceError> {
    state.community().remove_member(id).await?.into_result()
}

/// Claim the operation slot and run the bulk update in the background.
///
/// Progress lines and the final summary are published on the progress SSE stream.
pub fn start_update(
    state: &SharedState,
    request: UpdateMembersRequest,
) -> Result<OperationStartedResponse, ServiceError> {
    let ticket = state.actions().begin(OperationKind::MemberUpdate)?;
    let response = OperationStartedResponse {
        operation_id: ticket.id(),
        kind: ticket.kind(),
    };

    let state = state.clone();
    let request = GuildUpdateRequest::from(request);
    tokio::spawn(async move {
        let hub = state.progress_sse().clone();
        let sse = SseProgress::new(hub.clone(), Some(ticket.id()));
        let progress = Tee(&sse, &LogProgress);

        let (written, cancelled, message) =
            match state.actions().run_update(&ticket, request, &progress).await {
                Ok(summary) => {
                    info!(
                        operation_id = %ticket.id(),
                        written = summary.written,
                        cancelled = summary.cancelled,
                        "member update finished"
                    );
                    (summary.written, summary.cancelled, summary.message())
                }
                Err(err) => {
                    warn!(operation_id = %ticket.id(), error = %err, "member update failed");
                    (0, false, err.to_string())
                }
            };

        let (operation_id, kind) = (ticket.id(), ticket.kind());
        drop(ticket);
        broadcast_operation_finished(
            &hub,
            &OperationFinishedEvent {
                operation_id,
                kind,
                written,
                cancelled,
                message,
            },
        );
    });

    Ok(response)
}

/// Request cancellation of the running operation.
pub fn cancel_operation(state: &SharedState) -> CancelResponse {
    CancelResponse {
        cancelled: state.actions().cancel_operation(),
    }
}

/// Describe the operation holding the slot, if any.
pub fn current_operation(state: &SharedState) -> CurrentOperationResponse {
    match state.actions().slot().current() {
        Some((operation_id, kind)) => CurrentOperationResponse {
            running: true,
            operation_id: Some(operation_id),
            kind: Some(kind),
        },
        None => CurrentOperationResponse {
            running: false,
            operation_id: None,
            kind: None,
        },
    }
}

/// Render the leaderboard without posting it.
pub async fn ranking(
    state: &SharedState,
    include_banned: bool,
) -> Result<RankingBoard, ServiceError> {
    state.actions().ranking(include_banned).await
}

/// Guild settings, debug guilds only on request.
pub async fn list_guilds(
    state: &SharedState,
    query: GuildsQuery,
) -> Result<Vec<GuildSettingsSummary>, ServiceError> {
    let guilds = state.community().guild_settings_list(query.refresh).await?;
    Ok(guilds
        .into_iter()
        .filter(|guild| query.include_debug || !guild.debug_guild)
        .map(GuildSettingsSummary::from)
        .collect())
}

/// Ranked player count from the ladder distribution.
pub async fn distributions(state: &SharedState) -> Result<DistributionsResponse, ServiceError> {
    let ranked_players = state.community().ranked_player_count().await?;
    Ok(DistributionsResponse { ranked_players })
}

/// Estimate a player's region from recent matches.
pub async fn detect_region(
    state: &SharedState,
    account_id: &str,
    sample: u32,
) -> Result<RegionResponse, ServiceError> {
    let estimate = state.community().detect_region(account_id, sample).await?;
    Ok(estimate.into())
}
