use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI document for the Ascendia admin API.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sse::progress_stream,
        crate::routes::members::list_members,
        crate::routes::members::add_member,
        crate::routes::members::edit_member,
        crate::routes::members::remove_member,
        crate::routes::members::start_update,
        crate::routes::operations::current_operation,
        crate::routes::operations::cancel_operation,
        crate::routes::operations::ranking,
        crate::routes::community::list_guilds,
        crate::routes::community::distributions,
        crate::routes::community::detect_region,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::members::MemberPayload,
            crate::dto::members::AddMemberRequest,
            crate::dto::members::MemberSummary,
            crate::dto::operations::UpdateMembersRequest,
            crate::dto::operations::OperationStartedResponse,
            crate::dto::operations::CancelResponse,
            crate::dto::operations::CurrentOperationResponse,
            crate::dto::guilds::GuildSettingsSummary,
            crate::dto::ladder::DistributionsResponse,
            crate::dto::ladder::RegionCount,
            crate::dto::ladder::RegionResponse,
            crate::dto::sse::ProgressEvent,
            crate::dto::sse::OperationFinishedEvent,
            crate::ladder::RegionGroup,
            crate::ladder::RateLimitQuota,
            crate::services::operations::OperationKind,
            crate::services::ranking::RankingBoard,
            crate::services::ranking::RankingThread,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "sse", description = "Server-sent events streams"),
        (name = "members", description = "Roster management"),
        (name = "operations", description = "Bulk update, ranking and cancellation"),
        (name = "community", description = "Guild settings and ladder lookups"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/healthcheck",
            "/sse/progress",
            "/members",
            "/members/{id}",
            "/members/update",
            "/operations/cancel",
            "/ranking",
            "/guilds",
            "/ladder/players/{account_id}/region",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
