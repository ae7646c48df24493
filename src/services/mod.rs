/// Roster administration for the HTTP routes.
pub mod admin_service;
/// Roster orchestration: cache, store and ladder updates.
pub mod community_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Guild-level ranking and update workflows.
pub mod guild_actions;
/// Health check service.
pub mod health_service;
/// Ladder data merged into roster records.
pub mod member_merge;
/// Exclusive operation slot and cancellation.
pub mod operations;
/// Progress reporting sinks.
pub mod progress;
/// Leaderboard layout.
pub mod ranking;
/// Server-Sent Events broadcasting service.
pub mod sse_service;

#[cfg(test)]
pub(crate) mod test_support;
