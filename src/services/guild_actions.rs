//! Guild-level workflows shared by the Discord bot and the admin HTTP routes.
//!
//! Bulk update and ranking display are mutually exclusive: both hold the
//! [`OperationSlot`] for their whole duration.

use std::sync::Arc;

use tracing::info;

use crate::{
    error::ServiceError,
    services::{
        community_service::{CommunityService, UpdateOutcome, UpdateRequest},
        operations::{OperationKind, OperationSlot, OperationTicket},
        progress::ProgressSink,
        ranking::{EmojiCatalog, RankingBoard, build_ranking},
    },
};

/// Reply when the operation slot is taken.
pub const OPERATION_IN_PROGRESS: &str = "Another operation is already in progress.";
/// Final line of a cancelled update.
pub const OPERATION_CANCELLED: &str = "Operation cancelled.";
/// First progress line of every operation.
pub const STARTING_OPERATION: &str = "Starting operation...";
/// Progress line while the roster loads.
pub const ACCESSING_MEMBERS: &str = "Accessing members list...";

/// Options of a guild-triggered ladder update.
#[derive(Debug, Clone, Copy, Default)]
pub struct GuildUpdateRequest {
    /// Guild whose staleness threshold applies.
    pub guild_id: Option<u64>,
    /// Ignore the staleness threshold and refresh every enabled member.
    pub force_update: bool,
    /// Refresh win/loss totals too.
    pub include_win_loss: bool,
}

/// Outcome of a guild-scoped update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateSummary {
    /// Rows saved to the store.
    pub written: usize,
    /// The update stopped on a cancel request.
    pub cancelled: bool,
}

impl UpdateSummary {
    /// Text shown to users once the update ends.
    pub fn message(&self) -> String {
        if self.cancelled {
            OPERATION_CANCELLED.to_string()
        } else {
            format!("{} profiles updated", self.written)
        }
    }
}

/// Entry point for guild workflows; cheap to clone.
#[derive(Clone)]
pub struct GuildActions {
    community: Arc<CommunityService>,
    slot: OperationSlot,
    emojis: Arc<EmojiCatalog>,
}

impl GuildActions {
    /// Actions over `community` with a fresh operation slot.
    pub fn new(community: Arc<CommunityService>, emojis: EmojiCatalog) -> Self {
        Self {
            community,
            slot: OperationSlot::new(),
            emojis: Arc::new(emojis),
        }
    }

    /// Underlying roster service.
    pub fn community(&self) -> &Arc<CommunityService> {
        &self.community
    }

    /// Slot shared with the cancel endpoints.
    pub fn slot(&self) -> &OperationSlot {
        &self.slot
    }

    /// Claim the operation slot for `kind`.
    pub fn begin(&self, kind: OperationKind) -> Result<OperationTicket, ServiceError> {
        self.slot.try_acquire(kind).ok_or(ServiceError::Busy)
    }

    /// Cancel whatever holds the slot. Returns `false` when nothing was cancelled.
    pub fn cancel_operation(&self) -> bool {
        let cancelled = self.slot.cancel();
        if cancelled {
            info!("cancelling running operation");
        }
        cancelled
    }

    /// Reload the roster and lay out the leaderboard while holding `ticket`.
    pub async fn ranking_with(
        &self,
        _ticket: &OperationTicket,
        include_banned: bool,
    ) -> Result<RankingBoard, ServiceError> {
        info!("refreshing members for ranking");
        let members = self.community.members(true).await?;
        Ok(build_ranking(&members, include_banned, &self.emojis))
    }

    /// Claim the slot and build the leaderboard.
    pub async fn ranking(&self, include_banned: bool) -> Result<RankingBoard, ServiceError> {
        let ticket = self.begin(OperationKind::Ranking)?;
        self.ranking_with(&ticket, include_banned).await
    }

    /// Staleness threshold for `request`: zero when forced, else the guild's setting.
    pub async fn update_threshold(&self, request: &GuildUpdateRequest) -> u32 {
        if request.force_update {
            return 0;
        }
        match request.guild_id {
            Some(guild_id) => self
                .community
                .guild_settings(guild_id)
                .await
                .map(|settings| settings.stale_after_minutes)
                .unwrap_or(0),
            None => 0,
        }
    }

    /// Run the bulk ladder update while holding `ticket`, whose token cancels it.
    pub async fn run_update(
        &self,
        ticket: &OperationTicket,
        request: GuildUpdateRequest,
        progress: &dyn ProgressSink,
    ) -> Result<UpdateSummary, ServiceError> {
        let stale_after_minutes = self.update_threshold(&request).await;
        let outcome = self
            .community
            .update_members(
                UpdateRequest {
                    include_win_loss: request.include_win_loss,
                    stale_after_minutes,
                },
                progress,
                ticket.token(),
            )
            .await?;

        match outcome {
            UpdateOutcome::Busy => Err(ServiceError::Busy),
            UpdateOutcome::Completed { written } => Ok(UpdateSummary {
                written,
                cancelled: false,
            }),
            UpdateOutcome::Cancelled { written } => Ok(UpdateSummary {
                written,
                cancelled: true,
            }),
        }
    }
}
