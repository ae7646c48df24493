mod sse;

use std::sync::Arc;

use crate::{
    config::AppConfig,
    services::{community_service::CommunityService, guild_actions::GuildActions},
};

pub use self::sse::ProgressHub;

/// Handle shared across handlers.
pub type SharedState = Arc<AppState>;

/// Capacity of the progress broadcast channel.
const PROGRESS_CHANNEL_CAPACITY: usize = 64;

/// Central application state shared by the HTTP routes and the Discord bot.
pub struct AppState {
    config: AppConfig,
    actions: GuildActions,
    progress: ProgressHub,
    admin_token: Option<String>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// Without an admin token every mutating route answers `401`.
    pub fn new(config: AppConfig, actions: GuildActions, admin_token: Option<String>) -> SharedState {
        Arc::new(Self {
            config,
            actions,
            progress: ProgressHub::new(PROGRESS_CHANNEL_CAPACITY),
            admin_token: admin_token.filter(|token| !token.trim().is_empty()),
        })
    }

    /// Loaded configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Ranking and update workflows guarded by the operation slot.
    pub fn actions(&self) -> &GuildActions {
        &self.actions
    }

    /// Roster service behind the actions.
    pub fn community(&self) -> &Arc<CommunityService> {
        self.actions.community()
    }

    /// Broadcast hub feeding `/sse/progress`.
    pub fn progress_sse(&self) -> &ProgressHub {
        &self.progress
    }

    /// Token expected in the `X-Admin-Token` header of mutating routes.
    pub fn admin_token(&self) -> Option<&str> {
        self.admin_token.as_deref()
    }
}
