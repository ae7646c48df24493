//! OpenDota ladder access.
//!
//! Every call resolves to a [`LadderResponse`]; failures are values rather
//! than errors so the update loop can tell rate limiting apart from a dead end.

/// HTTP implementation of [`LadderApi`].
pub mod client;
pub mod models;
/// Cluster-to-region grouping.
pub mod region;

use futures::future::BoxFuture;

pub use client::{LadderError, OpenDotaClient};
pub use models::{
    Distributions, LadderResponse, MatchDetails, PlayerMatch, PlayerProfile, RateLimitQuota,
    WinLoss,
};
pub use region::{RegionGroup, region_group};

/// Default public endpoint.
pub const DEFAULT_LADDER_URL: &str = "https://api.opendota.com/api";

/// Read side of the game-statistics API used by the roster.
pub trait LadderApi: Send + Sync {
    /// Ask the ladder to re-scan the player's recent matches.
    fn refresh_player(&self, account_id: &str) -> BoxFuture<'static, LadderResponse<()>>;

    /// Fetch the player's profile and medal.
    fn player(&self, account_id: &str) -> BoxFuture<'static, LadderResponse<PlayerProfile>>;

    /// Lifetime win and loss totals.
    fn win_loss(&self, account_id: &str) -> BoxFuture<'static, LadderResponse<WinLoss>>;

    /// Most recent matches, newest first.
    fn player_matches(
        &self,
        account_id: &str,
        limit: u32,
    ) -> BoxFuture<'static, LadderResponse<Vec<PlayerMatch>>>;

    /// Full match record, used for the cluster region.
    fn match_details(&self, match_id: i64) -> BoxFuture<'static, LadderResponse<MatchDetails>>;

    /// Global rank distribution.
    fn distributions(&self) -> BoxFuture<'static, LadderResponse<Distributions>>;
}
