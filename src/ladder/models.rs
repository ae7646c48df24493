//! Payloads returned by the OpenDota API. Only the fields the roster uses are decoded.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// `GET /players/{id}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PlayerProfile {
    /// Legacy party MMR, when public.
    #[serde(default)]
    pub competitive_rank: Option<u32>,
    /// Legacy solo MMR, when public.
    #[serde(default)]
    pub solo_competitive_rank: Option<u32>,
    /// Leaderboard position for top-tier players.
    #[serde(default)]
    pub leaderboard_rank: Option<u32>,
    /// Medal tier, `11..=80`.
    #[serde(default)]
    pub rank_tier: Option<u32>,
    /// Steam profile; absent for unknown accounts.
    #[serde(default)]
    pub profile: Option<SteamProfile>,
}

impl PlayerProfile {
    /// Non-blank Steam persona name.
    pub fn persona_name(&self) -> Option<&str> {
        self.profile
            .as_ref()
            .and_then(|profile| profile.persona_name.as_deref())
            .filter(|name| !name.trim().is_empty())
    }
}

/// Steam account data embedded in [`PlayerProfile`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SteamProfile {
    /// 32-bit Steam account id.
    #[serde(default)]
    pub account_id: u64,
    /// Current Steam display name.
    #[serde(default, rename = "personaname")]
    pub persona_name: Option<String>,
    /// Pro player name, if registered.
    #[serde(default)]
    pub name: Option<String>,
    /// Full-size avatar URL.
    #[serde(default, rename = "avatarfull")]
    pub avatar: Option<String>,
    /// Steam community profile URL.
    #[serde(default, rename = "profileurl")]
    pub profile_url: Option<String>,
}

/// `GET /players/{id}/wl`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct WinLoss {
    /// Games won.
    #[serde(default)]
    pub win: u32,
    /// Games lost.
    #[serde(default)]
    pub lose: u32,
}

/// One entry of `GET /players/{id}/matches`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PlayerMatch {
    /// Match identifier, usable with `GET /matches/{id}`.
    pub match_id: i64,
    /// Slot byte; values below 128 are Radiant.
    #[serde(default)]
    pub player_slot: Option<u32>,
    /// Whether Radiant won.
    #[serde(default)]
    pub radiant_win: Option<bool>,
    /// Match length in seconds.
    #[serde(default)]
    pub duration: Option<u32>,
    /// OpenDota game mode id.
    #[serde(default)]
    pub game_mode: Option<u32>,
    /// OpenDota lobby type id, `7` for ranked.
    #[serde(default)]
    pub lobby_type: Option<u32>,
    /// Hero played.
    #[serde(default)]
    pub hero_id: Option<u32>,
    /// Unix timestamp of the match start.
    #[serde(default)]
    pub start_time: Option<i64>,
    /// Average rank tier of the lobby.
    #[serde(default)]
    pub average_rank: Option<u32>,
    /// Party size of the player.
    #[serde(default)]
    pub party_size: Option<u32>,
}

/// `GET /matches/{id}`, reduced to what region detection needs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MatchDetails {
    /// Cluster region id, see [`crate::ladder::region_group`].
    #[serde(default)]
    pub region: Option<u32>,
    /// Game patch index.
    #[serde(default)]
    pub patch: Option<u32>,
}

/// `GET /distributions`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Distributions {
    #[serde(default)]
    ranks: Option<RankDistribution>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
struct RankDistribution {
    #[serde(default)]
    sum: Option<RankSum>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
struct RankSum {
    #[serde(default)]
    count: u64,
}

impl Distributions {
    /// Total number of ranked players known to the ladder.
    pub fn ranked_players(&self) -> u64 {
        self.ranks
            .as_ref()
            .and_then(|ranks| ranks.sum.as_ref())
            .map(|sum| sum.count)
            .unwrap_or(0)
    }
}

/// Remaining request budget reported by the ladder API on each response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct RateLimitQuota {
    /// Requests left in the current minute.
    pub remaining_minute: Option<u32>,
    /// Requests left today.
    pub remaining_day: Option<u32>,
    /// Caller address as seen by the API.
    pub ip: Option<String>,
}

/// Outcome of a single ladder call.
///
/// `rate_limited` is only set for HTTP 429 so callers can tell "retry later"
/// apart from "give up on this player for now".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LadderResponse<T> {
    /// Decoded payload, present only on success.
    pub value: Option<T>,
    /// The call succeeded and the payload decoded.
    pub valid: bool,
    /// HTTP 429.
    pub rate_limited: bool,
    /// Rate-limit headers of the response.
    pub quota: RateLimitQuota,
}

impl<T> LadderResponse<T> {
    /// Result for malformed input; no request was sent.
    pub fn invalid() -> Self {
        Self {
            value: None,
            valid: false,
            rate_limited: false,
            quota: RateLimitQuota::default(),
        }
    }

    /// Decoded payload.
    pub fn success(value: T, quota: RateLimitQuota) -> Self {
        Self {
            value: Some(value),
            valid: true,
            rate_limited: false,
            quota,
        }
    }

    /// HTTP 429; retry after a pause.
    pub fn limited(quota: RateLimitQuota) -> Self {
        Self {
            value: None,
            valid: false,
            rate_limited: true,
            quota,
        }
    }

    /// Any other failure: transport, status or decoding.
    pub fn failed(quota: RateLimitQuota) -> Self {
        Self {
            value: None,
            valid: false,
            rate_limited: false,
            quota,
        }
    }
}
