use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Preferred in-game role, stored remotely as a small numeric string.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Position {
    /// Role not provided or not recognised (stored as `"0"`).
    #[default]
    Unknown,
    /// Position 1.
    SafeLane,
    /// Position 2.
    MidLane,
    /// Position 3.
    OffLane,
    /// Position 4.
    SoftSupport,
    /// Position 5.
    HardSupport,
}

impl Position {
    /// Numeric code used by the remote table, `0` for unknown.
    pub fn code(self) -> u8 {
        match self {
            Position::Unknown => 0,
            Position::SafeLane => 1,
            Position::MidLane => 2,
            Position::OffLane => 3,
            Position::SoftSupport => 4,
            Position::HardSupport => 5,
        }
    }

    /// Parse the remote string encoding; anything outside `1..=5` is unknown.
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "1" => Position::SafeLane,
            "2" => Position::MidLane,
            "3" => Position::OffLane,
            "4" => Position::SoftSupport,
            "5" => Position::HardSupport,
            _ => Position::Unknown,
        }
    }
}

impl From<String> for Position {
    fn from(value: String) -> Self {
        Position::parse(&value)
    }
}

impl From<Position> for String {
    fn from(value: Position) -> Self {
        value.code().to_string()
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Optional social-media handles attached to a member.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialHandles {
    /// Twitch channel name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub twitch: Option<String>,
    /// Twitter/X handle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub twitter: Option<String>,
    /// Instagram handle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instagram: Option<String>,
    /// YouTube channel.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub youtube: Option<String>,
    /// TikTok handle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tiktok: Option<String>,
}

/// One roster entry as tracked locally and persisted remotely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRecord {
    /// Remote record identifier; empty until the record is first persisted.
    #[serde(default)]
    pub id: String,
    /// Name shown on the leaderboard.
    pub display_name: String,
    /// Persona name reported by the ladder API.
    #[serde(default)]
    pub account_name: Option<String>,
    /// Numeric ladder account identifier in string form.
    pub account_id: String,
    /// Soft ban switch; disabled members are never refreshed.
    pub enabled: bool,
    /// Contact phone number.
    #[serde(default)]
    pub phone: Option<String>,
    /// Contact e-mail address.
    #[serde(default)]
    pub email: Option<String>,
    /// Country code or name, free text.
    #[serde(default)]
    pub country: Option<String>,
    /// Community team the member plays for.
    #[serde(default)]
    pub team: Option<String>,
    /// Whether the member captains their team.
    #[serde(default)]
    pub captain: bool,
    /// Preferred in-game position.
    #[serde(default)]
    pub position: Position,
    /// Free-form admin notes.
    #[serde(default)]
    pub notes: Option<String>,
    /// Social-media handles.
    #[serde(default)]
    pub socials: SocialHandles,
    /// Steam avatar, refreshed from the ladder.
    #[serde(default)]
    pub avatar_url: Option<String>,
    /// Steam profile link, refreshed from the ladder.
    #[serde(default)]
    pub profile_url: Option<String>,
    /// Position on the regional leaderboard; only set for top-tier players.
    #[serde(default)]
    pub leaderboard_rank: Option<u32>,
    /// Medal and star encoded as two digits, e.g. `54` for Legend 4; `80` is top tier.
    #[serde(default)]
    pub rank_tier: Option<u32>,
    /// Leaderboard rank held before the last observed change.
    #[serde(default)]
    pub previous_leaderboard_rank: Option<u32>,
    /// Rank tier held before the last observed change.
    #[serde(default)]
    pub previous_rank_tier: Option<u32>,
    /// Recorded wins.
    #[serde(default)]
    pub win: u32,
    /// Recorded losses.
    #[serde(default)]
    pub lose: u32,
    /// Sortable score derived from the rank fields, see `member_merge::skill_score`.
    #[serde(default)]
    pub skill_score: Option<u32>,
    /// Last successful ladder fetch.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub last_updated: Option<OffsetDateTime>,
    /// Last time the rank tier or leaderboard rank differed from its previous value.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub last_change: Option<OffsetDateTime>,
}

impl MemberRecord {
    /// Fresh, enabled record with only identity fields populated.
    pub fn new(display_name: impl Into<String>, account_id: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            display_name: display_name.into(),
            account_name: None,
            account_id: account_id.into(),
            enabled: true,
            phone: None,
            email: None,
            country: None,
            team: None,
            captain: false,
            position: Position::Unknown,
            notes: None,
            socials: SocialHandles::default(),
            avatar_url: None,
            profile_url: None,
            leaderboard_rank: None,
            rank_tier: None,
            previous_leaderboard_rank: None,
            previous_rank_tier: None,
            win: 0,
            lose: 0,
            skill_score: None,
            last_updated: None,
            last_change: None,
        }
    }

    /// Whether the remote store has assigned an identifier yet.
    pub fn is_persisted(&self) -> bool {
        !self.id.is_empty()
    }

    /// Total games recorded for the member.
    pub fn total_games(&self) -> u32 {
        self.win.saturating_add(self.lose)
    }
}

/// Per-Discord-server configuration row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildSettings {
    /// Remote record identifier.
    #[serde(default)]
    pub id: String,
    /// Discord guild snowflake.
    pub guild_id: u64,
    /// Guild name at the time the row was written.
    #[serde(default)]
    pub guild_name: Option<String>,
    /// Channel receiving ranking posts and update progress.
    #[serde(default)]
    pub ranking_channel_id: Option<u64>,
    /// Minutes after which a member's ladder data is considered stale, `0` for always.
    #[serde(default)]
    pub stale_after_minutes: u32,
    /// Test server; hidden from guild listings by default.
    #[serde(default)]
    pub debug_guild: bool,
}

impl fmt::Display for GuildSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.guild_name.as_deref().unwrap_or("-"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_parses_known_codes_and_falls_back_to_unknown() {
        assert_eq!(Position::parse("1"), Position::SafeLane);
        assert_eq!(Position::parse(" 5 "), Position::HardSupport);
        assert_eq!(Position::parse("6"), Position::Unknown);
        assert_eq!(Position::parse(""), Position::Unknown);
        assert_eq!(String::from(Position::Unknown), "0");
        assert_eq!(String::from(Position::OffLane), "3");
    }

    #[test]
    fn position_serializes_as_string() {
        let json = serde_json::to_string(&Position::MidLane).unwrap();
        assert_eq!(json, "\"2\"");
        let parsed: Position = serde_json::from_str("\"4\"").unwrap();
        assert_eq!(parsed, Position::SoftSupport);
    }
}
