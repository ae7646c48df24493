use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::dao::models::GuildSettings;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct GuildsQuery {
    /// Include guilds flagged for debugging.
    #[serde(default)]
    pub include_debug: bool,
    /// Reload settings from Airtable before answering.
    #[serde(default)]
    pub refresh: bool,
}

/// Per-guild configuration exposed over HTTP.
#[derive(Debug, Serialize, ToSchema)]
pub struct GuildSettingsSummary {
    pub guild_id: String,
    pub guild_name: Option<String>,
    pub ranking_channel_id: Option<String>,
    pub stale_after_minutes: u32,
    pub debug_guild: bool,
}

// Discord snowflakes overflow JavaScript numbers, so ids travel as strings.
impl From<GuildSettings> for GuildSettingsSummary {
    fn from(value: GuildSettings) -> Self {
        Self {
            guild_id: value.guild_id.to_string(),
            guild_name: value.guild_name,
            ranking_channel_id: value.ranking_channel_id.map(|id| id.to_string()),
            stale_after_minutes: value.stale_after_minutes,
            debug_guild: value.debug_guild,
        }
    }
}
