use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::dao::{
    models::{GuildSettings, MemberRecord, Position, SocialHandles},
    roster_store::airtable::error::AirtableDaoError,
};

pub const MEMBERS_TABLE: &str = "Members";
pub const GUILD_SETTINGS_TABLE: &str = "GuildSettings";

/// Airtable rejects write batches larger than this.
pub const RECORDS_CHUNK_SIZE: usize = 10;

#[derive(Debug, Deserialize)]
pub struct ListRecordsResponse<F> {
    pub records: Vec<AirtableRecord<F>>,
    /// Cursor for the next page; absent on the last page.
    #[serde(default)]
    pub offset: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AirtableRecord<F> {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub fields: F,
}

#[derive(Debug, Serialize)]
pub struct WriteRecordsRequest<'a, F> {
    pub records: &'a [AirtableRecord<F>],
    pub typecast: bool,
}

#[derive(Debug, Deserialize)]
pub struct WriteRecordsResponse<F> {
    pub records: Vec<AirtableRecord<F>>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteRecordResponse {
    #[serde(default)]
    pub deleted: bool,
}

/// Column layout of the `Members` table. Absent values are omitted from writes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MemberFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_captain: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub twitch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub twitter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instagram: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub youtube: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tiktok: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leaderboard_rank: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank_tier: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_leaderboard_rank: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_rank_tier: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub win: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lose: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skill_score: Option<u32>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub last_updated: Option<OffsetDateTime>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub last_change: Option<OffsetDateTime>,
}

impl From<&MemberRecord> for AirtableRecord<MemberFields> {
    fn from(record: &MemberRecord) -> Self {
        let socials = record.socials.clone();
        Self {
            id: record.id.clone(),
            fields: MemberFields {
                display_name: Some(record.display_name.clone()),
                account_name: record.account_name.clone(),
                account_id: Some(record.account_id.clone()),
                is_enabled: Some(record.enabled),
                phone: record.phone.clone(),
                email: record.email.clone(),
                country: record.country.clone(),
                team: record.team.clone(),
                is_captain: Some(record.captain),
                position: Some(record.position.into()),
                notes: record.notes.clone(),
                twitch: socials.twitch,
                twitter: socials.twitter,
                instagram: socials.instagram,
                youtube: socials.youtube,
                tiktok: socials.tiktok,
                avatar_url: record.avatar_url.clone(),
                profile_url: record.profile_url.clone(),
                leaderboard_rank: record.leaderboard_rank,
                rank_tier: record.rank_tier,
                previous_leaderboard_rank: record.previous_leaderboard_rank,
                previous_rank_tier: record.previous_rank_tier,
                win: Some(record.win),
                lose: Some(record.lose),
                skill_score: record.skill_score,
                last_updated: record.last_updated,
                last_change: record.last_change,
            },
        }
    }
}

impl From<AirtableRecord<MemberFields>> for MemberRecord {
    fn from(row: AirtableRecord<MemberFields>) -> Self {
        let fields = row.fields;
        Self {
            id: row.id,
            display_name: fields.display_name.unwrap_or_default(),
            account_name: non_blank(fields.account_name),
            account_id: fields.account_id.unwrap_or_default().trim().to_string(),
            // Airtable omits unchecked checkboxes entirely.
            enabled: fields.is_enabled.unwrap_or(false),
            phone: non_blank(fields.phone),
            email: non_blank(fields.email),
            country: non_blank(fields.country),
            team: non_blank(fields.team),
            captain: fields.is_captain.unwrap_or(false),
            position: fields
                .position
                .as_deref()
                .map(Position::parse)
                .unwrap_or_default(),
            notes: non_blank(fields.notes),
            socials: SocialHandles {
                twitch: non_blank(fields.twitch),
                twitter: non_blank(fields.twitter),
                instagram: non_blank(fields.instagram),
                youtube: non_blank(fields.youtube),
                tiktok: non_blank(fields.tiktok),
            },
            avatar_url: non_blank(fields.avatar_url),
            profile_url: non_blank(fields.profile_url),
            leaderboard_rank: fields.leaderboard_rank,
            rank_tier: fields.rank_tier,
            previous_leaderboard_rank: fields.previous_leaderboard_rank,
            previous_rank_tier: fields.previous_rank_tier,
            win: fields.win.unwrap_or(0),
            lose: fields.lose.unwrap_or(0),
            skill_score: fields.skill_score,
            last_updated: fields.last_updated,
            last_change: fields.last_change,
        }
    }
}

/// Column layout of the `GuildSettings` table.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GuildSettingsFields {
    #[serde(default)]
    pub guild_id: Option<String>,
    #[serde(default)]
    pub guild_name: Option<String>,
    #[serde(default)]
    pub ranking_channel_id: Option<String>,
    #[serde(default)]
    pub region_update_threshold_in_minutes: Option<u32>,
    #[serde(default)]
    pub is_debug_guild: Option<bool>,
}

impl TryFrom<AirtableRecord<GuildSettingsFields>> for GuildSettings {
    type Error = AirtableDaoError;

    fn try_from(row: AirtableRecord<GuildSettingsFields>) -> Result<Self, Self::Error> {
        let fields = row.fields;
        let guild_id = fields
            .guild_id
            .as_deref()
            .and_then(parse_snowflake)
            .ok_or_else(|| AirtableDaoError::InvalidField {
                record_id: row.id.clone(),
                field: "GuildId",
            })?;

        Ok(Self {
            id: row.id,
            guild_id,
            guild_name: non_blank(fields.guild_name),
            ranking_channel_id: fields.ranking_channel_id.as_deref().and_then(parse_snowflake),
            stale_after_minutes: fields.region_update_threshold_in_minutes.unwrap_or(0),
            debug_guild: fields.is_debug_guild.unwrap_or(false),
        })
    }
}

/// Discord identifiers are stored as text; zero is treated as unset.
fn parse_snowflake(raw: &str) -> Option<u64> {
    raw.trim().parse::<u64>().ok().filter(|id| *id != 0)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
