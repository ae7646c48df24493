//! DTO definitions for roster management routes.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::{Validate, ValidateEmail, ValidationError, ValidationErrors};

use crate::{
    dao::models::{MemberRecord, Position, SocialHandles},
    dto::{format_timestamp, validation::validate_account_id},
    services::community_service::{AddOptions, MemberInput},
};

/// Identity fields supplied when adding or editing a member.
#[derive(Debug, Deserialize, ToSchema)]
pub struct MemberPayload {
    /// Falls back to the ladder persona name when blank on add; kept unchanged when blank on edit.
    #[serde(default)]
    pub display_name: Option<String>,
    pub account_id: String,
    /// Omit to keep the current flag on edit; new members default to enabled.
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub team: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub captain: bool,
    /// Preferred position `1..=5`, `0` or omitted when unknown.
    #[serde(default)]
    pub position: u8,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub twitch: Option<String>,
    #[serde(default)]
    pub twitter: Option<String>,
    #[serde(default)]
    pub instagram: Option<String>,
    #[serde(default)]
    pub youtube: Option<String>,
    #[serde(default)]
    pub tiktok: Option<String>,
}

impl Validate for MemberPayload {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let Err(e) = validate_account_id(&self.account_id) {
            errors.add("account_id", e);
        }

        if let Some(email) = self.email.as_deref().filter(|email| !email.trim().is_empty()) {
            if !email.trim().validate_email() {
                let mut err = ValidationError::new("email");
                err.message = Some("Email address is malformed".into());
                errors.add("email", err);
            }
        }

        if self.position > 5 {
            let mut err = ValidationError::new("position_range");
            err.message = Some(format!("Position must be 0 to 5 (got {})", self.position).into());
            errors.add("position", err);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl From<MemberPayload> for MemberInput {
    fn from(value: MemberPayload) -> Self {
        Self {
            display_name: value.display_name,
            account_id: value.account_id.trim().to_string(),
            enabled: value.enabled,
            team: value.team,
            phone: value.phone,
            email: value.email,
            country: value.country,
            captain: value.captain,
            position: Position::parse(&value.position.to_string()),
            notes: value.notes,
            socials: SocialHandles {
                twitch: value.twitch,
                twitter: value.twitter,
                instagram: value.instagram,
                youtube: value.youtube,
                tiktok: value.tiktok,
            },
        }
    }
}

fn default_true() -> bool {
    true
}

/// Request to start tracking a new player.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct AddMemberRequest {
    #[validate(nested)]
    pub member: MemberPayload,
    /// Fetch the ladder profile before saving.
    #[serde(default = "default_true")]
    pub check_ladder: bool,
    /// Ask the ladder to re-crawl the player first.
    #[serde(default = "default_true")]
    pub refresh_player: bool,
    #[serde(default = "default_true")]
    pub include_win_loss: bool,
}

impl AddMemberRequest {
    pub fn options(&self) -> AddOptions {
        AddOptions {
            check_ladder: self.check_ladder,
            refresh_player: self.refresh_player,
            include_win_loss: self.include_win_loss,
        }
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MembersQuery {
    /// Reload the roster from Airtable before answering.
    #[serde(default)]
    pub refresh: bool,
}

/// Roster entry as exposed over HTTP.
#[derive(Debug, Serialize, ToSchema)]
pub struct MemberSummary {
    pub id: String,
    pub display_name: String,
    pub account_name: Option<String>,
    pub account_id: String,
    pub enabled: bool,
    pub team: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub country: Option<String>,
    pub captain: bool,
    pub position: u8,
    pub notes: Option<String>,
    pub twitch: Option<String>,
    pub twitter: Option<String>,
    pub instagram: Option<String>,
    pub youtube: Option<String>,
    pub tiktok: Option<String>,
    pub avatar_url: Option<String>,
    pub profile_url: Option<String>,
    pub leaderboard_rank: Option<u32>,
    pub rank_tier: Option<u32>,
    pub previous_leaderboard_rank: Option<u32>,
    pub previous_rank_tier: Option<u32>,
    pub win: u32,
    pub lose: u32,
    pub skill_score: Option<u32>,
    /// RFC 3339 timestamp of the last ladder fetch.
    pub last_updated: Option<String>,
    /// RFC 3339 timestamp of the last rank change.
    pub last_change: Option<String>,
}

impl From<MemberRecord> for MemberSummary {
    fn from(record: MemberRecord) -> Self {
        Self {
            id: record.id,
            display_name: record.display_name,
            account_name: record.account_name,
            account_id: record.account_id,
            enabled: record.enabled,
            team: record.team,
            phone: record.phone,
            email: record.email,
            country: record.country,
            captain: record.captain,
            position: record.position.code(),
            notes: record.notes,
            twitch: record.socials.twitch,
            twitter: record.socials.twitter,
            instagram: record.socials.instagram,
            youtube: record.socials.youtube,
            tiktok: record.socials.tiktok,
            avatar_url: record.avatar_url,
            profile_url: record.profile_url,
            leaderboard_rank: record.leaderboard_rank,
            rank_tier: record.rank_tier,
            previous_leaderboard_rank: record.previous_leaderboard_rank,
            previous_rank_tier: record.previous_rank_tier,
            win: record.win,
            lose: record.lose,
            skill_score: record.skill_score,
            last_updated: record.last_updated.map(format_timestamp),
            last_change: record.last_change.map(format_timestamp),
        }
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    fn payload(raw: &str) -> MemberPayload {
        serde_json::from_str(raw).unwrap()
    }

    #[test]
    fn add_request_defaults_to_full_ladder_check() {
        let request: AddMemberRequest =
            serde_json::from_str(r#"{ "member": { "account_id": "123" } }"#).unwrap();
        let options = request.options();
        assert!(options.check_ladder && options.refresh_player && options.include_win_loss);
        assert!(request.validate().is_ok());
    }

    #[test]
    fn payload_validation_collects_field_errors() {
        let invalid = payload(r#"{ "account_id": "12ab", "email": "nope", "position": 7 }"#);
        let errors = invalid.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("account_id"));
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("position"));

        let valid = payload(r#"{ "account_id": " 42 ", "email": "ana@example.com", "position": 2 }"#);
        assert!(valid.validate().is_ok());
    }

    #[test]
    fn payload_maps_to_member_input() {
        let input = MemberInput::from(payload(
            r#"{ "account_id": " 42 ", "position": 4, "twitch": "ana_tv", "captain": true }"#,
        ));
        assert_eq!(input.account_id, "42");
        assert_eq!(input.position, Position::SoftSupport);
        assert_eq!(input.socials.twitch.as_deref(), Some("ana_tv"));
        assert!(input.captain);
        assert_eq!(input.enabled, None);
    }

    #[test]
    fn summary_formats_timestamps() {
        let mut record = MemberRecord::new("Ana", "42");
        record.last_updated = Some(datetime!(2024-03-01 10:30 UTC));
        let summary = MemberSummary::from(record);
        assert_eq!(summary.last_updated.as_deref(), Some("2024-03-01T10:30:00Z"));
        assert_eq!(summary.last_change, None);
    }
}
