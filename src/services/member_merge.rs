//! Projection of ladder data onto roster records.

use time::OffsetDateTime;

use crate::{
    dao::models::MemberRecord,
    ladder::{PlayerProfile, WinLoss},
};

/// Skill rating awarded to the top medal, which has no stars.
const TOP_MEDAL_SCORE: u32 = 5620;
const MEDAL_STEP: u32 = 770;
const STAR_STEP: u32 = 154;

/// Estimated skill rating for a profile.
///
/// Reported solo rating wins, then the party rating, then an estimate from the
/// rank tier (`medal * 10 + stars`). Unranked players have no score.
pub fn skill_score(profile: &PlayerProfile) -> Option<u32> {
    profile
        .solo_competitive_rank
        .or(profile.competitive_rank)
        .or_else(|| profile.rank_tier.and_then(tier_estimate))
}

fn tier_estimate(tier: u32) -> Option<u32> {
    let medal = tier / 10;
    let stars = tier % 10;
    match medal {
        8 => Some(TOP_MEDAL_SCORE),
        1..=7 => Some((medal - 1) * MEDAL_STEP + stars.min(5) * STAR_STEP),
        _ => None,
    }
}

/// Merge freshly fetched ladder data over `previous`.
///
/// Field precedence:
/// - identity fields (id, names, contact, team, position, notes, socials, enabled) always come
///   from `previous`;
/// - with a profile, rank tier and leaderboard rank take the fetched values. When either
///   differs from `previous`, the old pair moves to `previous_*` and `last_change` becomes
///   `now`; otherwise both carry forward;
/// - persona name, avatar and profile URL take the fetched value when present, else keep
///   the previous one;
/// - `skill_score` is recomputed from the profile;
/// - win/lose take `win_loss` when present, else carry forward;
/// - `last_updated` becomes `now` only when a profile was fetched.
pub fn merge_member_record(
    previous: &MemberRecord,
    profile: Option<&PlayerProfile>,
    win_loss: Option<WinLoss>,
    now: OffsetDateTime,
) -> MemberRecord {
    let mut merged = previous.clone();

    if let Some(profile) = profile {
        let changed = profile.rank_tier != previous.rank_tier
            || profile.leaderboard_rank != previous.leaderboard_rank;
        if changed {
            merged.previous_rank_tier = previous.rank_tier;
            merged.previous_leaderboard_rank = previous.leaderboard_rank;
            merged.last_change = Some(now);
        }
        merged.rank_tier = profile.rank_tier;
        merged.leaderboard_rank = profile.leaderboard_rank;

        if let Some(steam) = profile.profile.as_ref() {
            if let Some(name) = profile.persona_name() {
                merged.account_name = Some(name.to_string());
            }
            if let Some(avatar) = steam.avatar.as_ref().filter(|url| !url.is_empty()) {
                merged.avatar_url = Some(avatar.clone());
            }
            if let Some(url) = steam.profile_url.as_ref().filter(|url| !url.is_empty()) {
                merged.profile_url = Some(url.clone());
            }
        }

        merged.skill_score = skill_score(profile);
        merged.last_updated = Some(now);
    }

    if let Some(record) = win_loss {
        merged.win = record.win;
        merged.lose = record.lose;
    }

    merged
}
