//! Leaderboard text for Discord.
//!
//! Everything here is pure: [`build_ranking`] turns a roster into a
//! [`RankingBoard`] that the Discord shell posts and the HTTP shell previews.

use std::{cmp::Ordering, collections::HashSet};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::dao::models::{MemberRecord, Position};

/// Lines per posted message.
pub const RANKING_CHUNK_SIZE: usize = 8;
/// Chunks posted directly in the channel; the rest go to the overflow thread.
pub const INLINE_CHUNK_COUNT: usize = 2;
/// Display names are cut or padded to this many characters.
pub const NAME_WIDTH: usize = 12;

/// Header of the first message.
pub const RANKING_TITLE: &str = "**Ascendia ranking**";
/// Sole message when nobody is ranked.
pub const NO_MEMBERS_MESSAGE: &str = "No ranked members to show.";
/// Posted before the overflow thread opens.
pub const OVERFLOW_CAPTION: &str = "Full ranking continues in the thread below.";

/// Emoji markup per rank medal and per position.
///
/// Values are inserted verbatim, so Discord custom emoji markup such as
/// `<:rank_8:1234567890>` works as well as plain unicode.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EmojiCatalog {
    /// Indexed by medal, `0` (unranked) through `8` (top tier).
    pub ranks: Vec<String>,
    /// Indexed by position code, `0` (unknown) through `5`.
    pub positions: Vec<String>,
}

impl Default for EmojiCatalog {
    fn default() -> Self {
        let owned = |items: &[&str]| items.iter().map(|item| item.to_string()).collect();
        Self {
            ranks: owned(&["⚫", "🟤", "⚪", "🟢", "🔵", "🟣", "🟡", "🟠", "🏆"]),
            positions: owned(&["❔", "1️⃣", "2️⃣", "3️⃣", "4️⃣", "5️⃣"]),
        }
    }
}

impl EmojiCatalog {
    /// Medal emoji for a rank tier; uncalibrated players get the first entry.
    pub fn rank(&self, tier: Option<u32>) -> &str {
        let medal = match tier.unwrap_or(0) {
            80 => 8,
            tier @ 10..=79 => (tier / 10) as usize,
            _ => 0,
        };
        self.ranks.get(medal).map(String::as_str).unwrap_or_default()
    }

    /// Emoji for a preferred position.
    pub fn position(&self, position: Position) -> &str {
        self.positions
            .get(usize::from(position.code()))
            .map(String::as_str)
            .unwrap_or_default()
    }
}

/// Rendered leaderboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct RankingBoard {
    /// Members listed.
    pub member_count: usize,
    /// Messages posted directly in the channel, in order.
    pub messages: Vec<String>,
    /// Remaining entries when the leaderboard outgrows the inline chunks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overflow: Option<RankingThread>,
}

/// Overflow part of the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct RankingThread {
    /// Posted in the channel right before the thread is opened.
    pub caption: String,
    /// Thread title.
    pub name: String,
    /// Messages posted inside the thread.
    pub messages: Vec<String>,
}

impl RankingBoard {
    /// Board announcing that nobody is ranked.
    pub fn empty() -> Self {
        Self {
            member_count: 0,
            messages: vec![NO_MEMBERS_MESSAGE.to_string()],
            overflow: None,
        }
    }

    /// Whether the board lists no members.
    pub fn is_empty(&self) -> bool {
        self.member_count == 0
    }
}

/// Leaderboard order: rank tier descending, then leaderboard rank ascending.
/// Missing values sort last and a leaderboard rank of `0` counts as missing.
pub fn ranking_order(a: &MemberRecord, b: &MemberRecord) -> Ordering {
    standing_order(
        (a.rank_tier, a.leaderboard_rank),
        (b.rank_tier, b.leaderboard_rank),
    )
}

fn standing_order(a: (Option<u32>, Option<u32>), b: (Option<u32>, Option<u32>)) -> Ordering {
    let tier = match (a.0, b.0) {
        (Some(x), Some(y)) => y.cmp(&x),
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
    };
    tier.then_with(|| {
        match (a.1.filter(|rank| *rank > 0), b.1.filter(|rank| *rank > 0)) {
            (Some(x), Some(y)) => x.cmp(&y),
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
        }
    })
}

/// Members shown on the leaderboard, in display order.
///
/// Only players holding both a rank tier and a leaderboard rank are listed.
pub fn ranked_members(members: &[MemberRecord], include_banned: bool) -> Vec<&MemberRecord> {
    let mut seen = HashSet::new();
    let mut ranked = members
        .iter()
        .filter(|member| include_banned || member.enabled)
        .filter(|member| member.rank_tier.is_some_and(|tier| tier > 0))
        .filter(|member| member.leaderboard_rank.is_some_and(|rank| rank > 0))
        .filter(|member| seen.insert(member.account_id.as_str()))
        .collect::<Vec<_>>();
    ranked.sort_by(|a, b| ranking_order(a, b));
    ranked
}

/// `"{games} | {pct}%"`, or `"{games} | --"` without games. Halves round to even.
pub fn win_rate_label(win: u32, lose: u32) -> String {
    let total = win.saturating_add(lose);
    if total == 0 {
        return format!("{total} | --");
    }
    let pct = (f64::from(win) * 100.0 / f64::from(total)).round_ties_even() as u32;
    format!("{total} | {pct}%")
}

/// Movement since the last recorded change: `▲` up, `▼` down, `=` same, `✦` no history.
pub fn change_glyph(member: &MemberRecord) -> char {
    if member.previous_rank_tier.is_none() && member.previous_leaderboard_rank.is_none() {
        return '✦';
    }
    let current = (member.rank_tier, member.leaderboard_rank);
    let previous = (member.previous_rank_tier, member.previous_leaderboard_rank);
    match standing_order(current, previous) {
        Ordering::Less => '▲',
        Ordering::Greater => '▼',
        Ordering::Equal => '=',
    }
}

fn fit_name(name: &str) -> String {
    let cut = name.trim().chars().take(NAME_WIDTH).collect::<String>();
    format!("{cut:<NAME_WIDTH$}")
}

/// One leaderboard line: medal, leaderboard rank, trend, role, name and record.
pub fn ranking_line(member: &MemberRecord, emojis: &EmojiCatalog) -> String {
    let leaderboard = member
        .leaderboard_rank
        .filter(|rank| *rank > 0)
        .map(|rank| rank.to_string())
        .unwrap_or_else(|| "-".to_string());
    format!(
        "{} `{:>4}` {} {} `{}` `{}`",
        emojis.rank(member.rank_tier),
        leaderboard,
        change_glyph(member),
        emojis.position(member.position),
        fit_name(&member.display_name),
        win_rate_label(member.win, member.lose),
    )
}

fn column_header(number_width: usize) -> String {
    format!(
        "`{:#<number_width$}` `  ` `RANK` `  ` `  ` `{:<NAME_WIDTH$}` `GAMES | WR`",
        "", "NICK"
    )
}

fn numbered_chunk(lines: &[String], next: &mut usize, width: usize) -> String {
    lines
        .iter()
        .map(|line| {
            let numbered = format!("`{:0width$}` {line}", *next);
            *next += 1;
            numbered
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Lay out the leaderboard into postable messages.
pub fn build_ranking(
    members: &[MemberRecord],
    include_banned: bool,
    emojis: &EmojiCatalog,
) -> RankingBoard {
    let lines = ranked_members(members, include_banned)
        .into_iter()
        .map(|member| ranking_line(member, emojis))
        .collect::<Vec<_>>();
    if lines.is_empty() {
        return RankingBoard::empty();
    }

    let chunks = lines.chunks(RANKING_CHUNK_SIZE).collect::<Vec<_>>();
    let mut next = 1;

    let mut messages = vec![RANKING_TITLE.to_string(), column_header(2)];
    messages.extend(
        chunks
            .iter()
            .take(INLINE_CHUNK_COUNT)
            .map(|chunk| numbered_chunk(chunk, &mut next, 2)),
    );

    let overflow = (chunks.len() > INLINE_CHUNK_COUNT).then(|| {
        let mut thread_messages = vec![column_header(3)];
        thread_messages.extend(
            chunks[INLINE_CHUNK_COUNT..]
                .iter()
                .map(|chunk| numbered_chunk(chunk, &mut next, 3)),
        );
        RankingThread {
            caption: OVERFLOW_CAPTION.to_string(),
            name: format!("Full ranking ({} players)", lines.len()),
            messages: thread_messages,
        }
    });

    RankingBoard {
        member_count: lines.len(),
        messages,
        overflow,
    }
}
