//! Roster orchestration: the in-memory roster, member edits and the bulk ladder update.

use std::{
    collections::BTreeMap,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use serde::de::DeserializeOwned;
use time::OffsetDateTime;
use tokio::{sync::RwLock, time::sleep};
use tracing::{debug, info, warn};

use crate::{
    dao::{
        cache::{LocalCache, MEMBERS_CACHE_KEY, SETTINGS_CACHE_KEY},
        models::{GuildSettings, MemberRecord, Position, SocialHandles},
        roster_store::RosterStore,
    },
    error::ServiceError,
    ladder::{LadderApi, PlayerProfile, RegionGroup, WinLoss, region_group},
    services::{
        member_merge::merge_member_record, operations::CancelToken, progress::ProgressSink,
    },
};

/// Pause after a rate-limited ladder call before retrying the same step.
pub const DEFAULT_RATE_LIMIT_BACKOFF: Duration = Duration::from_secs(65);
/// Rate-limit back-offs allowed per member before it is skipped for the pass.
pub const DEFAULT_MAX_RATE_LIMIT_RETRIES: u32 = 10;
/// Pause between ladder calls when adding a single member.
pub const DEFAULT_STEP_PAUSE: Duration = Duration::from_secs(2);
/// Display name used when neither the caller nor the ladder provides one.
pub const DEFAULT_PLAYER_NAME: &str = "Unknown player";
/// Upper bound on matches inspected by region detection.
pub const MAX_REGION_SAMPLE: u32 = 20;

/// Progress line emitted when a cancel request is observed.
pub const CANCELLING_MESSAGE: &str = "Cancelling operation...";

/// Pacing of the bulk ladder update.
#[derive(Debug, Clone)]
pub struct CommunitySettings {
    /// Pause after a rate-limited ladder response.
    pub rate_limit_backoff: Duration,
    /// `None` retries rate-limited calls until cancelled.
    pub max_rate_limit_retries: Option<u32>,
    /// Pause between members.
    pub step_pause: Duration,
}

impl Default for CommunitySettings {
    fn default() -> Self {
        Self {
            rate_limit_backoff: DEFAULT_RATE_LIMIT_BACKOFF,
            max_rate_limit_retries: Some(DEFAULT_MAX_RATE_LIMIT_RETRIES),
            step_pause: DEFAULT_STEP_PAUSE,
        }
    }
}

/// User-supplied identity fields for adding or editing a member.
#[derive(Debug, Clone, Default)]
pub struct MemberInput {
    /// Blank keeps the current name on edit and falls back to the persona name on add.
    pub display_name: Option<String>,
    /// Steam account id of the player.
    pub account_id: String,
    /// Defaults to enabled when unset.
    pub enabled: Option<bool>,
    /// Team name.
    pub team: Option<String>,
    /// Contact phone.
    pub phone: Option<String>,
    /// Contact email.
    pub email: Option<String>,
    /// Country of residence.
    pub country: Option<String>,
    /// Team captain flag.
    pub captain: bool,
    /// Preferred position.
    pub position: Position,
    /// Free-form notes.
    pub notes: Option<String>,
    /// Social-media handles.
    pub socials: SocialHandles,
}

impl MemberInput {
    fn apply_to(&self, record: &mut MemberRecord) {
        if let Some(name) = non_blank(self.display_name.as_deref()) {
            record.display_name = name;
        }
        record.account_id = self.account_id.trim().to_string();
        if let Some(enabled) = self.enabled {
            record.enabled = enabled;
        }
        record.team = non_blank(self.team.as_deref());
        record.phone = non_blank(self.phone.as_deref());
        record.email = non_blank(self.email.as_deref());
        record.country = non_blank(self.country.as_deref());
        record.captain = self.captain;
        record.position = self.position;
        record.notes = non_blank(self.notes.as_deref());
        record.socials = SocialHandles {
            twitch: non_blank(self.socials.twitch.as_deref()),
            twitter: non_blank(self.socials.twitter.as_deref()),
            instagram: non_blank(self.socials.instagram.as_deref()),
            youtube: non_blank(self.socials.youtube.as_deref()),
            tiktok: non_blank(self.socials.tiktok.as_deref()),
        };
    }
}

/// Ladder lookups performed when a member is added.
#[derive(Debug, Clone, Copy)]
pub struct AddOptions {
    /// Fetch the profile from the ladder before saving.
    pub check_ladder: bool,
    /// Ask the ladder to re-scan the player first.
    pub refresh_player: bool,
    /// Also fetch win/loss totals.
    pub include_win_loss: bool,
}

impl Default for AddOptions {
    fn default() -> Self {
        Self {
            check_ladder: true,
            refresh_player: true,
            include_win_loss: true,
        }
    }
}

/// Parameters of a bulk roster update.
#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateRequest {
    /// Refresh win/loss totals too.
    pub include_win_loss: bool,
    /// Members fetched more recently than this are skipped; `0` selects everyone.
    pub stale_after_minutes: u32,
}

/// Result of a single roster mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome<T> {
    /// The store accepted the change.
    Applied(T),
    /// Another roster operation was running; nothing happened.
    Busy,
    /// The roster store did not accept the change.
    Rejected,
}

impl<T> MutationOutcome<T> {
    /// Collapse into a `Result` for callers that report busy and rejected outcomes as errors.
    pub fn into_result(self) -> Result<T, ServiceError> {
        match self {
            MutationOutcome::Applied(value) => Ok(value),
            MutationOutcome::Busy => Err(ServiceError::Busy),
            MutationOutcome::Rejected => Err(ServiceError::Upstream(
                "roster store rejected the change".into(),
            )),
        }
    }
}

/// How a bulk update ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Another operation held the roster.
    Busy,
    /// Every selected member was processed.
    Completed {
        /// Rows the store accepted.
        written: usize,
    },
    /// Stopped early; rows fetched before the cancel were still saved.
    Cancelled {
        /// Rows the store accepted.
        written: usize,
    },
}

/// Play-region estimate from recent matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionEstimate {
    /// Account the estimate is for.
    pub account_id: String,
    /// Most frequent region group among the sampled matches.
    pub region: Option<RegionGroup>,
    /// Matches whose details were fetched successfully.
    pub matches_sampled: usize,
    /// Match count per region group, most frequent first.
    pub counts: Vec<(RegionGroup, usize)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LadderStep {
    Refresh,
    Profile,
    WinLoss,
}

enum EntityOutcome {
    Fetched {
        profile: PlayerProfile,
        win_loss: Option<WinLoss>,
    },
    Abandoned,
    Cancelled,
}

struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Owner of the roster and guild settings.
pub struct CommunityService {
    store: Arc<dyn RosterStore>,
    ladder: Arc<dyn LadderApi>,
    cache: LocalCache,
    settings: CommunitySettings,
    members: RwLock<Vec<MemberRecord>>,
    guilds: RwLock<Vec<GuildSettings>>,
    busy: AtomicBool,
}

impl CommunityService {
    /// Service with an empty roster; call [`Self::initialize_from_cache`] before serving.
    pub fn new(
        store: Arc<dyn RosterStore>,
        ladder: Arc<dyn LadderApi>,
        cache: LocalCache,
        settings: CommunitySettings,
    ) -> Self {
        Self {
            store,
            ladder,
            cache,
            settings,
            members: RwLock::new(Vec::new()),
            guilds: RwLock::new(Vec::new()),
            busy: AtomicBool::new(false),
        }
    }

    /// Whether a roster mutation or bulk update is running.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    fn try_busy(&self) -> Option<BusyGuard<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| BusyGuard(&self.busy))
    }

    /// Whether the roster store has credentials.
    pub fn store_configured(&self) -> bool {
        self.store.is_configured()
    }

    /// Pings the roster store.
    pub async fn store_health(&self) -> Result<(), ServiceError> {
        if !self.store.is_configured() {
            return Err(ServiceError::Degraded);
        }
        self.store.health_check().await?;
        Ok(())
    }

    /// Load the last cached roster and guild settings, returning how many of each were found.
    pub async fn initialize_from_cache(&self) -> (usize, usize) {
        let members = self
            .read_cached::<Vec<MemberRecord>>(MEMBERS_CACHE_KEY)
            .await
            .map(|mut members| {
                sort_by_display_name(&mut members);
                members
            })
            .unwrap_or_default();
        let guilds = self
            .read_cached::<Vec<GuildSettings>>(SETTINGS_CACHE_KEY)
            .await
            .unwrap_or_default();

        let counts = (members.len(), guilds.len());
        *self.members.write().await = members;
        *self.guilds.write().await = guilds;
        info!(members = counts.0, guilds = counts.1, "roster initialised from cache");
        counts
    }

    async fn read_cached<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.cache.read(key).await?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(key, error = %err, "ignoring unreadable cache entry");
                None
            }
        }
    }

    /// Current roster, reloading from the store when empty or `force_refresh` is set.
    ///
    /// While another roster operation runs the in-memory snapshot is returned as is.
    pub async fn members(&self, force_refresh: bool) -> Result<Vec<MemberRecord>, ServiceError> {
        let Some(_guard) = self.try_busy() else {
            debug!("roster busy; returning snapshot");
            return Ok(self.members.read().await.clone());
        };
        self.reload_members(force_refresh).await
    }

    async fn reload_members(&self, force_refresh: bool) -> Result<Vec<MemberRecord>, ServiceError> {
        let needs_reload = force_refresh || self.members.read().await.is_empty();
        if needs_reload && self.store.is_configured() {
            let mut records = self.store.list_members().await?;
            sort_by_display_name(&mut records);
            debug!(count = records.len(), "roster reloaded from store");
            *self.members.write().await = records;
            self.save_members_cache().await;
        }
        Ok(self.members.read().await.clone())
    }

    /// All guild settings; `force_refresh` fetches them from the store first.
    pub async fn guild_settings_list(
        &self,
        force_refresh: bool,
    ) -> Result<Vec<GuildSettings>, ServiceError> {
        let needs_reload = force_refresh || self.guilds.read().await.is_empty();
        if needs_reload && self.store.is_configured() {
            let rows = self.store.list_guild_settings().await?;
            if !rows.is_empty() {
                *self.guilds.write().await = rows;
                self.save_settings_cache().await;
            }
        }
        Ok(self.guilds.read().await.clone())
    }

    /// Settings for one guild, if configured.
    pub async fn guild_settings(&self, guild_id: u64) -> Option<GuildSettings> {
        self.guilds
            .read()
            .await
            .iter()
            .find(|settings| settings.guild_id == guild_id)
            .cloned()
    }

    /// Whether a loaded member already uses this account id.
    pub async fn member_exists(&self, account_id: &str) -> bool {
        let account_id = account_id.trim();
        self.members
            .read()
            .await
            .iter()
            .any(|member| member.account_id == account_id)
    }

    /// Track a new player, optionally seeding ladder data.
    pub async fn add_member(
        &self,
        input: MemberInput,
        options: AddOptions,
        progress: &dyn ProgressSink,
    ) -> Result<MutationOutcome<MemberRecord>, ServiceError> {
        let account_id = validate_account_id(&input.account_id)?;
        let Some(_guard) = self.try_busy() else {
            return Ok(MutationOutcome::Busy);
        };
        // An empty roster may only mean the cache was missing; check the store.
        self.reload_members(false).await?;
        if self.member_exists(&account_id).await {
            return Err(ServiceError::InvalidInput(format!(
                "player {account_id} is already tracked"
            )));
        }

        let mut draft = MemberRecord::new(String::new(), account_id.clone());
        input.apply_to(&mut draft);

        let (profile, win_loss) = if options.check_ladder {
            self.fetch_new_member(&account_id, options, progress).await
        } else {
            (None, None)
        };

        let mut record = merge_member_record(
            &draft,
            profile.as_ref(),
            win_loss,
            OffsetDateTime::now_utc(),
        );
        if record.display_name.trim().is_empty() {
            record.display_name = profile
                .as_ref()
                .and_then(PlayerProfile::persona_name)
                .unwrap_or(DEFAULT_PLAYER_NAME)
                .to_string();
        }

        progress.notify("Saving member to the roster");
        let created = self.store.create_members(vec![record]).await?;
        let Some(created) = created.into_iter().next() else {
            warn!(account_id = %account_id, "roster store did not create member");
            return Ok(MutationOutcome::Rejected);
        };

        {
            let mut members = self.members.write().await;
            members.push(created.clone());
            sort_by_display_name(&mut members);
        }
        self.save_members_cache().await;
        info!(account_id = %account_id, id = %created.id, "member added");
        Ok(MutationOutcome::Applied(created))
    }

    async fn fetch_new_member(
        &self,
        account_id: &str,
        options: AddOptions,
        progress: &dyn ProgressSink,
    ) -> (Option<PlayerProfile>, Option<WinLoss>) {
        let pause = self.settings.step_pause;

        if options.refresh_player {
            progress.notify("Refreshing player on the ladder");
            let response = self.ladder.refresh_player(account_id).await;
            if !response.valid {
                debug!(account_id, rate_limited = response.rate_limited, "refresh not accepted");
            }
            sleep(pause).await;
        }

        progress.notify("Checking ladder profile");
        let response = self.ladder.player(account_id).await;
        sleep(pause).await;
        let Some(profile) = response.value else {
            progress.notify("Player not found on the ladder");
            sleep(pause).await;
            return (None, None);
        };

        if !options.include_win_loss {
            return (Some(profile), None);
        }

        progress.notify("Checking win/loss record");
        let response = self.ladder.win_loss(account_id).await;
        sleep(pause).await;
        if response.value.is_none() {
            progress.notify("Win/loss record not available");
            sleep(pause).await;
        }
        (Some(profile), response.value)
    }

    /// Overwrite the identity fields of member `id`, keeping its ladder data.
    pub async fn edit_member(
        &self,
        id: &str,
        input: MemberInput,
    ) -> Result<MutationOutcome<MemberRecord>, ServiceError> {
        let account_id = validate_account_id(&input.account_id)?;
        let Some(_guard) = self.try_busy() else {
            return Ok(MutationOutcome::Busy);
        };

        let updated = {
            let members = self.members.read().await;
            let existing = members
                .iter()
                .find(|member| !id.is_empty() && member.id == id)
                .ok_or_else(|| ServiceError::NotFound(format!("member {id}")))?;
            if members
                .iter()
                .any(|member| member.id != id && member.account_id == account_id)
            {
                return Err(ServiceError::InvalidInput(format!(
                    "player {account_id} is already tracked"
                )));
            }
            let mut updated = existing.clone();
            input.apply_to(&mut updated);
            updated
        };

        let written = self.store.update_members(vec![updated.clone()]).await?;
        if written == 0 {
            return Ok(MutationOutcome::Rejected);
        }

        {
            let mut members = self.members.write().await;
            if let Some(slot) = members.iter_mut().find(|member| member.id == id) {
                *slot = updated.clone();
            }
            sort_by_display_name(&mut members);
        }
        self.save_members_cache().await;
        info!(id, "member edited");
        Ok(MutationOutcome::Applied(updated))
    }

    /// Delete a member from the store, then from memory and the cache.
    pub async fn remove_member(&self, id: &str) -> Result<MutationOutcome<()>, ServiceError> {
        let Some(_guard) = self.try_busy() else {
            return Ok(MutationOutcome::Busy);
        };

        if !self.store.delete_member(id.to_string()).await? {
            return Ok(MutationOutcome::Rejected);
        }

        self.members.write().await.retain(|member| member.id != id);
        self.save_members_cache().await;
        info!(id, "member removed");
        Ok(MutationOutcome::Applied(()))
    }

    /// Refresh ladder data for every stale, enabled member and write the results in one batch.
    pub async fn update_members(
        &self,
        request: UpdateRequest,
        progress: &dyn ProgressSink,
        cancel: &CancelToken,
    ) -> Result<UpdateOutcome, ServiceError> {
        let Some(_guard) = self.try_busy() else {
            return Ok(UpdateOutcome::Busy);
        };

        info!("refreshing roster before ladder update");
        let members = self.reload_members(true).await?;
        let candidates = select_candidates(
            &members,
            request.stale_after_minutes,
            OffsetDateTime::now_utc(),
        );
        if request.stale_after_minutes > 0 && candidates.len() < members.len() {
            info!(
                skipped = members.len() - candidates.len(),
                "members up to date or disabled; skipped"
            );
        }

        let total = candidates.len();
        let mut updated = Vec::with_capacity(total);
        let mut cancelled = false;

        for (index, member) in candidates.iter().enumerate() {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            let position = index + 1;
            progress.notify(&format!(
                "Updating {position}/{total}: {}",
                member.display_name
            ));
            if member.account_id.trim().is_empty() {
                warn!(id = %member.id, "member has no account id; skipping");
                continue;
            }

            match self
                .fetch_ladder_update(member, request.include_win_loss, position, total, progress, cancel)
                .await
            {
                EntityOutcome::Fetched { profile, win_loss } => {
                    let record = merge_member_record(
                        member,
                        Some(&profile),
                        win_loss,
                        OffsetDateTime::now_utc(),
                    );
                    info!(account_id = %member.account_id, rank_tier = ?record.rank_tier, "member ladder data fetched");
                    updated.push(record);
                }
                EntityOutcome::Abandoned => {}
                EntityOutcome::Cancelled => {
                    cancelled = true;
                    break;
                }
            }
        }

        let attempted = updated.len();
        let written = if updated.is_empty() {
            0
        } else {
            self.store.update_members(updated.clone()).await?
        };
        if written == attempted {
            self.apply_updates(updated).await;
        } else {
            warn!(written, attempted, "roster store rejected part of the update; reloading roster");
            if let Err(err) = self.reload_members(true).await {
                warn!(error = %err, "roster reload after partial write failed");
            }
        }

        info!(written, cancelled, "ladder update finished");
        Ok(if cancelled {
            UpdateOutcome::Cancelled { written }
        } else {
            UpdateOutcome::Completed { written }
        })
    }

    /// Walk refresh, profile and win/loss for one member, backing off on rate limits.
    async fn fetch_ladder_update(
        &self,
        member: &MemberRecord,
        include_win_loss: bool,
        position: usize,
        total: usize,
        progress: &dyn ProgressSink,
        cancel: &CancelToken,
    ) -> EntityOutcome {
        let account_id = member.account_id.trim();
        let mut step = LadderStep::Refresh;
        let mut profile: Option<PlayerProfile> = None;
        let mut backoffs = 0u32;

        loop {
            let rate_limited = match step {
                LadderStep::Refresh => {
                    let response = self.ladder.refresh_player(account_id).await;
                    if response.rate_limited {
                        true
                    } else if response.valid {
                        step = LadderStep::Profile;
                        false
                    } else {
                        warn!(account_id, "ladder refresh failed; skipping member");
                        return EntityOutcome::Abandoned;
                    }
                }
                LadderStep::Profile => {
                    let response = self.ladder.player(account_id).await;
                    if response.rate_limited {
                        true
                    } else {
                        let Some(fetched) = response.value else {
                            warn!(account_id, "ladder profile unavailable; skipping member");
                            return EntityOutcome::Abandoned;
                        };
                        if !include_win_loss {
                            return EntityOutcome::Fetched {
                                profile: fetched,
                                win_loss: None,
                            };
                        }
                        profile = Some(fetched);
                        step = LadderStep::WinLoss;
                        false
                    }
                }
                LadderStep::WinLoss => {
                    let response = self.ladder.win_loss(account_id).await;
                    if response.rate_limited {
                        true
                    } else {
                        return match (profile.take(), response.value) {
                            (Some(profile), Some(record)) => EntityOutcome::Fetched {
                                profile,
                                win_loss: Some(record),
                            },
                            _ => {
                                warn!(account_id, "win/loss record unavailable; skipping member");
                                EntityOutcome::Abandoned
                            }
                        };
                    }
                }
            };

            if !rate_limited {
                continue;
            }

            backoffs += 1;
            if self
                .settings
                .max_rate_limit_retries
                .is_some_and(|max| backoffs > max)
            {
                warn!(account_id, backoffs, "rate limit retries exhausted; skipping member");
                return EntityOutcome::Abandoned;
            }

            let message = format!(
                "Request limit reached ({position}/{total}), waiting {:?} before retrying",
                self.settings.rate_limit_backoff
            );
            info!(account_id, step = ?step, "{message}");
            progress.notify(&message);

            tokio::select! {
                _ = sleep(self.settings.rate_limit_backoff) => {
                    debug!(account_id, "back-off finished");
                }
                _ = cancel.cancelled() => {
                    progress.notify(CANCELLING_MESSAGE);
                    return EntityOutcome::Cancelled;
                }
            }
        }
    }

    async fn apply_updates(&self, updated: Vec<MemberRecord>) {
        if updated.is_empty() {
            return;
        }
        {
            let mut members = self.members.write().await;
            for record in updated {
                if let Some(slot) = members.iter_mut().find(|member| member.id == record.id) {
                    *slot = record;
                }
            }
        }
        self.save_members_cache().await;
    }

    /// Guess the player's home region from the servers of their recent matches.
    pub async fn detect_region(
        &self,
        account_id: &str,
        sample: u32,
    ) -> Result<RegionEstimate, ServiceError> {
        let account_id = validate_account_id(account_id)?;
        let sample = sample.clamp(1, MAX_REGION_SAMPLE);

        let response = self.ladder.player_matches(&account_id, sample).await;
        if response.rate_limited {
            return Err(ServiceError::Upstream("ladder rate limit reached".into()));
        }
        let Some(matches) = response.value else {
            return Err(ServiceError::Upstream("match history unavailable".into()));
        };

        let mut counts: BTreeMap<RegionGroup, usize> = BTreeMap::new();
        let mut matches_sampled = 0;
        for recent in matches.iter().take(sample as usize) {
            let details = self.ladder.match_details(recent.match_id).await;
            if details.rate_limited {
                warn!(account_id = %account_id, "rate limited during region detection; using partial sample");
                break;
            }
            let Some(region) = details.value.and_then(|details| details.region) else {
                continue;
            };
            matches_sampled += 1;
            if let Some(group) = region_group(region) {
                *counts.entry(group).or_default() += 1;
            }
        }

        // Ties resolve to the first group in declaration order.
        let region = counts
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
            .map(|(group, _)| *group);

        Ok(RegionEstimate {
            account_id,
            region,
            matches_sampled,
            counts: counts.into_iter().collect(),
        })
    }

    /// Number of ranked players reported by the ladder.
    pub async fn ranked_player_count(&self) -> Result<u64, ServiceError> {
        let response = self.ladder.distributions().await;
        if response.rate_limited {
            return Err(ServiceError::Upstream("ladder rate limit reached".into()));
        }
        response
            .value
            .map(|distributions| distributions.ranked_players())
            .ok_or_else(|| ServiceError::Upstream("distributions unavailable".into()))
    }

    async fn save_members_cache(&self) {
        let members = self.members.read().await.clone();
        self.write_cache(MEMBERS_CACHE_KEY, &members).await;
    }

    async fn save_settings_cache(&self) {
        let guilds = self.guilds.read().await.clone();
        self.write_cache(SETTINGS_CACHE_KEY, &guilds).await;
    }

    async fn write_cache<T: serde::Serialize>(&self, key: &str, rows: &[T]) {
        if rows.is_empty() {
            return;
        }
        match serde_json::to_string(rows) {
            Ok(json) => self.cache.write(key, &json).await,
            Err(err) => warn!(key, error = %err, "failed to serialise cache entry"),
        }
    }
}

/// Enabled members whose ladder data is older than `stale_after_minutes`, stalest first.
pub fn select_candidates(
    members: &[MemberRecord],
    stale_after_minutes: u32,
    now: OffsetDateTime,
) -> Vec<MemberRecord> {
    let cutoff = now - time::Duration::minutes(i64::from(stale_after_minutes));
    let mut candidates = members
        .iter()
        .filter(|member| member.enabled)
        .filter(|member| {
            stale_after_minutes == 0
                || member
                    .last_updated
                    .is_none_or(|updated| updated <= cutoff)
        })
        .cloned()
        .collect::<Vec<_>>();
    // `None` sorts before `Some`, so never-fetched members go first.
    candidates.sort_by_key(|member| member.last_updated);
    candidates
}

fn validate_account_id(raw: &str) -> Result<String, ServiceError> {
    let account_id = raw.trim();
    if account_id.is_empty() {
        return Err(ServiceError::InvalidInput("account id is required".into()));
    }
    if !account_id.chars().all(|c| c.is_ascii_digit()) {
        return Err(ServiceError::InvalidInput(format!(
            "account id `{account_id}` must be numeric"
        )));
    }
    Ok(account_id.to_string())
}

fn sort_by_display_name(members: &mut [MemberRecord]) {
    members.sort_by_cached_key(|member| member.display_name.to_lowercase());
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering as AtomicOrdering;

    use time::macros::datetime;
    use tokio::sync::mpsc;

    use super::*;
    use crate::{
        ladder::{LadderResponse, RateLimitQuota},
        services::{
            operations::CancelSource,
            progress::LogProgress,
            test_support::{FakeLadder, FakeStore},
        },
    };

    fn member(id: &str, name: &str, account_id: &str) -> MemberRecord {
        let mut record = MemberRecord::new(name, account_id);
        record.id = id.to_string();
        record
    }

    fn fast_settings() -> CommunitySettings {
        CommunitySettings {
            rate_limit_backoff: Duration::from_millis(5),
            max_rate_limit_retries: Some(10),
            step_pause: Duration::ZERO,
        }
    }

    fn service(
        store: Arc<FakeStore>,
        ladder: Arc<FakeLadder>,
        dir: &tempfile::TempDir,
        settings: CommunitySettings,
    ) -> CommunityService {
        CommunityService::new(store, ladder, LocalCache::new(dir.path()), settings)
    }

    #[test]
    fn candidates_skip_disabled_and_fresh_members() {
        let now = datetime!(2024-03-10 12:00 UTC);
        let mut fresh = member("r1", "Fresh", "1");
        fresh.last_updated = Some(datetime!(2024-03-10 11:50 UTC));
        let mut stale = member("r2", "Stale", "2");
        stale.last_updated = Some(datetime!(2024-03-08 12:00 UTC));
        let never = member("r3", "Never", "3");
        let mut banned = member("r4", "Banned", "4");
        banned.enabled = false;
        let roster = vec![fresh, stale, never, banned];

        let names = |selected: Vec<MemberRecord>| {
            selected
                .into_iter()
                .map(|m| m.display_name)
                .collect::<Vec<_>>()
        };

        assert_eq!(names(select_candidates(&roster, 60, now)), vec!["Never", "Stale"]);
        assert_eq!(
            names(select_candidates(&roster, 0, now)),
            vec!["Never", "Stale", "Fresh"]
        );
    }

    #[tokio::test]
    async fn update_writes_refreshed_members_in_one_batch() {
        let dir = tempfile::tempdir().unwrap();
        let mut banned = member("r3", "Cy", "3");
        banned.enabled = false;
        let store = Arc::new(FakeStore::with_members(vec![
            member("r1", "Ana", "1"),
            member("r2", "Bo", "2"),
            banned,
        ]));
        let ladder = Arc::new(
            FakeLadder::default()
                .with_profile("1", 80, Some(12))
                .with_profile("2", 54, None)
                .with_profile("3", 70, None),
        );
        let service = service(store.clone(), ladder.clone(), &dir, fast_settings());

        let outcome = service
            .update_members(
                UpdateRequest {
                    include_win_loss: true,
                    stale_after_minutes: 0,
                },
                &LogProgress,
                &CancelToken::never(),
            )
            .await
            .unwrap();

        assert_eq!(outcome, UpdateOutcome::Completed { written: 2 });
        let batches = store.update_batches.lock().unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0][0].rank_tier, Some(80));
        assert_eq!((batches[0][0].win, batches[0][0].lose), (7, 3));
        assert!(!ladder.calls().iter().any(|call| call.ends_with(":3")));
        assert!(!service.is_busy());
    }

    #[tokio::test]
    async fn unchanged_ladder_data_keeps_rank_history() {
        let dir = tempfile::tempdir().unwrap();
        let mut tracked = member("r1", "Ana", "1");
        tracked.rank_tier = Some(75);
        tracked.previous_rank_tier = Some(74);
        tracked.last_change = Some(datetime!(2024-01-01 0:00 UTC));
        tracked.last_updated = Some(datetime!(2024-01-02 0:00 UTC));
        let store = Arc::new(FakeStore::with_members(vec![tracked]));
        let ladder = Arc::new(FakeLadder::default().with_profile("1", 75, None));
        let service = service(store.clone(), ladder, &dir, fast_settings());

        service
            .update_members(UpdateRequest::default(), &LogProgress, &CancelToken::never())
            .await
            .unwrap();

        let written = store.update_batches.lock().unwrap()[0][0].clone();
        assert_eq!(written.previous_rank_tier, Some(74));
        assert_eq!(written.last_change, Some(datetime!(2024-01-01 0:00 UTC)));
        assert!(written.last_updated.unwrap() > datetime!(2024-01-02 0:00 UTC));
    }

    #[tokio::test]
    async fn rate_limited_refresh_is_retried_before_profile() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FakeStore::with_members(vec![member("r1", "Ana", "1")]));
        let ladder = Arc::new(
            FakeLadder::default()
                .with_profile("1", 60, None)
                .script_refresh(vec![LadderResponse::limited(RateLimitQuota::default())]),
        );
        let service = service(store, ladder.clone(), &dir, fast_settings());
        let (tx, mut rx) = mpsc::channel::<String>(16);

        let outcome = service
            .update_members(
                UpdateRequest {
                    include_win_loss: true,
                    stale_after_minutes: 0,
                },
                &tx,
                &CancelToken::never(),
            )
            .await
            .unwrap();

        assert_eq!(outcome, UpdateOutcome::Completed { written: 1 });
        assert_eq!(
            ladder.calls(),
            vec!["refresh:1", "refresh:1", "player:1", "wl:1"]
        );
        let mut messages = Vec::new();
        while let Ok(message) = rx.try_recv() {
            messages.push(message);
        }
        assert_eq!(messages[0], "Updating 1/1: Ana");
        assert!(messages[1].starts_with("Request limit reached (1/1)"));
    }

    #[tokio::test]
    async fn cancel_during_backoff_stops_and_keeps_finished_members() {
        let dir = tempfile::tempdir().unwrap();
        let mut later = member("r2", "Bo", "2");
        later.last_updated = Some(datetime!(2024-01-01 0:00 UTC));
        let store = Arc::new(FakeStore::with_members(vec![
            member("r1", "Ana", "1"),
            later,
            member("r3", "Cy", "3"),
        ]));
        let ladder = Arc::new(
            FakeLadder::default()
                .with_profile("1", 60, None)
                .with_profile("3", 60, None)
                .limit_always("2"),
        );
        let settings = CommunitySettings {
            rate_limit_backoff: Duration::from_secs(3600),
            ..fast_settings()
        };
        let service = service(store.clone(), ladder.clone(), &dir, settings);
        let (tx, mut rx) = mpsc::channel::<String>(16);
        let source = CancelSource::new();
        let token = source.token();

        let update = service.update_members(
            UpdateRequest {
                include_win_loss: false,
                stale_after_minutes: 0,
            },
            &tx,
            &token,
        );
        let canceller = async {
            while let Some(message) = rx.recv().await {
                if message.starts_with("Request limit reached") {
                    // Mutations are rejected while the update holds the roster.
                    let busy = service
                        .add_member(
                            MemberInput {
                                account_id: "99".into(),
                                ..MemberInput::default()
                            },
                            AddOptions::default(),
                            &LogProgress,
                        )
                        .await
                        .unwrap();
                    assert_eq!(busy, MutationOutcome::Busy);
                    source.cancel();
                    break;
                }
            }
        };

        let (outcome, ()) = tokio::time::timeout(Duration::from_secs(5), async {
            tokio::join!(update, canceller)
        })
        .await
        .unwrap();

        // "Ana" (never fetched) and "Cy" go before "Bo"; "Bo" is cancelled mid back-off.
        assert_eq!(outcome.unwrap(), UpdateOutcome::Cancelled { written: 2 });
        assert_eq!(
            ladder
                .calls()
                .iter()
                .filter(|call| call.as_str() == "refresh:2")
                .count(),
            1
        );
        assert!(!ladder.calls().contains(&"player:2".to_string()));
        assert_eq!(store.update_batches.lock().unwrap()[0].len(), 2);
    }

    #[tokio::test]
    async fn exhausted_retries_skip_the_member() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FakeStore::with_members(vec![
            member("r1", "Ana", "1"),
            member("r2", "Bo", "2"),
        ]));
        let ladder = Arc::new(
            FakeLadder::default()
                .with_profile("1", 60, None)
                .limit_always("2"),
        );
        let settings = CommunitySettings {
            max_rate_limit_retries: Some(2),
            ..fast_settings()
        };
        let service = service(store, ladder.clone(), &dir, settings);

        let outcome = service
            .update_members(UpdateRequest::default(), &LogProgress, &CancelToken::never())
            .await
            .unwrap();

        assert_eq!(outcome, UpdateOutcome::Completed { written: 1 });
        assert_eq!(
            ladder
                .calls()
                .iter()
                .filter(|call| call.as_str() == "refresh:2")
                .count(),
            3
        );
    }

    #[tokio::test]
    async fn missing_profile_abandons_member_without_win_loss() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FakeStore::with_members(vec![member("r1", "Ana", "1")]));
        let ladder = Arc::new(FakeLadder::default());
        let service = service(store.clone(), ladder.clone(), &dir, fast_settings());

        let outcome = service
            .update_members(
                UpdateRequest {
                    include_win_loss: true,
                    stale_after_minutes: 0,
                },
                &LogProgress,
                &CancelToken::never(),
            )
            .await
            .unwrap();

        assert_eq!(outcome, UpdateOutcome::Completed { written: 0 });
        assert_eq!(ladder.calls(), vec!["refresh:1", "player:1"]);
        assert!(store.update_batches.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_add_is_rejected_before_the_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FakeStore::with_members(vec![member(
            "r1",
            "Ana",
            "123456789",
        )]));
        let service = service(store.clone(), Arc::new(FakeLadder::default()), &dir, fast_settings());
        service.members(true).await.unwrap();

        let result = service
            .add_member(
                MemberInput {
                    account_id: "123456789".into(),
                    ..MemberInput::default()
                },
                AddOptions::default(),
                &LogProgress,
            )
            .await;

        assert!(matches!(result, Err(ServiceError::InvalidInput(_))));
        assert_eq!(store.creates.load(AtomicOrdering::SeqCst), 0);
    }

    #[tokio::test]
    async fn duplicate_add_checks_the_store_when_roster_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FakeStore::with_members(vec![member(
            "r1",
            "Ana",
            "123456789",
        )]));
        let service = service(store.clone(), Arc::new(FakeLadder::default()), &dir, fast_settings());
        assert_eq!(service.initialize_from_cache().await, (0, 0));

        let result = service
            .add_member(
                MemberInput {
                    account_id: "123456789".into(),
                    ..MemberInput::default()
                },
                AddOptions::default(),
                &LogProgress,
            )
            .await;

        assert!(matches!(result, Err(ServiceError::InvalidInput(_))));
        assert_eq!(store.creates.load(AtomicOrdering::SeqCst), 0);
        assert_eq!(store.members.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn rejected_update_batch_does_not_touch_roster_or_cache() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FakeStore::with_members(vec![member("r1", "Ana", "1")]));
        store.reject_updates.store(true, AtomicOrdering::SeqCst);
        let ladder = Arc::new(FakeLadder::default().with_profile("1", 75, Some(40)));
        let service = service(store, ladder, &dir, fast_settings());

        let outcome = service
            .update_members(UpdateRequest::default(), &LogProgress, &CancelToken::never())
            .await
            .unwrap();

        assert_eq!(outcome, UpdateOutcome::Completed { written: 0 });
        let members = service.members(false).await.unwrap();
        assert_eq!(members[0].rank_tier, None);
        assert_eq!(members[0].last_updated, None);
        let cached = LocalCache::new(dir.path())
            .read(MEMBERS_CACHE_KEY)
            .await
            .unwrap();
        let cached: Vec<MemberRecord> = serde_json::from_str(&cached).unwrap();
        assert_eq!(cached[0].rank_tier, None);
    }

    #[tokio::test]
    async fn add_seeds_ladder_data_and_falls_back_to_persona_name() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FakeStore::default());
        let ladder = Arc::new(FakeLadder::default().with_profile("42", 80, Some(300)));
        let service = service(store, ladder, &dir, fast_settings());

        let outcome = service
            .add_member(
                MemberInput {
                    display_name: Some("  ".into()),
                    account_id: " 42 ".into(),
                    team: Some("Blue".into()),
                    ..MemberInput::default()
                },
                AddOptions::default(),
                &LogProgress,
            )
            .await
            .unwrap();

        let MutationOutcome::Applied(created) = outcome else {
            panic!("member was not added");
        };
        assert_eq!(created.id, "recNew0");
        assert_eq!(created.display_name, "persona-42");
        assert_eq!(created.account_id, "42");
        assert_eq!(created.leaderboard_rank, Some(300));
        assert_eq!((created.win, created.lose), (7, 3));
        assert!(created.enabled);
        assert!(service.member_exists("42").await);

        let unknown = service
            .add_member(
                MemberInput {
                    account_id: "77".into(),
                    ..MemberInput::default()
                },
                AddOptions::default(),
                &LogProgress,
            )
            .await
            .unwrap();
        let MutationOutcome::Applied(unknown) = unknown else {
            panic!("member was not added");
        };
        assert_eq!(unknown.display_name, DEFAULT_PLAYER_NAME);
        assert_eq!(unknown.rank_tier, None);
    }

    #[tokio::test]
    async fn edit_keeps_ladder_fields() {
        let dir = tempfile::tempdir().unwrap();
        let mut tracked = member("r1", "Ana", "1");
        tracked.rank_tier = Some(80);
        tracked.win = 9;
        let store = Arc::new(FakeStore::with_members(vec![tracked]));
        let service = service(store, Arc::new(FakeLadder::default()), &dir, fast_settings());
        service.members(true).await.unwrap();

        let outcome = service
            .edit_member(
                "r1",
                MemberInput {
                    display_name: Some("Ana B".into()),
                    account_id: "1".into(),
                    enabled: Some(false),
                    position: Position::MidLane,
                    ..MemberInput::default()
                },
            )
            .await
            .unwrap();

        let MutationOutcome::Applied(edited) = outcome else {
            panic!("member was not edited");
        };
        assert_eq!(edited.display_name, "Ana B");
        assert!(!edited.enabled);
        assert_eq!(edited.position, Position::MidLane);
        assert_eq!(edited.rank_tier, Some(80));
        assert_eq!(edited.win, 9);

        let missing = service.edit_member("nope", MemberInput {
            account_id: "5".into(),
            ..MemberInput::default()
        });
        assert!(matches!(missing.await, Err(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn remove_drops_member_from_memory_and_cache() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FakeStore::with_members(vec![
            member("r1", "Ana", "1"),
            member("r2", "Bo", "2"),
        ]));
        let service = service(store, Arc::new(FakeLadder::default()), &dir, fast_settings());
        service.members(true).await.unwrap();

        assert_eq!(
            service.remove_member("r1").await.unwrap(),
            MutationOutcome::Applied(())
        );
        assert_eq!(
            service.remove_member("r1").await.unwrap(),
            MutationOutcome::Rejected
        );
        assert!(!service.member_exists("1").await);

        let cached = LocalCache::new(dir.path())
            .read(MEMBERS_CACHE_KEY)
            .await
            .unwrap();
        assert!(!cached.contains("\"r1\""));
        assert!(cached.contains("\"r2\""));
    }

    #[tokio::test]
    async fn cache_round_trip_reproduces_roster() {
        let dir = tempfile::tempdir().unwrap();
        let mut full = member("r1", "Ana", "1");
        full.email = Some("ana@example.com".into());
        full.position = Position::HardSupport;
        full.socials.twitch = Some("ana_tv".into());
        full.rank_tier = Some(65);
        full.previous_leaderboard_rank = Some(10);
        full.last_updated = Some(datetime!(2024-05-01 10:30:15.25 UTC));
        let roster = vec![full, member("r2", "Bo", "2")];
        let first = service(
            Arc::new(FakeStore::with_members(roster.clone())),
            Arc::new(FakeLadder::default()),
            &dir,
            fast_settings(),
        );
        first.members(true).await.unwrap();

        let second = service(
            Arc::new(FakeStore::default()),
            Arc::new(FakeLadder::default()),
            &dir,
            fast_settings(),
        );
        assert_eq!(second.initialize_from_cache().await, (2, 0));
        assert_eq!(second.members(false).await.unwrap(), roster);
    }

    #[tokio::test]
    async fn guild_settings_are_loaded_and_looked_up() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FakeStore::default());
        store.guilds.lock().unwrap().push(GuildSettings {
            id: "recG".into(),
            guild_id: 42,
            guild_name: Some("Ascendia".into()),
            ranking_channel_id: Some(7),
            stale_after_minutes: 120,
            debug_guild: false,
        });
        let service = service(store, Arc::new(FakeLadder::default()), &dir, fast_settings());

        assert!(service.guild_settings(42).await.is_none());
        assert_eq!(service.guild_settings_list(false).await.unwrap().len(), 1);
        assert_eq!(
            service.guild_settings(42).await.unwrap().stale_after_minutes,
            120
        );
        assert!(LocalCache::new(dir.path()).read(SETTINGS_CACHE_KEY).await.is_some());
    }

    #[tokio::test]
    async fn region_detection_picks_most_frequent_group() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(
            Arc::new(FakeStore::default()),
            Arc::new(FakeLadder::default()),
            &dir,
            fast_settings(),
        );

        let estimate = service.detect_region("42", 5).await.unwrap();
        assert_eq!(estimate.region, Some(RegionGroup::Europe));
        assert_eq!(estimate.matches_sampled, 5);
        assert_eq!(
            estimate.counts,
            vec![(RegionGroup::Europe, 3), (RegionGroup::America, 2)]
        );

        assert!(matches!(
            service.detect_region(" ", 5).await,
            Err(ServiceError::InvalidInput(_))
        ));
    }
}
