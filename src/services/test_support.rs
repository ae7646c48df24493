//! In-memory doubles of the ladder API and roster store.

use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::{
        Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering as AtomicOrdering},
    },
};

use futures::future::BoxFuture;

use crate::{
    dao::{
        models::{GuildSettings, MemberRecord},
        roster_store::RosterStore,
        storage::StorageResult,
    },
    ladder::{
        Distributions, LadderApi, LadderResponse, MatchDetails, PlayerMatch, PlayerProfile,
        RateLimitQuota, WinLoss, models::SteamProfile,
    },
};

#[derive(Default)]
pub(crate) struct FakeLadder {
    pub(crate) refresh_script: Mutex<VecDeque<LadderResponse<()>>>,
    pub(crate) always_limited: Mutex<HashSet<String>>,
    pub(crate) profiles: Mutex<HashMap<String, PlayerProfile>>,
    pub(crate) calls: Mutex<Vec<String>>,
}

impl FakeLadder {
    pub(crate) fn with_profile(self, account_id: &str, tier: u32, leaderboard: Option<u32>) -> Self {
        self.profiles.lock().unwrap().insert(
            account_id.to_string(),
            PlayerProfile {
                rank_tier: Some(tier),
                leaderboard_rank: leaderboard,
                profile: Some(SteamProfile {
                    persona_name: Some(format!("persona-{account_id}")),
                    ..Default::default()
                }),
                ..PlayerProfile::default()
            },
        );
        self
    }

    pub(crate) fn limit_always(self, account_id: &str) -> Self {
        self.always_limited
            .lock()
            .unwrap()
            .insert(account_id.to_string());
        self
    }

    pub(crate) fn script_refresh(self, responses: Vec<LadderResponse<()>>) -> Self {
        self.refresh_script.lock().unwrap().extend(responses);
        self
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn quota() -> RateLimitQuota {
        RateLimitQuota::default()
    }
}

impl LadderApi for FakeLadder {
    fn refresh_player(&self, account_id: &str) -> BoxFuture<'static, LadderResponse<()>> {
        self.record(format!("refresh:{account_id}"));
        let response = if self.always_limited.lock().unwrap().contains(account_id) {
            LadderResponse::limited(Self::quota())
        } else {
            self.refresh_script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| LadderResponse::success((), Self::quota()))
        };
        Box::pin(async move { response })
    }

    fn player(&self, account_id: &str) -> BoxFuture<'static, LadderResponse<PlayerProfile>> {
        self.record(format!("player:{account_id}"));
        let response = match self.profiles.lock().unwrap().get(account_id) {
            Some(profile) => LadderResponse::success(profile.clone(), Self::quota()),
            None => LadderResponse::failed(Self::quota()),
        };
        Box::pin(async move { response })
    }

    fn win_loss(&self, account_id: &str) -> BoxFuture<'static, LadderResponse<WinLoss>> {
        self.record(format!("wl:{account_id}"));
        Box::pin(async move { LadderResponse::success(WinLoss { win: 7, lose: 3 }, Self::quota()) })
    }

    fn player_matches(
        &self,
        _account_id: &str,
        limit: u32,
    ) -> BoxFuture<'static, LadderResponse<Vec<PlayerMatch>>> {
        let matches = (1..=i64::from(limit))
            .map(|match_id| PlayerMatch {
                match_id,
                ..PlayerMatch::default()
            })
            .collect();
        Box::pin(async move { LadderResponse::success(matches, Self::quota()) })
    }

    fn match_details(&self, match_id: i64) -> BoxFuture<'static, LadderResponse<MatchDetails>> {
        // Matches 1..=3 were played in Europe, the rest in North America.
        let region = if match_id <= 3 { 3 } else { 1 };
        Box::pin(async move {
            LadderResponse::success(
                MatchDetails {
                    region: Some(region),
                    patch: None,
                },
                Self::quota(),
            )
        })
    }

    fn distributions(&self) -> BoxFuture<'static, LadderResponse<Distributions>> {
        Box::pin(async move { LadderResponse::failed(Self::quota()) })
    }
}

#[derive(Default)]
pub(crate) struct FakeStore {
    pub(crate) members: Mutex<Vec<MemberRecord>>,
    pub(crate) guilds: Mutex<Vec<GuildSettings>>,
    pub(crate) creates: AtomicUsize,
    pub(crate) update_batches: Mutex<Vec<Vec<MemberRecord>>>,
    /// Answer every update with zero rows written.
    pub(crate) reject_updates: AtomicBool,
}

impl FakeStore {
    pub(crate) fn with_members(members: Vec<MemberRecord>) -> Self {
        Self {
            members: Mutex::new(members),
            ..Self::default()
        }
    }
}

impl RosterStore for FakeStore {
    fn is_configured(&self) -> bool {
        true
    }

    fn list_members(&self) -> BoxFuture<'static, StorageResult<Vec<MemberRecord>>> {
        let members = self.members.lock().unwrap().clone();
        Box::pin(async move { Ok(members) })
    }

    fn list_guild_settings(&self) -> BoxFuture<'static, StorageResult<Vec<GuildSettings>>> {
        let guilds = self.guilds.lock().unwrap().clone();
        Box::pin(async move { Ok(guilds) })
    }

    fn create_members(
        &self,
        records: Vec<MemberRecord>,
    ) -> BoxFuture<'static, StorageResult<Vec<MemberRecord>>> {
        let mut stored = self.members.lock().unwrap();
        let created = records
            .into_iter()
            .map(|mut record| {
                let n = self.creates.fetch_add(1, AtomicOrdering::SeqCst);
                record.id = format!("recNew{n}");
                stored.push(record.clone());
                record
            })
            .collect::<Vec<_>>();
        Box::pin(async move { Ok(created) })
    }

    fn update_members(
        &self,
        records: Vec<MemberRecord>,
    ) -> BoxFuture<'static, StorageResult<usize>> {
        if self.reject_updates.load(AtomicOrdering::SeqCst) {
            self.update_batches.lock().unwrap().push(records);
            return Box::pin(async move { Ok(0) });
        }
        let mut stored = self.members.lock().unwrap();
        for record in &records {
            if let Some(slot) = stored.iter_mut().find(|m| m.id == record.id) {
                *slot = record.clone();
            }
        }
        let written = records.len();
        self.update_batches.lock().unwrap().push(records);
        Box::pin(async move { Ok(written) })
    }

    fn delete_member(&self, id: String) -> BoxFuture<'static, StorageResult<bool>> {
        let mut stored = self.members.lock().unwrap();
        let before = stored.len();
        stored.retain(|m| m.id != id);
        let deleted = stored.len() < before;
        Box::pin(async move { Ok(deleted) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async move { Ok(()) })
    }
}
