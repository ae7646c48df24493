/// Airtable-backed [`RosterStore`].
pub mod airtable;

use futures::future::BoxFuture;

use crate::dao::models::{GuildSettings, MemberRecord};
use crate::dao::storage::StorageResult;

/// Abstraction over the remote table service holding the roster and guild settings.
///
/// Implementations that lack credentials behave as no-ops: reads return nothing,
/// writes report zero rows and deletes report failure.
pub trait RosterStore: Send + Sync {
    /// Whether credentials are present.
    fn is_configured(&self) -> bool;
    /// Every roster record.
    fn list_members(&self) -> BoxFuture<'static, StorageResult<Vec<MemberRecord>>>;
    /// Every guild settings row.
    fn list_guild_settings(&self) -> BoxFuture<'static, StorageResult<Vec<GuildSettings>>>;
    /// Create records, returning them as persisted (with identifiers assigned).
    fn create_members(
        &self,
        records: Vec<MemberRecord>,
    ) -> BoxFuture<'static, StorageResult<Vec<MemberRecord>>>;
    /// Update existing records, returning how many rows the backend accepted.
    fn update_members(&self, records: Vec<MemberRecord>) -> BoxFuture<'static, StorageResult<usize>>;
    /// Delete by record id. `false` when nothing was removed.
    fn delete_member(&self, id: String) -> BoxFuture<'static, StorageResult<bool>>;
    /// Cheap read used by `/healthcheck`.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
}
