/// Best-effort local snapshot of the roster and guild settings.
pub mod cache;
/// Roster and guild settings model definitions.
pub mod models;
/// Remote table service holding the roster.
pub mod roster_store;
/// Storage error types shared by the roster store.
pub mod storage;
