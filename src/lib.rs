//! Library crate for ascendia-back, exposing modules for binaries and integration tests.

pub mod config;
/// Persistence: the remote roster store and the local cache.
pub mod dao;
pub mod discord;
mod dto;
mod error;
pub mod ladder;
/// Admin REST API.
pub mod routes;
/// Roster and guild workflows.
pub mod services;
/// Shared application state for the HTTP layer.
pub mod state;
