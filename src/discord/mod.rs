//! Discord front end: the `/players` slash command.

pub mod bot;
pub mod commands;
pub mod publish;

pub use bot::{DiscordBot, DiscordError};
