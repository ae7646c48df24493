//! Application-level configuration loading, including ranking emojis and ladder pacing.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

use crate::{
    ladder::DEFAULT_LADDER_URL,
    services::{
        community_service::{
            CommunitySettings, DEFAULT_MAX_RATE_LIMIT_RETRIES, DEFAULT_RATE_LIMIT_BACKOFF,
            DEFAULT_STEP_PAUSE,
        },
        ranking::EmojiCatalog,
    },
};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "ASCENDIA_CONFIG_PATH";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_CACHE_DIR: &str = "cache";

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// HTTP listen port; `PORT` overrides it.
    pub port: u16,
    /// Base URL of the ladder API.
    pub ladder_url: String,
    /// Directory holding `members.json` and `settings.json`.
    pub cache_dir: PathBuf,
    /// Roster update tuning.
    pub community: CommunitySettings,
    /// Guild emoji ids for the ranking board.
    pub emojis: EmojiCatalog,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match Self::from_json(&contents) {
                Ok(app_config) => {
                    info!(
                        path = %path.display(),
                        ladder_url = %app_config.ladder_url,
                        cache_dir = %app_config.cache_dir.display(),
                        "loaded configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    fn from_json(contents: &str) -> serde_json::Result<Self> {
        serde_json::from_str::<RawConfig>(contents).map(Into::into)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        RawConfig::default().into()
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    port: u16,
    ladder_url: String,
    cache_dir: PathBuf,
    rate_limit_backoff_secs: u64,
    /// `null` retries rate-limited calls until the operation is cancelled.
    max_rate_limit_retries: Option<u32>,
    step_pause_ms: u64,
    emojis: EmojiCatalog,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            ladder_url: DEFAULT_LADDER_URL.to_string(),
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
            rate_limit_backoff_secs: DEFAULT_RATE_LIMIT_BACKOFF.as_secs(),
            max_rate_limit_retries: Some(DEFAULT_MAX_RATE_LIMIT_RETRIES),
            step_pause_ms: DEFAULT_STEP_PAUSE.as_millis() as u64,
            emojis: EmojiCatalog::default(),
        }
    }
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        Self {
            port: value.port,
            ladder_url: value.ladder_url,
            cache_dir: value.cache_dir,
            community: CommunitySettings {
                rate_limit_backoff: Duration::from_secs(value.rate_limit_backoff_secs),
                max_rate_limit_retries: value.max_rate_limit_retries,
                step_pause: Duration::from_millis(value.step_pause_ms),
            },
            emojis: value.emojis,
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Credentials read from the environment, never from the config file.
#[derive(Debug, Clone, Default)]
pub struct Secrets {
    /// Bot token; the bot stays offline without it.
    pub discord_token: Option<String>,
    /// Guild receiving slash commands; global registration when absent.
    pub discord_guild_id: Option<u64>,
    /// Shared secret for mutating admin routes.
    pub admin_token: Option<String>,
}

impl Secrets {
    /// Read `DISCORD_TOKEN`, `DISCORD_GUILD_ID` and `ADMIN_TOKEN`.
    pub fn from_env() -> Self {
        let non_blank = |name: &str| env::var(name).ok().filter(|value| !value.trim().is_empty());
        let discord_guild_id = non_blank("DISCORD_GUILD_ID").and_then(|raw| {
            raw.trim()
                .parse::<u64>()
                .inspect_err(|err| warn!(error = %err, "ignoring malformed DISCORD_GUILD_ID"))
                .ok()
        });

        Self {
            discord_token: non_blank("DISCORD_TOKEN"),
            discord_guild_id,
            admin_token: non_blank("ADMIN_TOKEN"),
        }
    }
}
