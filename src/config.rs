//! Configuration management for PatrolWatch
//!
//! This module defines the main `Config` struct and its sub-structs,
//! responsible for holding all application settings. It uses the `figment`
//! crate to layer defaults, an optional TOML file, environment variables and
//! command-line arguments.

use crate::cli::Cli;
use crate::core::{Bounds, POLICE_ALERT_KIND};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Environment variable names from earlier deployments, mapped onto config keys.
const LEGACY_ENV: &[(&str, &str)] = &[
    ("CACHE_DURATION_HOURS", "cache.duration_hours"),
    ("PUSHOVER_API_KEY", "pushover.api_key"),
    ("PUSHOVER_USER_KEYS", "pushover.user_keys"),
    ("DISCORD_WEBHOOK_URLS", "discord.webhook_urls"),
    ("BOUNDS_TOP", "bounds.top"),
    ("BOUNDS_BOTTOM", "bounds.bottom"),
    ("BOUNDS_LEFT", "bounds.left"),
    ("BOUNDS_RIGHT", "bounds.right"),
];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl From<figment::Error> for ConfigError {
    fn from(e: figment::Error) -> Self {
        ConfigError::Load(Box::new(e))
    }
}

/// The main configuration struct for the application.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    /// The logging level for the application.
    pub log_level: String,
    /// Seconds to wait after a poll cycle finishes before starting the next.
    pub interval_seconds: u64,
    /// Log messages instead of sending them, and never write the cache file.
    #[serde(default)]
    pub dry_run: bool,
    /// The monitored region.
    pub bounds: Bounds,
    /// Configuration for the traffic-data source.
    pub source: SourceConfig,
    /// Configuration for reverse geocoding.
    pub geocoder: GeocoderConfig,
    /// Configuration for the seen-alert cache.
    pub cache: CacheConfig,
    /// Shared settings for notification delivery.
    pub notification: NotificationConfig,
    /// Configuration for Pushover delivery.
    pub pushover: PushoverConfig,
    /// Configuration for Discord webhook delivery.
    pub discord: DiscordConfig,
}

/// Configuration for the traffic-data source.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SourceConfig {
    /// The live-map feed endpoint.
    pub url: String,
    /// The regional server environment passed to the feed.
    pub env: String,
    /// The alert category to report on.
    pub alert_kind: String,
    /// Request timeout in seconds.
    pub timeout_seconds: u64,
}

/// Configuration for reverse geocoding.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GeocoderConfig {
    /// The reverse-geocoding endpoint.
    pub url: String,
    /// User-Agent sent with every request. Required by the Nominatim usage policy.
    pub user_agent: String,
    /// Request timeout in seconds.
    pub timeout_seconds: u64,
}

/// Configuration for the seen-alert cache.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CacheConfig {
    /// Where the cache is persisted.
    pub path: PathBuf,
    /// How long a seen alert is remembered.
    pub duration_hours: u64,
}

/// Longest accepted retention window: ten years.
pub const MAX_CACHE_DURATION_HOURS: u64 = 10 * 365 * 24;

impl CacheConfig {
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.duration_hours.saturating_mul(3600))
    }
}

/// Shared settings for notification delivery.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct NotificationConfig {
    /// Per-request timeout in seconds.
    pub timeout_seconds: u64,
    /// Upper bound on sends in flight at once.
    pub max_concurrent_sends: usize,
}

/// Configuration for Pushover delivery.
#[derive(Deserialize, Serialize, Clone)]
pub struct PushoverConfig {
    /// The application token.
    pub api_key: Option<String>,
    /// User keys to notify.
    #[serde(deserialize_with = "comma_separated")]
    pub user_keys: Vec<String>,
    /// The messages endpoint.
    pub api_url: String,
    /// Notification title.
    pub title: String,
}

/// Configuration for Discord webhook delivery.
#[derive(Deserialize, Serialize, Clone)]
pub struct DiscordConfig {
    /// Webhook URLs to post to.
    #[serde(deserialize_with = "comma_separated")]
    pub webhook_urls: Vec<String>,
    /// Display name of the posting bot.
    pub username: String,
    /// Avatar shown next to the posts.
    pub avatar_url: Option<String>,
    /// Embed title.
    pub title: String,
    /// Embed footer text.
    pub footer: String,
    /// Embed side color as 0xRRGGBB.
    pub color: u32,
}

// Keys and webhook URLs are credentials.
impl fmt::Debug for PushoverConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PushoverConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("user_keys", &self.user_keys.len())
            .field("api_url", &self.api_url)
            .field("title", &self.title)
            .finish()
    }
}

impl fmt::Debug for DiscordConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiscordConfig")
            .field("webhook_urls", &self.webhook_urls.len())
            .field("username", &self.username)
            .field("title", &self.title)
            .field("footer", &self.footer)
            .finish()
    }
}

impl Config {
    /// Loads the configuration by layering sources: defaults, the TOML file
    /// named on the command line, environment variables and CLI arguments.
    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        Self::from_figment(Self::figment(cli.config.as_deref()).merge(cli.clone()))
    }

    /// Builds the layered figment without the CLI layer.
    ///
    /// Environment variables prefixed with `PATROLWATCH_` override any key,
    /// with `__` separating nested sections (e.g. `PATROLWATCH_CACHE__PATH`).
    /// The unprefixed names in [`LEGACY_ENV`] are honoured as well.
    pub fn figment(config_path: Option<&std::path::Path>) -> Figment {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }
        figment
            .merge(Env::prefixed("PATROLWATCH_").split("__"))
            .merge(legacy_env())
    }

    /// Extracts and validates a configuration.
    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings that cannot produce a working monitor.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_seconds == 0 {
            return Err(ConfigError::Invalid(
                "interval_seconds must be greater than zero".to_string(),
            ));
        }
        if !self.bounds.is_valid() {
            return Err(ConfigError::Invalid(format!(
                "bounds must have top > bottom and left < right, got {}",
                self.bounds
            )));
        }
        if self.cache.duration_hours == 0 {
            return Err(ConfigError::Invalid(
                "cache.duration_hours must be greater than zero".to_string(),
            ));
        }
        if self.cache.duration_hours > MAX_CACHE_DURATION_HOURS {
            return Err(ConfigError::Invalid(format!(
                "cache.duration_hours must be at most {}, got {}",
                MAX_CACHE_DURATION_HOURS, self.cache.duration_hours
            )));
        }
        if self.notification.max_concurrent_sends == 0 {
            return Err(ConfigError::Invalid(
                "notification.max_concurrent_sends must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }
}

// Provide a default implementation for tests and easy setup.
impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            interval_seconds: 300,
            dry_run: false,
            bounds: Bounds::default(),
            source: SourceConfig {
                url: "https://www.waze.com/live-map/api/georss".to_string(),
                env: "na".to_string(),
                alert_kind: POLICE_ALERT_KIND.to_string(),
                timeout_seconds: 30,
            },
            geocoder: GeocoderConfig {
                url: "https://nominatim.openstreetmap.org/reverse".to_string(),
                user_agent: concat!("PatrolWatch/", env!("CARGO_PKG_VERSION")).to_string(),
                timeout_seconds: 10,
            },
            cache: CacheConfig {
                path: PathBuf::from("alert_cache.json"),
                duration_hours: 24,
            },
            notification: NotificationConfig {
                timeout_seconds: 10,
                max_concurrent_sends: 8,
            },
            pushover: PushoverConfig {
                api_key: None,
                user_keys: vec![],
                api_url: "https://api.pushover.net/1/messages.json".to_string(),
                title: "Police Alert Nearby".to_string(),
            },
            discord: DiscordConfig {
                webhook_urls: vec![],
                username: "PatrolWatch".to_string(),
                avatar_url: None,
                title: "🚨 Police Alert Nearby".to_string(),
                footer: "PatrolWatch Alert System".to_string(),
                color: 0xFF0000,
            },
        }
    }
}

fn legacy_env() -> Env {
    let names: Vec<&str> = LEGACY_ENV.iter().map(|(name, _)| *name).collect();
    Env::raw().only(&names).map(|key| {
        LEGACY_ENV
            .iter()
            .find(|(name, _)| key.as_str().eq_ignore_ascii_case(name))
            .map(|(_, path)| (*path).into())
            .unwrap_or_else(|| key.as_str().to_owned().into())
    })
}

/// Accepts either a list or a single comma-separated string. Blank entries
/// are dropped and whitespace around entries is trimmed.
fn comma_separated<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Entry {
        Text(String),
        Unsigned(u64),
        Signed(i64),
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ListOrString {
        List(Vec<Entry>),
        One(Entry),
    }

    fn entry_text(entry: Entry) -> String {
        match entry {
            Entry::Text(s) => s,
            Entry::Unsigned(n) => n.to_string(),
            Entry::Signed(n) => n.to_string(),
        }
    }

    let raw: Vec<String> = match ListOrString::deserialize(deserializer)? {
        ListOrString::List(entries) => entries.into_iter().map(entry_text).collect(),
        ListOrString::One(entry) => entry_text(entry)
            .split(',')
            .map(str::to_string)
            .collect(),
    };

    Ok(raw
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect())
}
