//! # Configuration Module
//!
//! This module defines the bot configuration: VK credentials and endpoints,
//! the fixed candidate-search windows, database settings and presentation
//! options. Values come from the process environment (optionally seeded by a
//! `.env` file); everything except the two tokens and the database URL has a
//! default.

use crate::errors::ConfigError;

// Constants for VK API access
pub const DEFAULT_API_URL: &str = "https://api.vk.com/method/";
pub const DEFAULT_API_VERSION: &str = "5.199";
pub const PROFILE_URL_PREFIX: &str = "https://vk.com/id";
pub const DEFAULT_LONG_POLL_WAIT_SECS: u64 = 25;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

// Constants for candidate search
pub const DEFAULT_AGE_FROM: u32 = 18;
pub const DEFAULT_AGE_TO: u32 = 50;
/// `users.search` status 6: "actively looking"
pub const ACTIVELY_LOOKING_STATUS: u32 = 6;
pub const FRESHNESS_THRESHOLD_DAYS: i64 = 10;
pub const MAX_PHOTOS_PER_CANDIDATE: usize = 3;
pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const DEFAULT_PAGE_STEP: u32 = 10;
/// City used when the viewer has no stored profile
pub const DEFAULT_CITY_ID: i64 = 1;
/// Gender used when the viewer has no stored profile (VK: 1 = female, 2 = male)
pub const DEFAULT_SEX: i16 = 1;

/// Connection settings for the VK API and the Bots Long Poll server
#[derive(Debug, Clone)]
pub struct VkConfig {
    /// Base URL that method names are appended to
    pub api_url: String,
    /// Value of the `v` query parameter
    pub api_version: String,
    /// Community token: long poll and `messages.send`
    pub group_token: String,
    /// User token: `users.get`, `photos.get`, `users.search`
    pub user_token: String,
    /// Community id, resolved through `groups.getById` when absent
    pub group_id: Option<i64>,
    /// Seconds the long-poll server may hold a request open
    pub long_poll_wait_secs: u64,
    /// Timeout for ordinary API calls in seconds
    pub request_timeout_secs: u64,
}

/// Fixed windows and paging parameters for `users.search`
#[derive(Debug, Clone, PartialEq)]
pub struct SearchConfig {
    pub age_from: u32,
    pub age_to: u32,
    pub status: u32,
    pub has_photo: bool,
    /// `count` sent with every search call
    pub page_size: u32,
    /// Offset increment applied by the paginator
    pub page_step: u32,
    /// Candidates seen this many days ago or earlier are dropped
    pub freshness_days: i64,
    /// Photos attached to each candidate card
    pub max_photos: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            age_from: DEFAULT_AGE_FROM,
            age_to: DEFAULT_AGE_TO,
            status: ACTIVELY_LOOKING_STATUS,
            has_photo: true,
            page_size: DEFAULT_PAGE_SIZE,
            page_step: DEFAULT_PAGE_STEP,
            freshness_days: FRESHNESS_THRESHOLD_DAYS,
            max_photos: MAX_PHOTOS_PER_CANDIDATE,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Complete bot configuration
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub vk: VkConfig,
    pub search: SearchConfig,
    pub database_url: String,
    /// Drop and recreate every table on start-up
    pub reset_database: bool,
    pub default_language: String,
    pub log_format: LogFormat,
}

impl BotConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    ///
    /// Empty values count as absent.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &str| {
            get(key).ok_or_else(|| ConfigError::Missing {
                key: key.to_string(),
            })
        };

        let vk = VkConfig {
            api_url: get("VK_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            api_version: get("VK_API_VERSION").unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
            group_token: required("VK_GROUP_TOKEN")?,
            user_token: required("VK_USER_TOKEN")?,
            group_id: parse_optional(&get, "VK_GROUP_ID")?,
            long_poll_wait_secs: parse_optional(&get, "VK_LONG_POLL_WAIT")?
                .unwrap_or(DEFAULT_LONG_POLL_WAIT_SECS),
            request_timeout_secs: parse_optional(&get, "VK_REQUEST_TIMEOUT")?
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        };

        let defaults = SearchConfig::default();
        let search = SearchConfig {
            page_size: parse_optional(&get, "SEARCH_PAGE_SIZE")?.unwrap_or(defaults.page_size),
            page_step: parse_optional(&get, "SEARCH_PAGE_STEP")?.unwrap_or(defaults.page_step),
            ..defaults
        };

        let reset_database = match get("RESET_DATABASE") {
            None => false,
            Some(value) => parse_flag(&value).ok_or(ConfigError::Invalid {
                key: "RESET_DATABASE".to_string(),
                value,
            })?,
        };

        let log_format = match get("LOG_FORMAT").as_deref().map(str::to_lowercase).as_deref() {
            None | Some("pretty") => LogFormat::Pretty,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "LOG_FORMAT".to_string(),
                    value: other.to_string(),
                })
            }
        };

        Ok(Self {
            vk,
            search,
            database_url: required("DATABASE_URL")?,
            reset_database,
            default_language: get("BOT_LANGUAGE").unwrap_or_else(|| "ru".to_string()),
            log_format,
        })
    }
}

fn parse_optional<T, G>(get: &G, key: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::Invalid {
                key: key.to_string(),
                value,
            }),
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
