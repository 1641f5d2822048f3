use serde::Deserialize;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

// ---------------------------------------------------------------------------
// Config structs
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Clone)]
pub struct BackendConfig {
    /// Project URL, e.g. `"https://abc.supabase.co"`.
    pub url: String,
    /// Public (anon) API key.
    ///
    /// Prefer the `BOARD_ANON_KEY` environment variable; this field is the
    /// fallback for setups that cannot inject env vars.
    #[serde(default)]
    pub anon_key: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// How display names are attached to jokes on each feed load.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProfileLookup {
    /// One `id=in.(...)` query for every distinct owner.
    #[default]
    Batched,
    /// One query per owned joke, run concurrently.
    PerRecord,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FeedConfig {
    #[serde(default)]
    pub profile_lookup: ProfileLookup,
    #[serde(default = "default_anon_label")]
    pub anon_label: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogConfig {
    #[serde(default = "default_log_file")]
    pub file: String,
    #[serde(default = "default_log_level")]
    pub level: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub backend: BackendConfig,
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub log: LogConfig,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

impl BackendConfig {
    /// Project URL without a trailing slash, ready for path joins.
    pub fn base_url(&self) -> &str {
        self.url.trim_end_matches('/')
    }

    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_secs)
    }

    /// Resolve the anon key with the `BOARD_ANON_KEY` env var taking priority
    /// over the config file field.
    pub fn resolved_anon_key(&self) -> Option<String> {
        std::env::var("BOARD_ANON_KEY")
            .ok()
            .filter(|s| !s.is_empty())
            .or_else(|| self.anon_key.clone())
            .filter(|s| !s.is_empty())
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            profile_lookup: ProfileLookup::default(),
            anon_label: default_anon_label(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            file: default_log_file(),
            level: default_log_level(),
        }
    }
}

// ---------------------------------------------------------------------------
// Serde defaults
// ---------------------------------------------------------------------------

pub fn default_timeout_secs() -> u64 {
    10
}

pub fn default_anon_label() -> String {
    "Anon".to_string()
}

pub fn default_log_file() -> String {
    "joke-board.log".to_string()
}

pub fn default_log_level() -> String {
    "info".to_string()
}
