use std::fs;
use tracing::{debug, info};

use crate::types::client_config::{AppConfig, ConfigError};

pub fn load_config(path: &str) -> Result<AppConfig, ConfigError> {
    let config = read_config(path)?;
    validate_config(&config)?;
    Ok(config)
}

/// Parse and validate a TOML document already in memory.
pub fn parse_config(contents: &str) -> Result<AppConfig, ConfigError> {
    let config = parse_unvalidated(contents)?;
    validate_config(&config)?;
    Ok(config)
}

/// Read and parse without validating, so the `[log]` section can set up
/// logging before validation reports anything.
pub fn read_config(path: &str) -> Result<AppConfig, ConfigError> {
    let contents = fs::read_to_string(path)?;
    parse_unvalidated(&contents)
}

fn parse_unvalidated(contents: &str) -> Result<AppConfig, ConfigError> {
    if contents.trim().is_empty() {
        return Err(ConfigError::InvalidConfig("empty file".into()));
    }
    Ok(toml::from_str(contents)?)
}

pub fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    info!("Validating configuration");
    debug!(
        "Backend: {}, profile lookup: {:?}, log level: {}",
        config.backend.base_url(),
        config.feed.profile_lookup,
        config.log.level
    );

    let url = config.backend.base_url();
    if url.is_empty() {
        return Err(ConfigError::InvalidConfig("backend.url cannot be empty".into()));
    }

    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(ConfigError::InvalidConfig(
            "backend.url must start with http:// or https://".into(),
        ));
    }

    if config.backend.timeout_secs == 0 {
        return Err(ConfigError::InvalidConfig(
            "backend.timeout_secs must be greater than 0".into(),
        ));
    }

    // Every request carries the anon key.
    if config.backend.resolved_anon_key().is_none() {
        return Err(ConfigError::InvalidConfig(
            "anon_key must be set via the BOARD_ANON_KEY env var or backend.anon_key config field"
                .into(),
        ));
    }

    if config.feed.anon_label.trim().is_empty() {
        return Err(ConfigError::InvalidConfig(
            "feed.anon_label cannot be empty".into(),
        ));
    }

    if config.log.file.is_empty() {
        return Err(ConfigError::InvalidConfig("log.file cannot be empty".into()));
    }

    info!("Config validated");
    Ok(())
}
