use std::env;
use std::str::FromStr;
use std::time::Duration;

use zeroize::Zeroizing;

use super::{ClientConfig, ConfigError};

pub(super) const API_KEY: &str = "ELEVENLABS_API_KEY";
pub(super) const BASE_URL: &str = "ELEVENLABS_BASE_URL";
pub(super) const WS_URL: &str = "ELEVENLABS_WS_URL";
pub(super) const TIMEOUT_SECS: &str = "ELEVENLABS_TIMEOUT_SECS";
pub(super) const CONNECT_TIMEOUT_SECS: &str = "ELEVENLABS_CONNECT_TIMEOUT_SECS";
pub(super) const DRAIN_TIMEOUT_SECS: &str = "ELEVENLABS_DRAIN_TIMEOUT_SECS";
pub(super) const METADATA_CAPACITY: &str = "ELEVENLABS_METADATA_CAPACITY";

/// Overlays set environment variables onto `config`. Empty values count as unset.
pub(super) fn apply_env(config: &mut ClientConfig) -> Result<(), ConfigError> {
    if let Some(key) = read(API_KEY) {
        config.api_key = Some(Zeroizing::new(key));
    }
    if let Some(url) = read(BASE_URL) {
        config.base_url = url;
    }
    if let Some(url) = read(WS_URL) {
        config.base_ws_url = url;
    }
    if let Some(secs) = parse::<u64>(TIMEOUT_SECS)? {
        config.request_timeout = Duration::from_secs(secs);
    }
    if let Some(secs) = parse::<u64>(CONNECT_TIMEOUT_SECS)? {
        config.connect_timeout = Duration::from_secs(secs);
    }
    if let Some(secs) = parse::<u64>(DRAIN_TIMEOUT_SECS)? {
        config.drain_timeout = Duration::from_secs(secs);
    }
    if let Some(capacity) = parse::<usize>(METADATA_CAPACITY)? {
        config.metadata_capacity = capacity;
    }
    Ok(())
}

fn read(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse<T>(key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    read(key)
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("{raw:?}: {e}"),
            })
        })
        .transpose()
}
