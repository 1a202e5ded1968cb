//! Configuration module for the streaming client
//!
//! This module handles client configuration from various sources: .env files, YAML files,
//! and environment variables. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//! - `validation`: Configuration validation logic
//!
//! # Example
//! ```rust,no_run
//! use elevenlabs_stream::config::ClientConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ClientConfig::from_env()?;
//!
//! // Load from YAML file with environment variable overrides
//! let config = ClientConfig::from_file(&PathBuf::from("config.yaml"))?;
//!
//! println!("Streaming from {}", config.base_ws_url);
//! # Ok(())
//! # }
//! ```

use std::path::Path;
use std::time::Duration;

use thiserror::Error;
use zeroize::Zeroizing;

use crate::core::http::DEFAULT_BASE_URL;
use crate::core::stream::{DEFAULT_METADATA_CAPACITY, DEFAULT_WS_URL, SessionTimeouts};

mod env;
mod validation;
mod yaml;

pub use yaml::{ApiYaml, StreamYaml, TimeoutsYaml, YamlConfig};

/// Default unary request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default dial plus handshake timeout in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default time allowed for draining audio after end of input, in seconds.
pub const DEFAULT_DRAIN_TIMEOUT_SECS: u64 = 20;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {message}")]
    Read { path: String, message: String },

    #[error("Failed to parse YAML config: {0}")]
    Parse(String),

    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Client configuration.
///
/// The API key is held in a [`Zeroizing`] buffer and cleared from memory when
/// the configuration is dropped. It is never printed by `Debug`.
#[derive(Clone)]
pub struct ClientConfig {
    /// API key sent as `xi-api-key`. Requests are sent without it when unset.
    pub api_key: Option<Zeroizing<String>>,

    /// REST base URL
    /// Default: https://api.elevenlabs.io/v1
    pub base_url: String,

    /// WebSocket base URL
    /// Default: wss://api.elevenlabs.io/v1
    pub base_ws_url: String,

    /// Timeout of a unary request
    /// Default: 30s
    pub request_timeout: Duration,

    /// Timeout for dialing the socket and completing the opening handshake
    /// Default: 10s
    pub connect_timeout: Duration,

    /// How long a session keeps reading after the end-of-input frame
    /// Default: 20s
    pub drain_timeout: Duration,

    /// Capacity of metadata channels created on behalf of the caller
    /// Default: 64
    pub metadata_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            base_ws_url: DEFAULT_WS_URL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            drain_timeout: Duration::from_secs(DEFAULT_DRAIN_TIMEOUT_SECS),
            metadata_capacity: DEFAULT_METADATA_CAPACITY,
        }
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("base_url", &self.base_url)
            .field("base_ws_url", &self.base_ws_url)
            .field("request_timeout", &self.request_timeout)
            .field("connect_timeout", &self.connect_timeout)
            .field("drain_timeout", &self.drain_timeout)
            .field("metadata_capacity", &self.metadata_capacity)
            .finish()
    }
}

impl ClientConfig {
    /// Load configuration from environment variables on top of the defaults.
    ///
    /// The `.env` file is not read here; the binary loads it at startup so
    /// that its values show up as environment variables.
    ///
    /// # Errors
    /// Returns an error if a variable has an invalid format or the resulting
    /// configuration fails validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        env::apply_env(&mut config)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file with environment variables as base.
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    ///
    /// # Errors
    /// Returns an error if:
    /// - The YAML file cannot be read or is malformed
    /// - Environment variables have invalid formats
    /// - Configuration validation fails
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let yaml_config = YamlConfig::from_file(path)?;

        let mut config = Self::default();
        env::apply_env(&mut config)?;
        yaml_config.apply(&mut config);

        config.validate()?;
        Ok(config)
    }

    /// Checks URL schemes, timeouts and channel capacity.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validation::validate_url("base_url", &self.base_url, &["http", "https"])?;
        validation::validate_url("base_ws_url", &self.base_ws_url, &["ws", "wss"])?;
        validation::validate_timeout("request_timeout", self.request_timeout)?;
        validation::validate_timeout("connect_timeout", self.connect_timeout)?;
        validation::validate_timeout("drain_timeout", self.drain_timeout)?;
        if self.metadata_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                key: "metadata_capacity".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }
        Ok(())
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.as_ref().is_some_and(|key| !key.is_empty())
    }

    pub fn session_timeouts(&self) -> SessionTimeouts {
        SessionTimeouts {
            connect: self.connect_timeout,
            drain: self.drain_timeout,
        }
    }
}
