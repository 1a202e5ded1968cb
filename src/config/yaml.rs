use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use zeroize::Zeroizing;

use super::{ClientConfig, ConfigError};

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration. Values present in
/// the file override environment variables and defaults.
///
/// # Example YAML structure
/// ```yaml
/// api:
///   api_key: "your-api-key"
///   base_url: "https://api.elevenlabs.io/v1"
///   ws_url: "wss://api.elevenlabs.io/v1"
///
/// timeouts:
///   request_seconds: 30
///   connect_seconds: 10
///   drain_seconds: 20
///
/// stream:
///   metadata_capacity: 64
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub api: Option<ApiYaml>,
    pub timeouts: Option<TimeoutsYaml>,
    pub stream: Option<StreamYaml>,
}

/// API endpoint and credentials from YAML
#[derive(Clone, Deserialize, Default)]
#[serde(default)]
pub struct ApiYaml {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub ws_url: Option<String>,
}

impl std::fmt::Debug for ApiYaml {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiYaml")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("base_url", &self.base_url)
            .field("ws_url", &self.ws_url)
            .finish()
    }
}

/// Timeouts from YAML, in seconds
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TimeoutsYaml {
    pub request_seconds: Option<u64>,
    pub connect_seconds: Option<u64>,
    pub drain_seconds: Option<u64>,
}

/// Streaming session settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct StreamYaml {
    pub metadata_capacity: Option<usize>,
}

impl YamlConfig {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    /// Returns an error if:
    /// - The file cannot be read
    /// - The YAML is malformed
    /// - Required fields have invalid types
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        Self::from_yaml_str(&contents)
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self, ConfigError> {
        // An empty file deserializes to null
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Overrides every value present in the file.
    pub(super) fn apply(self, config: &mut ClientConfig) {
        if let Some(api) = self.api {
            if let Some(key) = api.api_key {
                config.api_key = Some(Zeroizing::new(key));
            }
            if let Some(url) = api.base_url {
                config.base_url = url;
            }
            if let Some(url) = api.ws_url {
                config.base_ws_url = url;
            }
        }

        if let Some(timeouts) = self.timeouts {
            if let Some(secs) = timeouts.request_seconds {
                config.request_timeout = Duration::from_secs(secs);
            }
            if let Some(secs) = timeouts.connect_seconds {
                config.connect_timeout = Duration::from_secs(secs);
            }
            if let Some(secs) = timeouts.drain_seconds {
                config.drain_timeout = Duration::from_secs(secs);
            }
        }

        if let Some(capacity) = self.stream.and_then(|stream| stream.metadata_capacity) {
            config.metadata_capacity = capacity;
        }
    }
}
