//! Query string modifiers shared by streaming sessions and unary requests.

use url::Url;

use crate::core::stream::config::OutputFormat;
use crate::errors::{ClientError, ClientResult};

/// Highest accepted `optimize_streaming_latency` level.
pub const MAX_LATENCY_OPTIMIZATION: u8 = 4;

/// One query parameter added to a request URL.
///
/// Modifiers are applied in order. Adding the same key twice appends a second
/// value rather than replacing the first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryModifier {
    /// `output_format`, e.g. `pcm_16000`
    OutputFormat(OutputFormat),

    /// `optimize_streaming_latency`:
    /// 0 = default, 1 = normal, 2 = strong, 3 = max,
    /// 4 = max with the text normalizer turned off.
    LatencyOptimizations(u8),

    /// Any other key/value pair
    Custom(String, String),
}

impl QueryModifier {
    pub fn key(&self) -> &str {
        match self {
            Self::OutputFormat(_) => "output_format",
            Self::LatencyOptimizations(_) => "optimize_streaming_latency",
            Self::Custom(key, _) => key,
        }
    }

    pub fn value(&self) -> String {
        match self {
            Self::OutputFormat(format) => format.as_str().to_string(),
            Self::LatencyOptimizations(level) => level.to_string(),
            Self::Custom(_, value) => value.clone(),
        }
    }

    pub fn validate(&self) -> ClientResult<()> {
        match self {
            Self::LatencyOptimizations(level) if *level > MAX_LATENCY_OPTIMIZATION => {
                Err(ClientError::InvalidConfiguration(format!(
                    "optimize_streaming_latency must be between 0 and {MAX_LATENCY_OPTIMIZATION}, got {level}"
                )))
            }
            Self::Custom(key, _) if key.is_empty() => Err(ClientError::InvalidConfiguration(
                "query parameter key must not be empty".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

/// Validates and appends `modifiers` to `url`.
pub fn apply_modifiers(url: &mut Url, modifiers: &[QueryModifier]) -> ClientResult<()> {
    for modifier in modifiers {
        modifier.validate()?;
    }
    if modifiers.is_empty() {
        return Ok(());
    }

    let mut pairs = url.query_pairs_mut();
    for modifier in modifiers {
        pairs.append_pair(modifier.key(), &modifier.value());
    }
    drop(pairs);
    Ok(())
}
