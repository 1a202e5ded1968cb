//! Streaming session configuration types.
//!
//! This module defines the audio output formats accepted by the stream-input
//! endpoint, the voice settings sent in the opening frame, and the request
//! describing one streaming session.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::query::QueryModifier;
use crate::errors::{ClientError, ClientResult};

// =============================================================================
// Output Format
// =============================================================================

/// Audio encoding of the synthesized stream (`output_format` query parameter).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum OutputFormat {
    /// mp3, 22.05kHz, 32kbps
    #[serde(rename = "mp3_22050_32")]
    Mp3_22050_32,
    /// mp3, 44.1kHz, 32kbps
    #[serde(rename = "mp3_44100_32")]
    Mp3_44100_32,
    /// mp3, 44.1kHz, 64kbps
    #[serde(rename = "mp3_44100_64")]
    Mp3_44100_64,
    /// mp3, 44.1kHz, 96kbps
    #[serde(rename = "mp3_44100_96")]
    Mp3_44100_96,
    /// mp3, 44.1kHz, 128kbps (service default)
    #[default]
    #[serde(rename = "mp3_44100_128")]
    Mp3_44100_128,
    /// mp3, 44.1kHz, 192kbps (Creator tier or above)
    #[serde(rename = "mp3_44100_192")]
    Mp3_44100_192,
    /// PCM S16LE, 16kHz
    #[serde(rename = "pcm_16000")]
    Pcm16000,
    /// PCM S16LE, 22.05kHz
    #[serde(rename = "pcm_22050")]
    Pcm22050,
    /// PCM S16LE, 24kHz
    #[serde(rename = "pcm_24000")]
    Pcm24000,
    /// PCM S16LE, 44.1kHz (Independent Publisher tier or above)
    #[serde(rename = "pcm_44100")]
    Pcm44100,
    /// G.711 mu-law, 8kHz (telephony)
    #[serde(rename = "ulaw_8000")]
    Ulaw8000,
}

impl OutputFormat {
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Mp3_22050_32 => "mp3_22050_32",
            Self::Mp3_44100_32 => "mp3_44100_32",
            Self::Mp3_44100_64 => "mp3_44100_64",
            Self::Mp3_44100_96 => "mp3_44100_96",
            Self::Mp3_44100_128 => "mp3_44100_128",
            Self::Mp3_44100_192 => "mp3_44100_192",
            Self::Pcm16000 => "pcm_16000",
            Self::Pcm22050 => "pcm_22050",
            Self::Pcm24000 => "pcm_24000",
            Self::Pcm44100 => "pcm_44100",
            Self::Ulaw8000 => "ulaw_8000",
        }
    }

    /// Sample rate in Hz.
    #[inline]
    pub const fn sample_rate(&self) -> u32 {
        match self {
            Self::Mp3_22050_32 | Self::Pcm22050 => 22050,
            Self::Mp3_44100_32
            | Self::Mp3_44100_64
            | Self::Mp3_44100_96
            | Self::Mp3_44100_128
            | Self::Mp3_44100_192
            | Self::Pcm44100 => 44100,
            Self::Pcm16000 => 16000,
            Self::Pcm24000 => 24000,
            Self::Ulaw8000 => 8000,
        }
    }

    /// MIME type of the raw audio bytes.
    #[inline]
    pub const fn content_type(&self) -> &'static str {
        match self {
            Self::Mp3_22050_32
            | Self::Mp3_44100_32
            | Self::Mp3_44100_64
            | Self::Mp3_44100_96
            | Self::Mp3_44100_128
            | Self::Mp3_44100_192 => "audio/mpeg",
            Self::Pcm16000 | Self::Pcm22050 | Self::Pcm24000 | Self::Pcm44100 => "audio/pcm",
            Self::Ulaw8000 => "audio/basic",
        }
    }

    /// File extension used by the CLI when writing audio.
    #[inline]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Pcm16000 | Self::Pcm22050 | Self::Pcm24000 | Self::Pcm44100 => "pcm",
            Self::Ulaw8000 => "ulaw",
            _ => "mp3",
        }
    }

    pub const fn all() -> &'static [Self] {
        &[
            Self::Mp3_22050_32,
            Self::Mp3_44100_32,
            Self::Mp3_44100_64,
            Self::Mp3_44100_96,
            Self::Mp3_44100_128,
            Self::Mp3_44100_192,
            Self::Pcm16000,
            Self::Pcm22050,
            Self::Pcm24000,
            Self::Pcm44100,
            Self::Ulaw8000,
        ]
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        Self::all()
            .iter()
            .copied()
            .find(|format| format.as_str() == lower)
            .ok_or_else(|| {
                ClientError::InvalidConfiguration(format!("Unsupported output format: {s}"))
            })
    }
}

// =============================================================================
// Voice Settings
// =============================================================================

/// Voice settings sent with the opening frame. Every field is optional and
/// passed through untouched; the service applies its defaults for missing ones.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct VoiceSettings {
    /// Lower values are more expressive (0.0-1.0)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stability: Option<f32>,

    /// Higher values stay closer to the original voice (0.0-1.0)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity_boost: Option<f32>,

    /// Style exaggeration (0.0-1.0)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_speaker_boost: Option<bool>,
}

impl VoiceSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets stability, clamped to 0.0-1.0.
    pub fn with_stability(mut self, stability: f32) -> Self {
        self.stability = Some(stability.clamp(0.0, 1.0));
        self
    }

    /// Sets similarity boost, clamped to 0.0-1.0.
    pub fn with_similarity_boost(mut self, similarity_boost: f32) -> Self {
        self.similarity_boost = Some(similarity_boost.clamp(0.0, 1.0));
        self
    }

    /// Sets style, clamped to 0.0-1.0.
    pub fn with_style(mut self, style: f32) -> Self {
        self.style = Some(style.clamp(0.0, 1.0));
        self
    }

    pub fn with_speaker_boost(mut self, enabled: bool) -> Self {
        self.use_speaker_boost = Some(enabled);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Rejects values outside 0.0-1.0 (including NaN).
    pub fn validate(&self) -> ClientResult<()> {
        for (name, value) in [
            ("stability", self.stability),
            ("similarity_boost", self.similarity_boost),
            ("style", self.style),
        ] {
            if let Some(v) = value
                && !(0.0..=1.0).contains(&v)
            {
                return Err(ClientError::InvalidConfiguration(format!(
                    "{name} must be between 0.0 and 1.0, got {v}"
                )));
            }
        }
        Ok(())
    }
}

// =============================================================================
// Stream Request
// =============================================================================

/// Everything that identifies one streaming session besides its channels.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamRequest {
    pub voice_id: String,
    pub model_id: String,

    /// Text of the opening frame. The service expects a single space.
    pub initial_text: String,

    /// `try_trigger_generation` on the opening frame
    pub try_trigger_generation: bool,

    pub voice_settings: Option<VoiceSettings>,

    pub query: Vec<QueryModifier>,
}

impl StreamRequest {
    pub fn new(voice_id: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self {
            voice_id: voice_id.into(),
            model_id: model_id.into(),
            initial_text: " ".to_string(),
            try_trigger_generation: false,
            voice_settings: None,
            query: Vec::new(),
        }
    }

    pub fn with_voice_settings(mut self, settings: VoiceSettings) -> Self {
        self.voice_settings = Some(settings);
        self
    }

    pub fn with_output_format(mut self, format: OutputFormat) -> Self {
        self.query.push(QueryModifier::OutputFormat(format));
        self
    }

    pub fn with_latency_optimizations(mut self, level: u8) -> Self {
        self.query.push(QueryModifier::LatencyOptimizations(level));
        self
    }

    pub fn with_query(mut self, modifier: QueryModifier) -> Self {
        self.query.push(modifier);
        self
    }

    pub fn with_initial_text(mut self, text: impl Into<String>) -> Self {
        self.initial_text = text.into();
        self
    }

    pub fn with_try_trigger_generation(mut self, trigger: bool) -> Self {
        self.try_trigger_generation = trigger;
        self
    }

    /// Output format requested through the query modifiers, if any.
    pub fn output_format(&self) -> Option<OutputFormat> {
        self.query.iter().rev().find_map(|m| match m {
            QueryModifier::OutputFormat(format) => Some(*format),
            _ => None,
        })
    }

    pub fn validate(&self) -> ClientResult<()> {
        if self.voice_id.trim().is_empty() {
            return Err(ClientError::InvalidConfiguration(
                "voice_id is required".to_string(),
            ));
        }
        if self.model_id.trim().is_empty() {
            return Err(ClientError::InvalidConfiguration(
                "model_id is required".to_string(),
            ));
        }
        if let Some(settings) = &self.voice_settings {
            settings.validate()?;
        }
        for modifier in &self.query {
            modifier.validate()?;
        }
        Ok(())
    }
}
