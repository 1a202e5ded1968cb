//! Wire messages of the stream-input WebSocket protocol.
//!
//! Outbound (client to server):
//! - [`InitialConfigFrame`]: opening frame carrying the seed text and voice settings
//! - [`TextFragment`]: one chunk of text; an empty text marks end of input
//!
//! Inbound (server to client):
//! - [`SynthesisFrame`]: base64 audio plus alignment data
//!
//! Inbound frames are split into raw audio bytes (written to the caller's
//! audio sink) and a [`StreamingOutputEvent`] holding everything else.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use super::config::VoiceSettings;
use crate::errors::{ClientError, ClientResult};

// =============================================================================
// Outbound Messages
// =============================================================================

/// First frame of every session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InitialConfigFrame {
    pub text: String,
    pub try_trigger_generation: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice_settings: Option<VoiceSettings>,
}

impl InitialConfigFrame {
    pub fn new(
        text: impl Into<String>,
        try_trigger_generation: bool,
        voice_settings: Option<VoiceSettings>,
    ) -> Self {
        Self {
            text: text.into(),
            try_trigger_generation,
            voice_settings,
        }
    }

    pub fn to_json(&self) -> ClientResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// A text fragment sent after the opening frame.
///
/// `try_trigger_generation` is omitted from the JSON when false, so the end of
/// input frame serializes as `{"text":""}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextFragment {
    pub text: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub try_trigger_generation: bool,
}

impl TextFragment {
    /// Continuation fragment asking the service to start generating.
    pub fn trigger(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            try_trigger_generation: true,
        }
    }

    /// End-of-input marker.
    pub fn end_of_input() -> Self {
        Self {
            text: String::new(),
            try_trigger_generation: false,
        }
    }

    pub fn is_end_of_input(&self) -> bool {
        self.text.is_empty()
    }

    pub fn to_json(&self) -> ClientResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

// =============================================================================
// Inbound Messages
// =============================================================================

/// Per-character timing data. The three sequences are parallel: index `i`
/// describes one character.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlignmentSegment {
    #[serde(default)]
    pub char_start_times_ms: Vec<i64>,
    #[serde(default)]
    pub char_durations_ms: Vec<i64>,
    #[serde(default)]
    pub chars: Vec<String>,
}

impl AlignmentSegment {
    #[inline]
    pub fn len(&self) -> usize {
        self.chars.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    /// True when all three sequences have the same length.
    pub fn is_consistent(&self) -> bool {
        self.char_start_times_ms.len() == self.chars.len()
            && self.char_durations_ms.len() == self.chars.len()
    }

    /// Iterates `(start_ms, duration_ms, char)` triples.
    pub fn iter(&self) -> impl Iterator<Item = (i64, i64, &str)> {
        self.char_start_times_ms
            .iter()
            .zip(&self.char_durations_ms)
            .zip(&self.chars)
            .map(|((start, duration), ch)| (*start, *duration, ch.as_str()))
    }

    /// End of the last character in milliseconds.
    pub fn end_ms(&self) -> Option<i64> {
        self.iter().last().map(|(start, duration, _)| start + duration)
    }
}

/// One inbound frame as sent by the service.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SynthesisFrame {
    /// Base64 audio; `null` or missing means no audio in this frame
    #[serde(default)]
    pub audio: Option<String>,

    #[serde(default)]
    pub is_final: Option<bool>,

    #[serde(default)]
    pub normalized_alignment: Option<AlignmentSegment>,

    #[serde(default)]
    pub alignment: Option<AlignmentSegment>,
}

impl SynthesisFrame {
    pub fn from_json(text: &str) -> ClientResult<Self> {
        serde_json::from_str(text)
            .map_err(|e| ClientError::Decode(format!("malformed synthesis frame: {e}")))
    }

    /// Decodes the audio payload. Missing audio decodes to an empty buffer.
    pub fn decode_audio(&self) -> ClientResult<Vec<u8>> {
        match self.audio.as_deref() {
            None | Some("") => Ok(Vec::new()),
            Some(encoded) => STANDARD
                .decode(encoded)
                .map_err(|e| ClientError::Decode(format!("invalid base64 audio: {e}"))),
        }
    }

    /// Splits the frame into decoded audio bytes and the metadata event.
    pub fn into_parts(self) -> ClientResult<(Vec<u8>, StreamingOutputEvent)> {
        let audio = self.decode_audio()?;
        let event = StreamingOutputEvent {
            is_final: self.is_final.unwrap_or(false),
            normalized_alignment: self.normalized_alignment,
            alignment: self.alignment,
        };
        Ok((audio, event))
    }
}

/// Metadata delivered for every inbound frame. Audio bytes are written to the
/// audio sink and are not repeated here.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamingOutputEvent {
    pub is_final: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normalized_alignment: Option<AlignmentSegment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alignment: Option<AlignmentSegment>,
}
