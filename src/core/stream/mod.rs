//! Bidirectional streaming text-to-speech over the stream-input WebSocket.

pub mod config;
pub mod messages;
pub mod session;

pub use config::{OutputFormat, StreamRequest, VoiceSettings};
pub use messages::{
    AlignmentSegment, InitialConfigFrame, StreamingOutputEvent, SynthesisFrame, TextFragment,
};
pub use session::{SessionTimeouts, StreamingSession, build_stream_url};

/// Default WebSocket base URL.
pub const DEFAULT_WS_URL: &str = "wss://api.elevenlabs.io/v1";

/// Default capacity of the metadata event channel handed to a session.
pub const DEFAULT_METADATA_CAPACITY: usize = 64;
