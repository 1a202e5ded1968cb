pub mod chunker;
pub mod http;
pub mod query;
pub mod stream;
pub mod tokenizer;

// Re-export commonly used types for convenience
pub use chunker::{Splitter, TextChunker, spawn_chunker};
pub use http::{DEFAULT_BASE_URL, HttpTransport, RequestPerformer};
pub use query::QueryModifier;
pub use stream::{
    AlignmentSegment, OutputFormat, SessionTimeouts, StreamRequest, StreamingOutputEvent,
    StreamingSession, SynthesisFrame, TextFragment, VoiceSettings,
};
pub use tokenizer::{spawn_word_reader, words};
