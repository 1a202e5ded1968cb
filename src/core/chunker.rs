//! Punctuation-aware text chunking for incremental synthesis.
//!
//! The chunker reassembles a live sequence of word tokens into fragments that
//! the synthesis service can start speaking early. It keeps a running buffer
//! and flushes it whenever the buffer ends with a [`Splitter`] or the next
//! token starts with one.
//!
//! Tokens are concatenated without a separator. Callers that want spaces
//! between words pass tokens that keep their trailing whitespace (see
//! [`crate::core::tokenizer::words`]); a buffer ending in a space then flushes
//! on the next token, which yields roughly one fragment per word.
//!
//! # Example
//!
//! ```rust
//! use elevenlabs_stream::core::chunker::TextChunker;
//!
//! let mut chunker = TextChunker::new();
//! assert_eq!(chunker.push("Hello"), None);
//! assert_eq!(chunker.push(",world").as_deref(), Some("Hello, "));
//! assert_eq!(chunker.finish().as_deref(), Some("world"));
//! ```

use tokio::sync::mpsc;
use tracing::trace;

/// Default capacity of the fragment channel created by [`spawn_chunker`].
pub const DEFAULT_FRAGMENT_CAPACITY: usize = 32;

// =============================================================================
// Splitter
// =============================================================================

/// A delimiter that ends a fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Splitter {
    Period,
    Comma,
    QuestionMark,
    ExclamationMark,
    Semicolon,
    Colon,
    /// U+2014
    EmDash,
    Hyphen,
    OpenParen,
    CloseParen,
    OpenBracket,
    CloseBracket,
    CloseBrace,
    Space,
}

impl Splitter {
    /// Every splitter, in the order the service documentation lists them.
    pub const ALL: [Splitter; 14] = [
        Self::Period,
        Self::Comma,
        Self::QuestionMark,
        Self::ExclamationMark,
        Self::Semicolon,
        Self::Colon,
        Self::EmDash,
        Self::Hyphen,
        Self::OpenParen,
        Self::CloseParen,
        Self::OpenBracket,
        Self::CloseBracket,
        Self::CloseBrace,
        Self::Space,
    ];

    #[inline]
    pub const fn as_char(&self) -> char {
        match self {
            Self::Period => '.',
            Self::Comma => ',',
            Self::QuestionMark => '?',
            Self::ExclamationMark => '!',
            Self::Semicolon => ';',
            Self::Colon => ':',
            Self::EmDash => '\u{2014}',
            Self::Hyphen => '-',
            Self::OpenParen => '(',
            Self::CloseParen => ')',
            Self::OpenBracket => '[',
            Self::CloseBracket => ']',
            Self::CloseBrace => '}',
            Self::Space => ' ',
        }
    }

    /// Classifies a character, returning `None` for anything that is not a splitter.
    #[inline]
    pub const fn from_char(c: char) -> Option<Self> {
        Some(match c {
            '.' => Self::Period,
            ',' => Self::Comma,
            '?' => Self::QuestionMark,
            '!' => Self::ExclamationMark,
            ';' => Self::Semicolon,
            ':' => Self::Colon,
            '\u{2014}' => Self::EmDash,
            '-' => Self::Hyphen,
            '(' => Self::OpenParen,
            ')' => Self::CloseParen,
            '[' => Self::OpenBracket,
            ']' => Self::CloseBracket,
            '}' => Self::CloseBrace,
            ' ' => Self::Space,
            _ => return None,
        })
    }

    /// Splitter at the end of `s`, if any.
    #[inline]
    pub fn trailing(s: &str) -> Option<Self> {
        s.chars().next_back().and_then(Self::from_char)
    }

    /// Splitter at the start of `s`, if any.
    #[inline]
    pub fn leading(s: &str) -> Option<Self> {
        s.chars().next().and_then(Self::from_char)
    }
}

impl std::fmt::Display for Splitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

// =============================================================================
// TextChunker
// =============================================================================

/// Incremental chunker state: the running buffer.
#[derive(Debug, Clone, Default)]
pub struct TextChunker {
    buffer: String,
}

impl TextChunker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one token and returns the fragment it completed, if any.
    ///
    /// A token completes at most one fragment. Emitted fragments always end
    /// with a space.
    pub fn push(&mut self, token: &str) -> Option<String> {
        if Splitter::trailing(&self.buffer).is_some() {
            let fragment = std::mem::replace(&mut self.buffer, token.to_owned());
            return Some(with_trailing_space(fragment));
        }

        if let Some(first) = token.chars().next()
            && Splitter::from_char(first).is_some()
        {
            let mut fragment = std::mem::take(&mut self.buffer);
            fragment.push(first);
            self.buffer.push_str(&token[first.len_utf8()..]);
            return Some(with_trailing_space(fragment));
        }

        self.buffer.push_str(token);
        None
    }

    /// Drains the buffer once the token source is exhausted.
    ///
    /// The final fragment is returned as-is, without space normalization.
    pub fn finish(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.buffer))
        }
    }

    /// Text accumulated but not yet emitted.
    pub fn buffered(&self) -> &str {
        &self.buffer
    }

    /// Chunks a complete token sequence in one go.
    pub fn chunk_all<I, S>(tokens: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut chunker = Self::new();
        let mut fragments: Vec<String> = tokens
            .into_iter()
            .filter_map(|token| chunker.push(token.as_ref()))
            .collect();
        fragments.extend(chunker.finish());
        fragments
    }
}

#[inline]
fn with_trailing_space(mut fragment: String) -> String {
    if !fragment.ends_with(' ') {
        fragment.push(' ');
    }
    fragment
}

// =============================================================================
// Channel adapter
// =============================================================================

/// Runs a [`TextChunker`] as a lightweight task between two channels.
///
/// The returned receiver yields fragments in token order and closes after the
/// token channel closes and the last fragment has been delivered. The fragment
/// channel is bounded by `capacity`, so a slow consumer suspends the task.
pub fn spawn_chunker(mut tokens: mpsc::Receiver<String>, capacity: usize) -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(capacity.max(1));

    tokio::spawn(async move {
        let mut chunker = TextChunker::new();
        while let Some(token) = tokens.recv().await {
            if let Some(fragment) = chunker.push(&token) {
                trace!(fragment = %fragment, "chunker emitted fragment");
                if tx.send(fragment).await.is_err() {
                    return;
                }
            }
        }
        if let Some(fragment) = chunker.finish() {
            let _ = tx.send(fragment).await;
        }
    });

    rx
}
