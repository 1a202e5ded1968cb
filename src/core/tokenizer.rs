//! Whitespace word tokenizer feeding the chunker.
//!
//! Each token is one word followed by a single space when whitespace followed
//! the word in the source text. Runs of whitespace (including newlines) are
//! collapsed into that one space, so the chunker's space splitter sees a word
//! boundary after every word.

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Default capacity of the token channel created by [`spawn_word_reader`].
pub const DEFAULT_TOKEN_CAPACITY: usize = 64;

/// Splits `text` into word tokens.
///
/// ```rust
/// use elevenlabs_stream::core::tokenizer::words;
///
/// assert_eq!(words("Hello  big\nworld"), vec!["Hello ", "big ", "world"]);
/// ```
pub fn words(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut rest = text.trim_start();

    while !rest.is_empty() {
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        let (word, tail) = rest.split_at(end);
        let trimmed = tail.trim_start();

        let mut token = word.to_owned();
        if !tail.is_empty() {
            token.push(' ');
        }
        tokens.push(token);
        rest = trimmed;
    }

    tokens
}

/// Streams word tokens from an async reader.
///
/// The reader is consumed line by line; a line break counts as whitespace, so
/// the last word of every non-final line carries a trailing space. Bytes that
/// are not valid UTF-8 are replaced with U+FFFD and reading continues. The
/// channel closes at EOF, on an I/O error (logged), or when the receiver is
/// dropped.
pub fn spawn_word_reader<R>(reader: R, capacity: usize) -> mpsc::Receiver<String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(capacity.max(1));

    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        let mut pending: Option<String> = None;
        let mut count = 0usize;

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) => {
                    warn!("Failed to read text input: {e}");
                    break;
                }
            }

            // Invalid UTF-8 becomes U+FFFD instead of ending the input
            let line = String::from_utf8_lossy(&buf);
            for token in words(&line) {
                // A word that ended the previous line is now followed by a newline.
                if let Some(mut prev) = pending.take() {
                    if !prev.ends_with(' ') {
                        prev.push(' ');
                    }
                    if tx.send(prev).await.is_err() {
                        return;
                    }
                    count += 1;
                }
                pending = Some(token);
            }
        }

        if let Some(last) = pending.take()
            && tx.send(last).await.is_ok()
        {
            count += 1;
        }
        debug!(tokens = count, "Text input exhausted");
    });

    rx
}
