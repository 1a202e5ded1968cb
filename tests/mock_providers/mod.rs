//! Mock stream-input server
//!
//! Scripted WebSocket server speaking the stream-input protocol on a random
//! local port. Each [`Behavior`] simulates one way a session can end:
//! - clean synthesis with a final frame and a closing handshake
//! - connection drops, before or after the end-of-input frame
//! - malformed audio payloads
//! - handshake rejection and stalled handshakes

// Allow dead code in test infrastructure - not every test binary uses every helper
#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::accept_hdr_async;

/// How the mock reacts to a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    /// One audio frame per fragment; final frame and close after end of input
    Synthesize,
    /// Answer `n` fragments, then drop the TCP connection
    DropAfterFragments(usize),
    /// Answer every fragment, then drop the connection right after end of input
    DropAfterEnd,
    /// Answer the first fragment with invalid base64 audio
    BadAudio,
    /// Record everything, never answer
    Silent,
    /// Refuse the WebSocket upgrade with 401
    Reject,
    /// Accept TCP but never complete the upgrade
    Stall,
}

/// Upgrade request seen by the mock
#[derive(Debug, Clone, Default)]
pub struct RecordedRequest {
    pub path: String,
    pub query: Option<String>,
    pub api_key: Option<String>,
    pub accept: Option<String>,
}

#[derive(Default)]
struct Recorder {
    requests: Mutex<Vec<RecordedRequest>>,
    frames: Mutex<Vec<String>>,
    close_frames: AtomicUsize,
}

pub struct MockStreamServer {
    addr: std::net::SocketAddr,
    recorder: Arc<Recorder>,
    handle: JoinHandle<()>,
}

impl MockStreamServer {
    pub async fn start(behavior: Behavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let recorder = Arc::new(Recorder::default());

        let accept_recorder = recorder.clone();
        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let recorder = accept_recorder.clone();
                tokio::spawn(async move {
                    let _ = handle_connection(stream, behavior, recorder).await;
                });
            }
        });

        Self {
            addr,
            recorder,
            handle,
        }
    }

    /// Base WebSocket URL to configure the client with
    pub fn ws_url(&self) -> String {
        format!("ws://{}/v1", self.addr)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.recorder.requests.lock().clone()
    }

    /// Every text frame received, parsed as JSON, in arrival order
    pub fn frames(&self) -> Vec<Value> {
        self.recorder
            .frames
            .lock()
            .iter()
            .map(|frame| serde_json::from_str(frame).unwrap())
            .collect()
    }

    pub fn close_frames(&self) -> usize {
        self.recorder.close_frames.load(Ordering::SeqCst)
    }

    /// Waits until the client's close frame arrived or `within` elapsed
    pub async fn wait_for_close(&self, within: Duration) -> usize {
        let deadline = tokio::time::Instant::now() + within;
        while self.close_frames() == 0 && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.close_frames()
    }
}

impl Drop for MockStreamServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Audio frame whose payload is the fragment's own bytes, so tests can
/// compare the audio sink against the text that was sent.
pub fn audio_frame(text: &str) -> Value {
    let chars: Vec<String> = text.chars().map(String::from).collect();
    let starts: Vec<i64> = (0..chars.len() as i64).map(|i| i * 20).collect();
    let durations = vec![20i64; chars.len()];
    let alignment = json!({
        "charStartTimesMs": starts,
        "charDurationsMs": durations,
        "chars": chars,
    });

    json!({
        "audio": STANDARD.encode(text.as_bytes()),
        "isFinal": false,
        "normalizedAlignment": alignment,
        "alignment": alignment,
    })
}

pub fn final_frame() -> Value {
    json!({
        "audio": null,
        "isFinal": true,
        "normalizedAlignment": null,
        "alignment": null,
    })
}

async fn handle_connection(
    stream: TcpStream,
    behavior: Behavior,
    recorder: Arc<Recorder>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if behavior == Behavior::Stall {
        // Hold the socket open without answering the upgrade
        tokio::time::sleep(Duration::from_secs(30)).await;
        drop(stream);
        return Ok(());
    }

    let header_recorder = recorder.clone();
    let callback = move |req: &Request, response: Response| -> Result<Response, ErrorResponse> {
        let header = |name: &str| {
            req.headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        header_recorder.requests.lock().push(RecordedRequest {
            path: req.uri().path().to_string(),
            query: req.uri().query().map(str::to_string),
            api_key: header("xi-api-key"),
            accept: header("accept"),
        });

        if behavior == Behavior::Reject {
            let mut error = ErrorResponse::new(Some("invalid api key".to_string()));
            *error.status_mut() = StatusCode::UNAUTHORIZED;
            return Err(error);
        }
        Ok(response)
    };

    let ws_stream = accept_hdr_async(stream, callback).await?;
    let (mut write, mut read) = ws_stream.split();

    let mut fragments = 0usize;
    let mut configured = false;

    while let Some(msg) = read.next().await {
        let text = match msg? {
            Message::Text(text) => text.as_str().to_string(),
            Message::Close(_) => {
                recorder.close_frames.fetch_add(1, Ordering::SeqCst);
                break;
            }
            _ => continue,
        };
        recorder.frames.lock().push(text.clone());

        let frame: Value = serde_json::from_str(&text)?;
        let fragment = frame["text"].as_str().unwrap_or_default().to_string();

        if !configured {
            configured = true;
            continue;
        }

        if fragment.is_empty() {
            match behavior {
                Behavior::Synthesize => {
                    write
                        .send(Message::Text(final_frame().to_string().into()))
                        .await?;
                    write.close().await?;
                }
                // Abrupt drop without a closing handshake
                Behavior::DropAfterEnd => return Ok(()),
                _ => {}
            }
            continue;
        }

        fragments += 1;
        match behavior {
            Behavior::Silent => {}
            Behavior::BadAudio => {
                let bad = json!({"audio": "!!not-base64!!", "isFinal": false});
                write.send(Message::Text(bad.to_string().into())).await?;
            }
            _ => {
                write
                    .send(Message::Text(audio_frame(&fragment).to_string().into()))
                    .await?;
            }
        }

        if behavior == Behavior::DropAfterFragments(fragments) {
            return Ok(());
        }
    }

    Ok(())
}
