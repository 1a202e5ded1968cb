//! Streaming session driver.
//!
//! One [`StreamingSession`] runs a single exchange over the stream-input
//! WebSocket:
//!
//! 1. Handshake: dial and send the [`InitialConfigFrame`].
//! 2. Relay: a reader and a writer run concurrently on the caller's task.
//!    The reader decodes inbound frames into audio bytes and metadata events.
//!    The writer chunks incoming tokens and sends them as text fragments.
//! 3. Drain/close: after clean input exhaustion the end-of-input frame is sent
//!    and the reader keeps draining audio until the service closes. The
//!    socket is then closed and the reader joined before the result is read.
//!
//! Both activities share a [`SessionState`] holding the `active` and `errored`
//! flags and a single fault slot where the first recorded fault wins.

use std::time::Duration;

use futures::{Sink, SinkExt, Stream, StreamExt};
use parking_lot::Mutex;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};
use url::Url;
use uuid::Uuid;

use super::config::StreamRequest;
use super::messages::{InitialConfigFrame, StreamingOutputEvent, SynthesisFrame, TextFragment};
use crate::core::chunker::TextChunker;
use crate::core::query::apply_modifiers;
use crate::errors::{ClientError, ClientResult};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Upper bound for the closing handshake once both activities have stopped.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

// =============================================================================
// Session State
// =============================================================================

#[derive(Debug)]
struct Fault {
    error: ClientError,
    /// Whether the session was still active when the fault was recorded
    while_active: bool,
}

/// State shared by the reader and the writer.
#[derive(Debug)]
pub(crate) struct SessionState {
    /// Cleared once the writer has exhausted its input and starts draining.
    active: bool,
    /// Set on faults that are never part of an ordinary shutdown.
    errored: bool,
    fault: Option<Fault>,
}

impl SessionState {
    pub(crate) fn new() -> Self {
        Self {
            active: true,
            errored: false,
            fault: None,
        }
    }

    /// Records `error` unless a fault is already present. Returns whether it
    /// was stored.
    pub(crate) fn record(&mut self, error: ClientError, errored: bool) -> bool {
        if errored {
            self.errored = true;
        }
        if self.fault.is_some() {
            debug!("Dropping secondary fault: {error}");
            return false;
        }
        self.fault = Some(Fault {
            error,
            while_active: self.active,
        });
        true
    }

    fn should_finish(&self) -> bool {
        self.active && !self.errored
    }

    pub(crate) fn into_result(self) -> ClientResult<()> {
        match self.fault {
            Some(fault) if fault.while_active || self.errored => Err(fault.error),
            Some(fault) => {
                debug!("Ignoring fault after end of input: {}", fault.error);
                Ok(())
            }
            None => Ok(()),
        }
    }
}

/// Why the writer loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterExit {
    /// The token source closed and every fragment was sent
    Exhausted,
    /// The input token fired (reader fault or parent cancellation)
    Cancelled,
    /// A socket write failed; the fault is already recorded
    Failed,
}

/// Timeouts applied by a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTimeouts {
    /// Dial plus opening handshake
    pub connect: Duration,
    /// How long the reader may keep draining after the end-of-input frame
    pub drain: Duration,
}

impl Default for SessionTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(10),
            drain: Duration::from_secs(20),
        }
    }
}

// =============================================================================
// Streaming Session
// =============================================================================

/// A prepared streaming exchange. Created by
/// [`Client::text_to_speech_input_stream`](crate::Client::text_to_speech_input_stream)
/// or directly with [`StreamingSession::new`].
#[derive(Debug)]
pub struct StreamingSession {
    session_id: Uuid,
    url: Url,
    api_key: Option<HeaderValue>,
    request: StreamRequest,
    timeouts: SessionTimeouts,
}

impl StreamingSession {
    pub fn new(
        base_ws_url: &Url,
        api_key: Option<&str>,
        request: StreamRequest,
        timeouts: SessionTimeouts,
    ) -> ClientResult<Self> {
        request.validate()?;
        let url = build_stream_url(base_ws_url, &request)?;

        let api_key = match api_key.filter(|key| !key.is_empty()) {
            Some(key) => {
                let mut value = HeaderValue::from_str(key).map_err(|_| {
                    ClientError::InvalidConfiguration(
                        "API key contains invalid header characters".to_string(),
                    )
                })?;
                value.set_sensitive(true);
                Some(value)
            }
            None => None,
        };

        Ok(Self {
            session_id: Uuid::new_v4(),
            url,
            api_key,
            request,
            timeouts,
        })
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Full connection URL including query parameters.
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn request(&self) -> &StreamRequest {
        &self.request
    }

    /// Runs the session to completion.
    ///
    /// `tokens` carries raw word tokens; they are chunked here and every
    /// fragment is sent with `try_trigger_generation` set. One metadata event
    /// is sent on `metadata` per inbound frame; the channel stays open and
    /// belongs to the caller. Decoded audio is written to `audio` in arrival
    /// order.
    ///
    /// Returns the first fault that happened while the session was active,
    /// or any decode/write fault. Read errors caused by the deliberate close
    /// after the end-of-input frame are not reported. If the service does not
    /// close within the drain timeout after the end-of-input frame, the
    /// output may be missing trailing audio and [`ClientError::Timeout`] is
    /// returned. Cancelling `parent` stops both activities and returns
    /// `Ok(())` unless a fault was already recorded.
    pub async fn run<W>(
        self,
        parent: CancellationToken,
        tokens: mpsc::Receiver<String>,
        metadata: &mpsc::Sender<StreamingOutputEvent>,
        audio: &mut W,
    ) -> ClientResult<()>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let span = info_span!(
            "tts_stream",
            session_id = %self.session_id,
            voice_id = %self.request.voice_id,
            model_id = %self.request.model_id,
        );

        self.run_inner(parent, tokens, metadata, audio)
            .instrument(span)
            .await
    }

    async fn run_inner<W>(
        self,
        parent: CancellationToken,
        tokens: mpsc::Receiver<String>,
        metadata: &mpsc::Sender<StreamingOutputEvent>,
        audio: &mut W,
    ) -> ClientResult<()>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        // Phase 1: handshake
        let socket = tokio::select! {
            biased;
            _ = parent.cancelled() => {
                return Err(ClientError::ConnectionFailed(
                    "cancelled before the session opened".to_string(),
                ));
            }
            socket = self.connect() => socket?,
        };
        let (mut sink, mut stream) = socket.split();

        let config = InitialConfigFrame::new(
            self.request.initial_text.clone(),
            self.request.try_trigger_generation,
            self.request.voice_settings,
        );
        if let Err(e) = send_json(&mut sink, config.to_json()).await {
            close_socket(&mut sink).await;
            return Err(ClientError::ConnectionFailed(format!(
                "failed to send configuration frame: {e}"
            )));
        }
        debug!("Configuration frame sent");

        // Phase 2: concurrent relay
        let state = Mutex::new(SessionState::new());
        let input = parent.child_token();
        let reader_stop = CancellationToken::new();
        let reader_done = CancellationToken::new();

        let reader = async {
            let _done = reader_done.clone().drop_guard();
            read_frames(
                &mut stream,
                &state,
                audio,
                metadata,
                &parent,
                &reader_stop,
                &input,
            )
            .await
        };

        let writer = async {
            let exit = write_fragments(&mut sink, tokens, &state, &input).await;
            debug!(?exit, "Writer stopped");

            // Phase 3: drain and close
            let finish = exit == WriterExit::Exhausted && state.lock().should_finish();
            if finish {
                state.lock().active = false;

                let sent = tokio::select! {
                    biased;
                    _ = input.cancelled() => None,
                    sent = send_json(&mut sink, TextFragment::end_of_input().to_json()) => Some(sent),
                };

                match sent {
                    Some(Ok(())) => {
                        debug!("End-of-input frame sent, draining");
                        tokio::select! {
                            _ = reader_done.cancelled() => {}
                            _ = parent.cancelled() => {}
                            _ = tokio::time::sleep(self.timeouts.drain) => {
                                warn!(
                                    "Service did not close within {:?} after end of input",
                                    self.timeouts.drain
                                );
                                // Trailing audio is missing; not an ordinary shutdown
                                state.lock().record(
                                    ClientError::Timeout(format!(
                                        "service did not finish within {:?} after end of input",
                                        self.timeouts.drain
                                    )),
                                    true,
                                );
                            }
                        }
                    }
                    Some(Err(e)) => {
                        state.lock().record(e, true);
                    }
                    None => {}
                }
            }

            reader_stop.cancel();
        };

        let (stats, ()) = tokio::join!(reader, writer);

        close_socket(&mut sink).await;

        if let Err(e) = audio.flush().await {
            state
                .lock()
                .record(ClientError::AudioSink(format!("flush failed: {e}")), true);
        }

        let result = state.into_inner().into_result();
        match &result {
            Ok(()) => info!(
                frames = stats.frames,
                audio_bytes = stats.audio_bytes,
                "Streaming session finished"
            ),
            Err(e) => warn!(
                frames = stats.frames,
                audio_bytes = stats.audio_bytes,
                "Streaming session failed: {e}"
            ),
        }
        result
    }

    async fn connect(&self) -> ClientResult<WsStream> {
        debug!(
            "Connecting to {}://{}{}",
            self.url.scheme(),
            self.url.host_str().unwrap_or_default(),
            self.url.path()
        );

        let mut request = self
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| ClientError::InvalidConfiguration(format!("invalid stream URL: {e}")))?;
        let headers = request.headers_mut();
        headers.insert("Accept", HeaderValue::from_static("*/*"));
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        if let Some(key) = &self.api_key {
            headers.insert("xi-api-key", key.clone());
        }

        let (socket, response) = match timeout(self.timeouts.connect, connect_async(request)).await
        {
            Ok(Ok(connected)) => connected,
            Ok(Err(e)) => {
                return Err(ClientError::ConnectionFailed(format!(
                    "WebSocket connection failed: {e}"
                )));
            }
            Err(_) => {
                return Err(ClientError::Timeout(format!(
                    "connection not established within {:?}",
                    self.timeouts.connect
                )));
            }
        };

        info!("Connected (status: {})", response.status());
        Ok(socket)
    }
}

/// Builds `{base}/text-to-speech/{voice_id}/stream-input?model_id={model_id}`
/// followed by the request's query modifiers.
pub fn build_stream_url(base_ws_url: &Url, request: &StreamRequest) -> ClientResult<Url> {
    let mut url = base_ws_url.clone();
    url.set_query(None);
    url.path_segments_mut()
        .map_err(|_| {
            ClientError::InvalidConfiguration(format!(
                "WebSocket base URL cannot carry a path: {base_ws_url}"
            ))
        })?
        .pop_if_empty()
        .extend(["text-to-speech", request.voice_id.as_str(), "stream-input"]);

    url.query_pairs_mut()
        .append_pair("model_id", &request.model_id);
    apply_modifiers(&mut url, &request.query)?;
    Ok(url)
}

// =============================================================================
// Reader
// =============================================================================

#[derive(Debug, Default, Clone, Copy)]
struct ReaderStats {
    frames: usize,
    audio_bytes: usize,
}

/// Records a fault raised by the reader and stops the writer.
fn reader_fault(state: &Mutex<SessionState>, input: &CancellationToken, error: ClientError) {
    warn!("Reader fault: {error}");
    state.lock().record(error, true);
    input.cancel();
}

async fn read_frames<S, W>(
    stream: &mut S,
    state: &Mutex<SessionState>,
    audio: &mut W,
    metadata: &mpsc::Sender<StreamingOutputEvent>,
    parent: &CancellationToken,
    stop: &CancellationToken,
    input: &CancellationToken,
) -> ReaderStats
where
    S: Stream<Item = Result<Message, WsError>> + Unpin,
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut stats = ReaderStats::default();

    loop {
        let next = tokio::select! {
            biased;
            _ = parent.cancelled() => break,
            _ = stop.cancelled() => break,
            next = stream.next() => next,
        };

        let payload = match next {
            Some(Ok(Message::Text(text))) => text.as_str().to_owned(),
            Some(Ok(Message::Binary(data))) => match String::from_utf8(data.to_vec()) {
                Ok(text) => text,
                Err(e) => {
                    reader_fault(
                        state,
                        input,
                        ClientError::Decode(format!("binary frame is not UTF-8: {e}")),
                    );
                    break;
                }
            },
            Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => continue,
            Some(Ok(Message::Close(frame))) => {
                let reason = frame
                    .map(|f| format!("{} {}", f.code, f.reason.as_str()))
                    .unwrap_or_else(|| "no close frame".to_string());
                if state.lock().active {
                    reader_fault(
                        state,
                        input,
                        ClientError::Transport(format!("connection closed by remote: {reason}")),
                    );
                } else {
                    debug!("Service closed the stream: {reason}");
                }
                break;
            }
            Some(Err(e)) => {
                if state.lock().active {
                    reader_fault(state, input, ClientError::Transport(e.to_string()));
                } else {
                    debug!("Read ended after end of input: {e}");
                }
                break;
            }
            None => {
                if state.lock().active {
                    reader_fault(
                        state,
                        input,
                        ClientError::Transport("connection closed by remote".to_string()),
                    );
                }
                break;
            }
        };

        let (bytes, event) = match SynthesisFrame::from_json(&payload).and_then(|f| f.into_parts())
        {
            Ok(parts) => parts,
            Err(e) => {
                reader_fault(state, input, e);
                break;
            }
        };

        if !bytes.is_empty() {
            if let Err(e) = audio.write_all(&bytes).await {
                reader_fault(state, input, ClientError::AudioSink(e.to_string()));
                break;
            }
            stats.audio_bytes += bytes.len();
        }
        stats.frames += 1;

        let is_final = event.is_final;
        tokio::select! {
            biased;
            _ = parent.cancelled() => break,
            _ = stop.cancelled() => break,
            delivered = metadata.send(event) => {
                if delivered.is_err() {
                    debug!("Metadata receiver dropped, event discarded");
                }
            }
        }

        if is_final {
            debug!(frames = stats.frames, "Final frame received");
        }
    }

    stats
}

// =============================================================================
// Writer
// =============================================================================

async fn write_fragments<K>(
    sink: &mut K,
    mut tokens: mpsc::Receiver<String>,
    state: &Mutex<SessionState>,
    input: &CancellationToken,
) -> WriterExit
where
    K: Sink<Message, Error = WsError> + Unpin,
{
    let mut chunker = TextChunker::new();
    let mut sent = 0usize;

    loop {
        let token = tokio::select! {
            biased;
            _ = input.cancelled() => return WriterExit::Cancelled,
            token = tokens.recv() => token,
        };

        let (fragment, last) = match token {
            Some(token) => match chunker.push(&token) {
                Some(fragment) => (fragment, false),
                None => continue,
            },
            None => match chunker.finish() {
                Some(fragment) => (fragment, true),
                None => {
                    debug!(fragments = sent, "Input exhausted");
                    return WriterExit::Exhausted;
                }
            },
        };

        let result = tokio::select! {
            biased;
            _ = input.cancelled() => return WriterExit::Cancelled,
            result = send_json(sink, TextFragment::trigger(fragment).to_json()) => result,
        };
        if let Err(e) = result {
            warn!("Failed to send text fragment: {e}");
            state.lock().record(e, true);
            return WriterExit::Failed;
        }
        sent += 1;

        if last {
            debug!(fragments = sent, "Input exhausted");
            return WriterExit::Exhausted;
        }
    }
}

async fn send_json<K>(sink: &mut K, json: ClientResult<String>) -> ClientResult<()>
where
    K: Sink<Message, Error = WsError> + Unpin,
{
    sink.send(Message::Text(json?.into()))
        .await
        .map_err(|e| ClientError::Transport(format!("write failed: {e}")))
}

async fn close_socket<K>(sink: &mut K)
where
    K: Sink<Message, Error = WsError> + Unpin,
{
    match timeout(CLOSE_TIMEOUT, sink.close()).await {
        Ok(Ok(())) => debug!("Socket closed"),
        Ok(Err(e)) => debug!("Socket close: {e}"),
        Err(_) => warn!("Socket close timed out"),
    }
}
