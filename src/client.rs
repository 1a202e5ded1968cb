//! Public client.
//!
//! A [`Client`] is built from an explicit [`ClientConfig`]; there is no
//! process-wide default instance. It opens streaming sessions and implements
//! the unary [`RequestPerformer`] contract.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Method;
use tokio::io::AsyncWrite;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use url::Url;
use zeroize::Zeroizing;

use crate::config::ClientConfig;
use crate::core::http::{HttpTransport, RequestPerformer};
use crate::core::query::QueryModifier;
use crate::core::stream::{StreamRequest, StreamingOutputEvent, StreamingSession};
use crate::errors::{ClientError, ClientResult};

/// Client for the text-to-speech API.
///
/// # Example
/// ```rust,no_run
/// use elevenlabs_stream::{Client, StreamRequest, OutputFormat};
/// use tokio::sync::mpsc;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let client = Client::builder().api_key("your-api-key").build()?;
///
/// let (token_tx, token_rx) = mpsc::channel(64);
/// let (event_tx, mut event_rx) = client.metadata_channel();
/// tokio::spawn(async move { while event_rx.recv().await.is_some() {} });
///
/// tokio::spawn(async move {
///     for word in ["Hello ", "world."] {
///         let _ = token_tx.send(word.to_string()).await;
///     }
/// });
///
/// let mut audio = Vec::new();
/// let request = StreamRequest::new("voice-id", "eleven_turbo_v2")
///     .with_output_format(OutputFormat::Pcm16000);
/// client
///     .text_to_speech_input_stream(CancellationToken::new(), token_rx, &event_tx, &mut audio, request)
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Client {
    config: ClientConfig,
    ws_url: Url,
    transport: HttpTransport,
}

impl Client {
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        config.validate()?;

        // wss:// needs a process-level crypto provider; keep one already installed
        let _ = rustls::crypto::ring::default_provider().install_default();

        let base_url = parse_url(&config.base_url, "base_url")?;
        let ws_url = parse_url(&config.base_ws_url, "base_ws_url")?;
        let transport = HttpTransport::new(base_url, config.api_key.clone(), config.request_timeout)?;

        Ok(Self {
            config,
            ws_url,
            transport,
        })
    }

    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Metadata channel sized by the configured capacity.
    pub fn metadata_channel(
        &self,
    ) -> (
        mpsc::Sender<StreamingOutputEvent>,
        mpsc::Receiver<StreamingOutputEvent>,
    ) {
        mpsc::channel(self.config.metadata_capacity)
    }

    /// Prepares a streaming session without connecting.
    pub fn stream_session(&self, request: StreamRequest) -> ClientResult<StreamingSession> {
        StreamingSession::new(
            &self.ws_url,
            self.config.api_key.as_deref().map(String::as_str),
            request,
            self.config.session_timeouts(),
        )
    }

    /// Streams text tokens to the synthesizer and relays audio and alignment
    /// metadata back until input is exhausted, the socket fails, or `parent`
    /// is cancelled.
    ///
    /// See [`StreamingSession::run`] for the termination rules.
    pub async fn text_to_speech_input_stream<W>(
        &self,
        parent: CancellationToken,
        tokens: mpsc::Receiver<String>,
        metadata: &mpsc::Sender<StreamingOutputEvent>,
        audio: &mut W,
        request: StreamRequest,
    ) -> ClientResult<()>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        self.stream_session(request)?
            .run(parent, tokens, metadata, audio)
            .await
    }
}

#[async_trait]
impl RequestPerformer for Client {
    async fn perform(
        &self,
        method: Method,
        path: &str,
        body: Option<Bytes>,
        content_type: &str,
        query: &[QueryModifier],
    ) -> ClientResult<Bytes> {
        self.transport
            .perform(method, path, body, content_type, query)
            .await
    }
}

fn parse_url(value: &str, key: &str) -> ClientResult<Url> {
    Url::parse(value).map_err(|e| ClientError::InvalidConfiguration(format!("{key}: {e}")))
}

// =============================================================================
// Builder
// =============================================================================

/// Builder for [`Client`], starting from [`ClientConfig::default`].
#[derive(Debug, Default)]
pub struct ClientBuilder {
    config: ClientConfig,
}

impl ClientBuilder {
    pub fn from_config(config: ClientConfig) -> Self {
        Self { config }
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(Zeroizing::new(key.into()));
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    pub fn base_ws_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_ws_url = url.into();
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    pub fn drain_timeout(mut self, timeout: Duration) -> Self {
        self.config.drain_timeout = timeout;
        self
    }

    pub fn metadata_capacity(mut self, capacity: usize) -> Self {
        self.config.metadata_capacity = capacity;
        self
    }

    pub fn build(self) -> ClientResult<Client> {
        Client::new(self.config)
    }
}
