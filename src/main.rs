use std::path::PathBuf;

use anyhow::{Context, anyhow};
use clap::Parser;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use elevenlabs_stream::{
    Client, ClientConfig, OutputFormat, StreamRequest, VoiceSettings,
    tokenizer::{DEFAULT_TOKEN_CAPACITY, spawn_word_reader},
};

/// Streams text to the synthesizer and writes the returned audio
#[derive(Parser, Debug)]
#[command(name = "elevenlabs-stream")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Voice to synthesize with
    #[arg(long)]
    voice: String,

    /// Model identifier
    #[arg(long, default_value = "eleven_turbo_v2")]
    model: String,

    /// Output audio format, e.g. mp3_44100_128, pcm_16000, ulaw_8000
    #[arg(short = 'f', long = "format")]
    format: Option<OutputFormat>,

    /// optimize_streaming_latency level (0-4)
    #[arg(long)]
    latency: Option<u8>,

    #[arg(long)]
    stability: Option<f32>,

    #[arg(long = "similarity-boost")]
    similarity_boost: Option<f32>,

    #[arg(long)]
    style: Option<f32>,

    /// Read text from this file instead of stdin
    #[arg(long = "text-file", value_name = "FILE")]
    text_file: Option<PathBuf>,

    /// Write audio to this file instead of stdout
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    output: Option<PathBuf>,
}

impl Cli {
    fn stream_request(&self) -> StreamRequest {
        let mut request = StreamRequest::new(&self.voice, &self.model);

        let settings = VoiceSettings {
            stability: self.stability,
            similarity_boost: self.similarity_boost,
            style: self.style,
            use_speaker_boost: None,
        };
        if !settings.is_empty() {
            request = request.with_voice_settings(settings);
        }
        if let Some(format) = self.format {
            request = request.with_output_format(format);
        }
        if let Some(level) = self.latency {
            request = request.with_latency_optimizations(level);
        }
        request
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if it exists (must be done before config loading)
    let _ = dotenvy::dotenv();

    // Logs go to stderr so audio can be piped through stdout
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    // Initialize crypto provider for TLS connections
    // This must be done before any TLS connections are attempted
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install default crypto provider"))?;

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            ClientConfig::from_file(path)?
        }
        None => ClientConfig::from_env()?,
    };
    if !config.has_api_key() {
        warn!("No API key configured, requests are sent unauthenticated");
    }

    let client = Client::new(config)?;
    let request = cli.stream_request();

    let tokens = match &cli.text_file {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("Failed to open {}", path.display()))?;
            spawn_word_reader(file, DEFAULT_TOKEN_CAPACITY)
        }
        None => spawn_word_reader(tokio::io::stdin(), DEFAULT_TOKEN_CAPACITY),
    };

    let mut audio: Box<dyn AsyncWrite + Unpin + Send> = match &cli.output {
        Some(path) => Box::new(
            tokio::fs::File::create(path)
                .await
                .with_context(|| format!("Failed to create {}", path.display()))?,
        ),
        None => Box::new(tokio::io::stdout()),
    };

    let (event_tx, mut event_rx) = client.metadata_channel();
    let events = tokio::spawn(async move {
        let mut count = 0usize;
        while let Some(event) = event_rx.recv().await {
            count += 1;
            if let Some(alignment) = &event.alignment {
                debug!(
                    chars = alignment.len(),
                    end_ms = alignment.end_ms(),
                    text = %alignment.chars.concat(),
                    "Alignment received"
                );
            }
            if event.is_final {
                debug!("Final event received");
            }
        }
        count
    });

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, cancelling stream");
            ctrl_c.cancel();
        }
    });

    let result = client
        .text_to_speech_input_stream(cancel, tokens, &event_tx, &mut audio, request)
        .await;
    drop(event_tx);

    audio.shutdown().await.context("Failed to close audio output")?;
    let events = events.await.context("Metadata task failed")?;
    result.context("Streaming session failed")?;

    info!(events, "Done");
    Ok(())
}
