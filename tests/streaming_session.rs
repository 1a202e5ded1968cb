//! End-to-end streaming session tests against the mock stream-input server.

mod mock_providers;

use std::io;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use elevenlabs_stream::{
    Client, ClientError, ClientResult, OutputFormat, StreamRequest, StreamingOutputEvent,
    VoiceSettings, words,
};
use mock_providers::{Behavior, MockStreamServer};

/// Upper bound for any single session in these tests
const SESSION_DEADLINE: Duration = Duration::from_secs(10);

fn client_for(server: &MockStreamServer) -> Client {
    Client::builder()
        .api_key("test-key")
        .base_ws_url(server.ws_url())
        .connect_timeout(Duration::from_secs(2))
        .drain_timeout(Duration::from_secs(2))
        .build()
        .unwrap()
}

fn request() -> StreamRequest {
    StreamRequest::new("voice-1", "model-1")
}

struct SessionOutcome {
    result: ClientResult<()>,
    audio: Vec<u8>,
    events: Vec<StreamingOutputEvent>,
}

/// Runs one session feeding `tokens`. With `close_input` false the token
/// channel stays open for the whole session.
async fn run_session(
    client: &Client,
    request: StreamRequest,
    tokens: &[&str],
    close_input: bool,
    parent: CancellationToken,
) -> SessionOutcome {
    let (token_tx, token_rx) = mpsc::channel(16);
    for token in tokens {
        token_tx.send(token.to_string()).await.unwrap();
    }
    let held_sender = if close_input {
        drop(token_tx);
        None
    } else {
        Some(token_tx)
    };

    let (event_tx, mut event_rx) = client.metadata_channel();
    let collector = tokio::spawn(async move {
        let mut events = Vec::new();
        while let Some(event) = event_rx.recv().await {
            events.push(event);
        }
        events
    });

    let mut audio = Vec::new();
    let result = tokio::time::timeout(
        SESSION_DEADLINE,
        client.text_to_speech_input_stream(parent, token_rx, &event_tx, &mut audio, request),
    )
    .await
    .expect("session did not finish in time");

    drop(event_tx);
    drop(held_sender);
    let events = collector.await.unwrap();

    SessionOutcome {
        result,
        audio,
        events,
    }
}

// =============================================================================
// Clean Completion
// =============================================================================

#[tokio::test]
async fn test_clean_session_delivers_all_audio_and_events() {
    let server = MockStreamServer::start(Behavior::Synthesize).await;
    let client = client_for(&server);
    let tokens = words("Hello world, this is a test.");
    let tokens: Vec<&str> = tokens.iter().map(String::as_str).collect();

    let outcome = run_session(&client, request(), &tokens, true, CancellationToken::new()).await;

    assert!(outcome.result.is_ok(), "unexpected error: {:?}", outcome.result);
    assert_eq!(outcome.audio, b"Hello world, this is a test.".to_vec());

    // One event per inbound frame: six fragments plus the final frame
    assert_eq!(outcome.events.len(), 7);
    let expected = ["Hello ", "world, ", "this ", "is ", "a ", "test."];
    for (event, fragment) in outcome.events.iter().zip(expected) {
        let alignment = event.alignment.as_ref().unwrap();
        assert!(alignment.is_consistent());
        assert_eq!(alignment.chars.concat(), fragment);
        let count = fragment.chars().count() as i64;
        assert_eq!(
            alignment.char_start_times_ms,
            (0..count).map(|i| i * 20).collect::<Vec<_>>()
        );
        assert_eq!(alignment.char_durations_ms, vec![20i64; count as usize]);
        assert_eq!(event.normalized_alignment.as_ref(), Some(alignment));
        assert!(!event.is_final);
    }
    let last = outcome.events.last().unwrap();
    assert!(last.is_final);
    assert!(last.alignment.is_none());
}

#[tokio::test]
async fn test_frames_sent_in_order_with_end_marker() {
    let server = MockStreamServer::start(Behavior::Synthesize).await;
    let client = client_for(&server);
    let request = request().with_voice_settings(
        VoiceSettings::new()
            .with_stability(0.5)
            .with_similarity_boost(0.75),
    );

    let outcome = run_session(
        &client,
        request,
        &["Hello", ",world "],
        true,
        CancellationToken::new(),
    )
    .await;
    assert!(outcome.result.is_ok());

    let frames = server.frames();
    assert_eq!(frames.len(), 4);

    // Opening frame
    assert_eq!(frames[0]["text"], " ");
    assert_eq!(frames[0]["try_trigger_generation"], false);
    assert_eq!(frames[0]["voice_settings"]["stability"], 0.5);
    assert_eq!(frames[0]["voice_settings"]["similarity_boost"], 0.75);
    assert!(frames[0]["voice_settings"].get("style").is_none());

    // Chunked fragments, each asking for generation
    assert_eq!(frames[1]["text"], "Hello, ");
    assert_eq!(frames[1]["try_trigger_generation"], true);
    assert_eq!(frames[2]["text"], "world ");
    assert_eq!(frames[2]["try_trigger_generation"], true);

    // End of input
    assert_eq!(frames[3], serde_json::json!({"text": ""}));
}

#[tokio::test]
async fn test_connection_url_and_headers() {
    let server = MockStreamServer::start(Behavior::Synthesize).await;
    let client = client_for(&server);
    let request = request()
        .with_output_format(OutputFormat::Pcm16000)
        .with_latency_optimizations(3);

    let outcome = run_session(&client, request, &["Hi."], true, CancellationToken::new()).await;
    assert!(outcome.result.is_ok());

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].path, "/v1/text-to-speech/voice-1/stream-input");
    assert_eq!(
        requests[0].query.as_deref(),
        Some("model_id=model-1&output_format=pcm_16000&optimize_streaming_latency=3")
    );
    assert_eq!(requests[0].api_key.as_deref(), Some("test-key"));
    assert_eq!(requests[0].accept.as_deref(), Some("*/*"));
}

#[tokio::test]
async fn test_empty_input_sends_only_config_and_end() {
    let server = MockStreamServer::start(Behavior::Synthesize).await;
    let client = client_for(&server);

    let outcome = run_session(&client, request(), &[], true, CancellationToken::new()).await;

    assert!(outcome.result.is_ok());
    assert!(outcome.audio.is_empty());
    assert_eq!(outcome.events.len(), 1);
    assert!(outcome.events[0].is_final);
    assert_eq!(server.frames().len(), 2);
}

#[tokio::test]
async fn test_drop_after_end_of_input_is_success() {
    let server = MockStreamServer::start(Behavior::DropAfterEnd).await;
    let client = client_for(&server);

    let outcome = run_session(
        &client,
        request(),
        &["one ", "two ", "three."],
        true,
        CancellationToken::new(),
    )
    .await;

    assert!(
        outcome.result.is_ok(),
        "read failure after end of input must not be reported: {:?}",
        outcome.result
    );
    assert_eq!(outcome.audio, b"one two three.".to_vec());
    assert_eq!(outcome.events.len(), 3);
}

#[tokio::test]
async fn test_drain_timeout_is_reported() {
    let server = MockStreamServer::start(Behavior::Silent).await;
    let client = Client::builder()
        .base_ws_url(server.ws_url())
        .drain_timeout(Duration::from_millis(300))
        .build()
        .unwrap();

    let started = tokio::time::Instant::now();
    let outcome = run_session(&client, request(), &["one ", "two."], true, CancellationToken::new()).await;

    assert!(
        matches!(outcome.result, Err(ClientError::Timeout(_))),
        "missing trailing audio must be reported: {:?}",
        outcome.result
    );
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(server.wait_for_close(Duration::from_secs(2)).await, 1);

    let frames = server.frames();
    assert_eq!(frames.last().unwrap()["text"], "");
}

// =============================================================================
// Faults
// =============================================================================

#[tokio::test]
async fn test_drop_mid_stream_is_transport_error() {
    let server = MockStreamServer::start(Behavior::DropAfterFragments(2)).await;
    let client = client_for(&server);

    // Input never closes: the writer must be stopped by the reader's fault
    let outcome = run_session(
        &client,
        request(),
        &["one ", "two ", "three "],
        false,
        CancellationToken::new(),
    )
    .await;

    match &outcome.result {
        Err(err) => assert!(err.is_transport(), "expected transport error, got {err:?}"),
        Ok(()) => panic!("expected transport error"),
    }
    assert_eq!(outcome.audio, b"one two ".to_vec());
    assert_eq!(outcome.events.len(), 2);
}

#[tokio::test]
async fn test_bad_base64_is_decode_error_without_event() {
    let server = MockStreamServer::start(Behavior::BadAudio).await;
    let client = client_for(&server);

    let outcome = run_session(
        &client,
        request(),
        &["Hello ", "there "],
        false,
        CancellationToken::new(),
    )
    .await;

    assert!(matches!(outcome.result, Err(ClientError::Decode(_))));
    assert!(outcome.events.is_empty());
    assert!(outcome.audio.is_empty());
    assert_eq!(server.wait_for_close(Duration::from_secs(2)).await, 1);
}

#[tokio::test]
async fn test_audio_sink_failure_is_reported() {
    let server = MockStreamServer::start(Behavior::Synthesize).await;
    let client = client_for(&server);

    let (token_tx, token_rx) = mpsc::channel(4);
    token_tx.send("Hello.".to_string()).await.unwrap();
    drop(token_tx);
    let (event_tx, _event_rx) = client.metadata_channel();

    let mut sink = tokio_test::io::Builder::new()
        .write_error(io::Error::other("disk full"))
        .build();

    let result = tokio::time::timeout(
        SESSION_DEADLINE,
        client.text_to_speech_input_stream(
            CancellationToken::new(),
            token_rx,
            &event_tx,
            &mut sink,
            request(),
        ),
    )
    .await
    .unwrap();

    match result {
        Err(ClientError::AudioSink(msg)) => assert!(msg.contains("disk full")),
        other => panic!("Expected AudioSink error, got: {other:?}"),
    }
}

// =============================================================================
// Cancellation
// =============================================================================

#[tokio::test]
async fn test_parent_cancel_stops_session_and_closes_socket_once() {
    let server = MockStreamServer::start(Behavior::Silent).await;
    let client = client_for(&server);

    let parent = CancellationToken::new();
    let canceller = parent.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        canceller.cancel();
    });

    let started = tokio::time::Instant::now();
    let outcome = run_session(&client, request(), &["a ", "b "], false, parent).await;

    assert!(outcome.result.is_ok(), "cancel returned {:?}", outcome.result);
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(outcome.events.is_empty());
    assert_eq!(server.wait_for_close(Duration::from_secs(2)).await, 1);

    // Config frame and the one completed fragment; no end-of-input frame
    let frames = server.frames();
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[1]["text"], "a ");
}

#[tokio::test]
async fn test_cancel_before_connect() {
    let server = MockStreamServer::start(Behavior::Synthesize).await;
    let client = client_for(&server);
    let parent = CancellationToken::new();
    parent.cancel();

    let outcome = run_session(&client, request(), &["a"], true, parent).await;

    assert!(matches!(outcome.result, Err(ClientError::ConnectionFailed(_))));
    assert!(server.frames().is_empty());
}

// =============================================================================
// Handshake Failures
// =============================================================================

#[tokio::test]
async fn test_rejected_upgrade_is_connection_error() {
    let server = MockStreamServer::start(Behavior::Reject).await;
    let client = client_for(&server);

    let outcome = run_session(&client, request(), &["Hi"], true, CancellationToken::new()).await;

    assert!(matches!(outcome.result, Err(ClientError::ConnectionFailed(_))));
    assert!(outcome.events.is_empty());
}

#[tokio::test]
async fn test_refused_connection_is_connection_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = Client::builder()
        .base_ws_url(format!("ws://{addr}/v1"))
        .build()
        .unwrap();

    let outcome = run_session(&client, request(), &["Hi"], true, CancellationToken::new()).await;
    assert!(matches!(outcome.result, Err(ClientError::ConnectionFailed(_))));
}

#[tokio::test]
async fn test_stalled_handshake_times_out() {
    let server = MockStreamServer::start(Behavior::Stall).await;
    let client = Client::builder()
        .base_ws_url(server.ws_url())
        .connect_timeout(Duration::from_millis(200))
        .build()
        .unwrap();

    let outcome = run_session(&client, request(), &["Hi"], true, CancellationToken::new()).await;
    assert!(matches!(outcome.result, Err(ClientError::Timeout(_))));
}

#[tokio::test]
async fn test_invalid_request_fails_before_dialing() {
    let server = MockStreamServer::start(Behavior::Synthesize).await;
    let client = client_for(&server);

    let outcome = run_session(
        &client,
        request().with_latency_optimizations(7),
        &["Hi"],
        true,
        CancellationToken::new(),
    )
    .await;

    assert!(matches!(
        outcome.result,
        Err(ClientError::InvalidConfiguration(_))
    ));
    assert!(server.requests().is_empty());
}
