//! Streaming session unit tests.
//!
//! End-to-end protocol scenarios against a mock server live in
//! `tests/websocket_session_tests.rs`.

use super::session::{PumpItem, build_request, pump_audio, transition};
use super::*;
use crate::config::Credentials;
use crate::core::stt::models::SpeechRecognitionResults;
use crate::core::stt::options::RecognizeOptions;
use crate::errors::SpeechToTextError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use url::Url;

#[derive(Default)]
struct EventLog {
    events: Mutex<Vec<String>>,
}

impl EventLog {
    fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }

    fn push(&self, event: impl Into<String>) {
        self.events.lock().push(event.into());
    }
}

#[async_trait]
impl RecognizeCallback for EventLog {
    async fn on_connected(&self) {
        self.push("connected");
    }
    async fn on_listening(&self) {
        self.push("listening");
    }
    async fn on_transcription(&self, _results: SpeechRecognitionResults) {
        self.push("transcription");
    }
    async fn on_transcription_complete(&self) {
        self.push("complete");
    }
    async fn on_error(&self, error: SpeechToTextError) {
        self.push(format!("error: {error}"));
    }
    async fn on_inactivity_timeout(&self, _error: SpeechToTextError) {
        self.push("inactivity");
    }
    async fn on_disconnected(&self) {
        self.push("disconnected");
    }
}

fn local_url(port: u16) -> Url {
    Url::parse(&format!("http://127.0.0.1:{port}")).unwrap()
}

fn session(url: Url) -> RecognitionSession {
    RecognitionSession::new(url)
        .audio(BytesAudioSource::new(&b"test"[..]))
        .options(RecognizeOptions::new("audio/l16; rate=44000"))
        .callback(Arc::new(NoopCallback))
}

// =============================================================================
// State Tests
// =============================================================================

#[test]
fn test_terminal_states() {
    assert!(SessionState::Closed.is_terminal());
    assert!(SessionState::Errored.is_terminal());
    assert!(!SessionState::Stopping.is_terminal());
    assert!(!SessionState::Idle.is_terminal());
}

#[test]
fn test_transition_never_leaves_terminal_state() {
    let (tx, rx) = watch::channel(SessionState::Idle);
    transition(&tx, SessionState::Connecting);
    transition(&tx, SessionState::Listening);
    assert_eq!(*rx.borrow(), SessionState::Listening);

    transition(&tx, SessionState::Errored);
    transition(&tx, SessionState::Closed);
    transition(&tx, SessionState::Streaming);
    assert_eq!(*rx.borrow(), SessionState::Errored);
}

// =============================================================================
// Start Validation Tests
// =============================================================================

#[tokio::test]
async fn test_start_without_audio_source() {
    let result = RecognitionSession::new(local_url(1))
        .options(RecognizeOptions::new("audio/wav"))
        .callback(Arc::new(NoopCallback))
        .start();

    match result {
        Err(SpeechToTextError::InvalidArgument(msg)) => assert!(msg.contains("audio")),
        other => panic!("expected InvalidArgument, got {other:?}"),
    }
}

#[tokio::test]
async fn test_start_without_options_or_callback() {
    let result = RecognitionSession::new(local_url(1))
        .audio(BytesAudioSource::default())
        .callback(Arc::new(NoopCallback))
        .start();
    assert!(matches!(result, Err(SpeechToTextError::InvalidArgument(_))));

    let result = RecognitionSession::new(local_url(1))
        .audio(BytesAudioSource::default())
        .options(RecognizeOptions::new("audio/wav"))
        .start();
    assert!(matches!(result, Err(SpeechToTextError::InvalidArgument(_))));
}

#[tokio::test]
async fn test_start_with_invalid_options() {
    let result = RecognitionSession::new(local_url(1))
        .audio(BytesAudioSource::default())
        .options(RecognizeOptions::new(""))
        .callback(Arc::new(NoopCallback))
        .start();
    assert!(matches!(
        result,
        Err(SpeechToTextError::InvalidConfiguration(_))
    ));

    let result = session(local_url(1)).chunk_size(0).start();
    assert!(matches!(
        result,
        Err(SpeechToTextError::InvalidConfiguration(_))
    ));
}

#[test]
fn test_start_outside_runtime() {
    let result = session(local_url(1)).start();
    match result {
        Err(SpeechToTextError::InvalidConfiguration(msg)) => assert!(msg.contains("runtime")),
        other => panic!("expected InvalidConfiguration, got {other:?}"),
    }
}

#[test]
fn test_build_request_headers() {
    let url = Url::parse("wss://example.com/v1/recognize").unwrap();
    let auth = Credentials::ApiKey("key".into()).authorization_header();
    let headers = vec![("X-Watson-Learning-Opt-Out".to_string(), "true".to_string())];

    let request = build_request(&url, auth.as_deref(), &headers).unwrap();
    assert_eq!(
        request.headers().get("authorization").unwrap(),
        "Basic YXBpa2V5OmtleQ=="
    );
    assert!(request.headers().get("authorization").unwrap().is_sensitive());
    assert_eq!(
        request.headers().get("x-watson-learning-opt-out").unwrap(),
        "true"
    );

    let bad = vec![("bad header".to_string(), "x".to_string())];
    assert!(matches!(
        build_request(&url, None, &bad),
        Err(SpeechToTextError::InvalidConfiguration(_))
    ));
}

// =============================================================================
// Lifecycle Tests
// =============================================================================

#[tokio::test]
async fn test_connection_refused_reports_error_then_disconnect() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let log = Arc::new(EventLog::default());
    let handle = session(local_url(port)).callback(log.clone()).start().unwrap();

    tokio::time::timeout(Duration::from_secs(10), handle.wait())
        .await
        .expect("session should finish");

    let events = log.events();
    assert_eq!(events.len(), 2, "events: {events:?}");
    assert!(events[0].starts_with("error: Connection error"));
    assert_eq!(events[1], "disconnected");
    assert_eq!(handle.state(), SessionState::Errored);
    assert!(handle.is_finished());
}

#[tokio::test]
async fn test_cancel_during_handshake() {
    // Accepts TCP connections but never answers the WebSocket handshake.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let log = Arc::new(EventLog::default());
    let handle = session(local_url(port)).callback(log.clone()).start().unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    handle.cancel();
    handle.close();
    handle.cancel();

    tokio::time::timeout(Duration::from_secs(5), handle.wait())
        .await
        .expect("session should finish");

    assert_eq!(log.events(), vec!["disconnected"]);
    assert_eq!(handle.state(), SessionState::Closed);
    assert!(handle.is_cancelled());
    drop(listener);
}

#[tokio::test]
async fn test_handle_is_cloneable_and_wait_is_repeatable() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let handle = session(local_url(port)).start().unwrap();
    let other = handle.clone();
    other.cancel();

    tokio::time::timeout(Duration::from_secs(5), handle.wait())
        .await
        .unwrap();
    tokio::time::timeout(Duration::from_secs(1), other.wait())
        .await
        .unwrap();
    assert!(handle.state().is_terminal());
    drop(listener);
}

// =============================================================================
// Audio Pump Tests
// =============================================================================

/// Live source that has no data for the first `empty_reads` reads.
struct SlowSource {
    reads: Arc<AtomicUsize>,
    empty_reads: usize,
    data: Option<bytes::Bytes>,
}

#[async_trait]
impl AudioSource for SlowSource {
    async fn read(&mut self, _max_bytes: usize) -> crate::errors::SttResult<AudioChunk> {
        let n = self.reads.fetch_add(1, Ordering::SeqCst);
        if n < self.empty_reads {
            return Ok(AudioChunk::Data(bytes::Bytes::new()));
        }
        match self.data.take() {
            Some(data) => Ok(AudioChunk::Data(data)),
            None => Ok(AudioChunk::EndOfStream),
        }
    }
}

#[tokio::test]
async fn test_pump_backs_off_on_empty_reads() {
    let reads = Arc::new(AtomicUsize::new(0));
    let source = SlowSource {
        reads: reads.clone(),
        empty_reads: usize::MAX,
        data: None,
    };
    let (tx, mut rx) = mpsc::channel(4);
    let shutdown = CancellationToken::new();
    let pump = tokio::spawn(pump_audio(Box::new(source), 16, tx, shutdown.clone()));

    tokio::time::sleep(Duration::from_millis(200)).await;
    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(1), pump)
        .await
        .expect("pump should stop on shutdown")
        .unwrap();

    let polled = reads.load(Ordering::SeqCst);
    assert!(polled > 1 && polled < 100, "source polled {polled} times");
    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn test_pump_forwards_data_after_empty_reads() {
    let source = SlowSource {
        reads: Arc::new(AtomicUsize::new(0)),
        empty_reads: 3,
        data: Some(bytes::Bytes::from_static(b"0123456789")),
    };
    let (tx, mut rx) = mpsc::channel(8);
    tokio::spawn(pump_audio(Box::new(source), 4, tx, CancellationToken::new()));

    let mut chunks = Vec::new();
    loop {
        match tokio::time::timeout(Duration::from_secs(1), rx.recv()).await.unwrap() {
            Some(PumpItem::Chunk(data)) => chunks.push(data),
            Some(PumpItem::End) => break,
            other => panic!("unexpected pump item: {other:?}"),
        }
    }
    assert_eq!(chunks, vec!["0123", "4567", "89"]);
}
