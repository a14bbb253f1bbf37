//! Mock Speech-to-Text Service
//!
//! In-process stand-ins for the recognition service:
//! - WebSocket `/v1/recognize` endpoint with scripted behaviors
//! - A recording callback that captures every session notification

// Not every test binary uses every helper
#![allow(dead_code)]

pub mod websocket_mock;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::sync::Semaphore;
use watson_stt::{RecognizeCallback, SpeechRecognitionResults, SpeechToTextError};

/// One callback invocation, in the order it was made.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Connected,
    Listening,
    Transcription(String),
    Complete,
    Error(SpeechToTextError),
    Inactivity(SpeechToTextError),
    Disconnected,
}

/// Callback recording every notification it receives.
#[derive(Default)]
pub struct RecordingCallback {
    events: Mutex<Vec<Event>>,
}

impl RecordingCallback {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    pub fn transcripts(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Transcription(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, event: &Event) -> usize {
        self.events().iter().filter(|e| *e == event).count()
    }

    fn push(&self, event: Event) {
        self.events.lock().push(event);
    }
}

#[async_trait]
impl RecognizeCallback for RecordingCallback {
    async fn on_connected(&self) {
        self.push(Event::Connected);
    }

    async fn on_listening(&self) {
        self.push(Event::Listening);
    }

    async fn on_transcription(&self, results: SpeechRecognitionResults) {
        let transcript = results.best_transcript().unwrap_or_default().to_string();
        self.push(Event::Transcription(transcript));
    }

    async fn on_transcription_complete(&self) {
        self.push(Event::Complete);
    }

    async fn on_error(&self, error: SpeechToTextError) {
        self.push(Event::Error(error));
    }

    async fn on_inactivity_timeout(&self, error: SpeechToTextError) {
        self.push(Event::Inactivity(error));
    }

    async fn on_disconnected(&self) {
        self.push(Event::Disconnected);
    }
}

/// Records like [`RecordingCallback`] but holds `on_listening` until
/// [`GatedCallback::release`] is called, so later events queue up behind it.
pub struct GatedCallback {
    pub recorder: Arc<RecordingCallback>,
    gate: Semaphore,
}

impl GatedCallback {
    pub fn new() -> Self {
        Self {
            recorder: Arc::new(RecordingCallback::default()),
            gate: Semaphore::new(0),
        }
    }

    pub fn release(&self) {
        self.gate.add_permits(1);
    }
}

#[async_trait]
impl RecognizeCallback for GatedCallback {
    async fn on_connected(&self) {
        self.recorder.on_connected().await;
    }

    async fn on_listening(&self) {
        if let Ok(permit) = self.gate.acquire().await {
            permit.forget();
        }
        self.recorder.on_listening().await;
    }

    async fn on_transcription(&self, results: SpeechRecognitionResults) {
        self.recorder.on_transcription(results).await;
    }

    async fn on_transcription_complete(&self) {
        self.recorder.on_transcription_complete().await;
    }

    async fn on_error(&self, error: SpeechToTextError) {
        self.recorder.on_error(error).await;
    }

    async fn on_inactivity_timeout(&self, error: SpeechToTextError) {
        self.recorder.on_inactivity_timeout(error).await;
    }

    async fn on_disconnected(&self) {
        self.recorder.on_disconnected().await;
    }
}

/// A `results` frame with a single final alternative.
pub fn final_result(index: u32, transcript: &str) -> Value {
    json!({
        "result_index": index,
        "results": [{
            "final": true,
            "alternatives": [{ "transcript": transcript, "confidence": 0.91 }]
        }]
    })
}

/// A `results` frame with a single interim alternative.
pub fn interim_result(index: u32, transcript: &str) -> Value {
    json!({
        "result_index": index,
        "results": [{
            "final": false,
            "alternatives": [{ "transcript": transcript }]
        }]
    })
}
