use async_trait::async_trait;
use tracing::{debug, warn};

use crate::core::stt::models::SpeechRecognitionResults;
use crate::errors::SpeechToTextError;

/// Receives the lifecycle and result notifications of a streaming session.
///
/// Methods are invoked one at a time, in event order, from a single task
/// owned by the session. A slow callback delays later notifications but
/// never stalls the connection. Every method defaults to a no-op.
///
/// For a session that reached the service the sequence is:
///
/// ```text
/// on_connected → on_listening → on_transcription* → on_transcription_complete → on_disconnected
/// ```
///
/// with `on_error` or `on_inactivity_timeout` replacing the tail on failure.
/// `on_disconnected` is always the last call and happens exactly once.
#[async_trait]
pub trait RecognizeCallback: Send + Sync {
    /// The WebSocket handshake succeeded.
    async fn on_connected(&self) {
        debug!("Recognition session connected");
    }

    /// The service is ready to receive audio.
    async fn on_listening(&self) {
        debug!("Recognition session listening");
    }

    /// A batch of interim or final results arrived.
    async fn on_transcription(&self, _results: SpeechRecognitionResults) {}

    /// The service finished processing all audio sent before the stop frame.
    async fn on_transcription_complete(&self) {
        debug!("Transcription complete");
    }

    /// The session failed. Protocol errors are reported here too, but do
    /// not end the session.
    async fn on_error(&self, error: SpeechToTextError) {
        warn!("Recognition session error: {}", error);
    }

    /// The service closed the session because it received no audio.
    async fn on_inactivity_timeout(&self, error: SpeechToTextError) {
        warn!("Recognition session inactivity timeout: {}", error);
    }

    /// The session is over; no further calls will be made.
    async fn on_disconnected(&self) {
        debug!("Recognition session disconnected");
    }
}

/// Callback that ignores every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCallback;

#[async_trait]
impl RecognizeCallback for NoopCallback {}
