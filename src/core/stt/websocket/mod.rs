//! Streaming recognition over WebSocket.
//!
//! A session sends a `start` frame with the recognition options, streams
//! binary audio frames read from an [`AudioSource`], sends a `stop` frame
//! when the source ends and reports everything the service sends back to a
//! [`RecognizeCallback`].
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use watson_stt::{
//!     ClientConfig, RecognizeCallback, RecognizeOptions, SpeechRecognitionResults,
//!     SpeechToText, audio_channel,
//! };
//!
//! struct Printer;
//!
//! #[async_trait]
//! impl RecognizeCallback for Printer {
//!     async fn on_transcription(&self, results: SpeechRecognitionResults) {
//!         if let Some(text) = results.best_transcript() {
//!             println!("{} {}", if results.is_final() { "final:" } else { "interim:" }, text);
//!         }
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = SpeechToText::new(ClientConfig::from_env()?)?;
//!     let (writer, source) = audio_channel(64);
//!
//!     let options = RecognizeOptions {
//!         interim_results: Some(true),
//!         ..RecognizeOptions::new("audio/l16; rate=16000")
//!     };
//!     let session = service.recognize_using_websocket(source, options, Arc::new(Printer))?;
//!
//!     // PCM 16-bit mono, 16 kHz
//!     writer.write(vec![0u8; 3200]).await?;
//!     writer.close();
//!
//!     session.wait().await;
//!     Ok(())
//! }
//! ```

pub mod audio;
pub mod callback;
pub mod messages;
mod session;

#[cfg(test)]
mod tests;

pub use audio::{
    AudioChunk, AudioSource, AudioWriter, BytesAudioSource, ChannelAudioSource,
    ReaderAudioSource, audio_channel,
};
pub use callback::{NoopCallback, RecognizeCallback};
pub use messages::{ErrorNotification, InboundMessage, OutboundFrame, StartMessage, StopMessage};
pub use session::{
    DEFAULT_CHUNK_SIZE, DEFAULT_IDLE_TIMEOUT, RecognitionSession, SessionHandle, SessionState,
};
