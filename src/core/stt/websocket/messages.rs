//! Frames exchanged on the recognition WebSocket.
//!
//! Client to server: a JSON `start` frame carrying the recognition options,
//! binary audio frames, and a JSON `stop` frame. Server to client: state
//! notifications, recognition results, speaker labels and errors.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_tungstenite::tungstenite::protocol::Message;
use url::Url;

use crate::core::stt::models::SpeechRecognitionResults;
use crate::core::stt::options::RecognizeOptions;
use crate::errors::{SpeechToTextError, SttResult};
use crate::utils::url::{join_segments, websocket_url};

// =============================================================================
// Outbound Frames
// =============================================================================

/// Start recognition frame.
///
/// Field order is the wire order: `content-type`, `action`, then whichever
/// options are set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StartMessage {
    #[serde(rename = "content-type")]
    pub content_type: String,
    pub action: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interim_results: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamps: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub word_confidence: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_alternatives: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profanity_filter: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub smart_formatting: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speaker_labels: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inactivity_timeout: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customization_weight: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keywords: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keywords_threshold: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub word_alternatives_threshold: Option<f64>,
}

impl StartMessage {
    /// Build the start frame for `options`. `model` and `customization_id`
    /// travel in the URL instead.
    pub fn from_options(options: &RecognizeOptions) -> Self {
        Self {
            content_type: options.content_type.clone(),
            action: "start",
            interim_results: options.interim_results,
            timestamps: options.word_timestamps,
            word_confidence: options.word_confidence,
            max_alternatives: options.max_alternatives,
            profanity_filter: options.profanity_filter,
            smart_formatting: options.smart_formatting,
            speaker_labels: options.speaker_labels,
            inactivity_timeout: options.inactivity_timeout,
            customization_weight: options.customization_weight,
            keywords: options.keywords.clone().filter(|k| !k.is_empty()),
            keywords_threshold: options.keywords_threshold,
            word_alternatives_threshold: options.word_alternatives_threshold,
        }
    }
}

/// Stop recognition frame: `{"action":"stop"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopMessage {
    pub action: String,
}

impl StopMessage {
    pub fn new() -> Self {
        Self {
            action: "stop".to_string(),
        }
    }
}

impl Default for StopMessage {
    fn default() -> Self {
        Self::new()
    }
}

/// A frame the session sends to the service.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundFrame {
    Start(StartMessage),
    Stop,
    Audio(Bytes),
}

impl OutboundFrame {
    /// Encode as a WebSocket message.
    pub fn into_message(self) -> SttResult<Message> {
        let message = match self {
            Self::Start(start) => Message::Text(serde_json::to_string(&start)?.into()),
            Self::Stop => Message::Text(serde_json::to_string(&StopMessage::new())?.into()),
            Self::Audio(data) => Message::Binary(data),
        };
        Ok(message)
    }
}

// =============================================================================
// Inbound Frames
// =============================================================================

/// Error frame sent by the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorNotification {
    pub error: String,
    #[serde(default)]
    pub code: Option<u16>,
    #[serde(default)]
    pub code_description: Option<String>,
    #[serde(default)]
    pub warnings: Option<Vec<String>>,
}

impl ErrorNotification {
    /// Whether the service closed the session because it received no audio.
    pub fn is_inactivity_timeout(&self) -> bool {
        let error = self.error.to_ascii_lowercase();
        error.contains("inactivity")
            || error.contains("session timed out")
            || error.contains("no speech detected")
            || self.code == Some(408)
    }
}

impl From<ErrorNotification> for SpeechToTextError {
    fn from(notification: ErrorNotification) -> Self {
        if notification.is_inactivity_timeout() {
            Self::InactivityTimeout(notification.error)
        } else {
            Self::remote(notification.error, notification.code)
        }
    }
}

/// A decoded server frame.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    /// `{"state": ...}`. The service sends `listening` (or an empty object)
    /// when it is ready for audio and again once a stop has been processed.
    StateUpdate(String),
    /// Interim or final recognition results.
    Results(SpeechRecognitionResults),
    /// A diarization-only frame.
    SpeakerLabels(SpeechRecognitionResults),
    /// A service error other than an inactivity timeout.
    Error(ErrorNotification),
    /// The service is closing the session for lack of audio.
    InactivityTimeout(String),
}

impl InboundMessage {
    /// Decode a text frame. Unknown fields are ignored.
    ///
    /// # Errors
    /// Returns [`SpeechToTextError::ProtocolError`] for frames that are not
    /// JSON objects or match no known frame shape.
    pub fn parse(text: &str) -> SttResult<Self> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| SpeechToTextError::ProtocolError(format!("invalid JSON frame: {e}")))?;
        let Value::Object(fields) = &value else {
            return Err(SpeechToTextError::ProtocolError(format!(
                "expected a JSON object, got: {text}"
            )));
        };

        if fields.contains_key("error") {
            let notification: ErrorNotification = decode(value)?;
            if notification.is_inactivity_timeout() {
                return Ok(Self::InactivityTimeout(notification.error));
            }
            return Ok(Self::Error(notification));
        }
        if fields.contains_key("results") {
            return Ok(Self::Results(decode(value)?));
        }
        if fields.contains_key("speaker_labels") {
            return Ok(Self::SpeakerLabels(decode(value)?));
        }
        if let Some(state) = fields.get("state") {
            let state = match state {
                Value::String(s) => s.clone(),
                Value::Object(o) if o.is_empty() => String::new(),
                other => other.to_string(),
            };
            return Ok(Self::StateUpdate(state));
        }

        Err(SpeechToTextError::ProtocolError(format!(
            "unrecognized frame: {text}"
        )))
    }
}

fn decode<T: serde::de::DeserializeOwned>(value: Value) -> SttResult<T> {
    serde_json::from_value(value)
        .map_err(|e| SpeechToTextError::ProtocolError(format!("malformed frame: {e}")))
}

// =============================================================================
// Endpoint
// =============================================================================

/// WebSocket URL of the recognize endpoint for `service_url`, with the
/// URL-level options appended.
pub fn build_websocket_url(service_url: &Url, options: &RecognizeOptions) -> SttResult<Url> {
    let mut url = join_segments(&websocket_url(service_url)?, &["v1", "recognize"])?;
    let pairs = options.websocket_query_pairs();
    if !pairs.is_empty() {
        url.query_pairs_mut().extend_pairs(pairs);
    }
    Ok(url)
}

// =============================================================================
// Tests
// =============================================================================
