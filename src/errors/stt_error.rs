//! Error type shared by the streaming session and the REST client.

use thiserror::Error;

/// Errors produced by the Speech-to-Text client.
///
/// Synchronous misuse (`InvalidArgument`, `InvalidConfiguration`) is returned
/// directly from the call that misused the API. Everything that happens after
/// a streaming session has been started is delivered through
/// [`RecognizeCallback::on_error`](crate::core::stt::websocket::RecognizeCallback::on_error)
/// instead.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SpeechToTextError {
    /// The connection could not be established or was lost.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// A malformed or unexpected frame was received.
    #[error("Protocol error: {0}")]
    ProtocolError(String),

    /// The service reported an error, either in a WebSocket error frame or as
    /// a non-2xx REST response.
    #[error("Service error{}: {message}", format_code(.code))]
    RemoteError {
        message: String,
        code: Option<u16>,
    },

    /// The service closed the session because no audio was received.
    #[error("Inactivity timeout: {0}")]
    InactivityTimeout(String),

    /// The recognition options are not usable.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A required argument was missing or empty.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The session was cancelled locally.
    #[error("Session cancelled")]
    Cancelled,

    /// Transport-level HTTP failure (no response received).
    #[error("HTTP error: {0}")]
    Http(String),

    /// A payload could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Local I/O failure, typically while reading an audio source.
    #[error("I/O error: {0}")]
    Io(String),
}

impl SpeechToTextError {
    /// Whether the streaming session has to be torn down after this error.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::ProtocolError(_))
    }

    pub(crate) fn remote(message: impl Into<String>, code: Option<u16>) -> Self {
        Self::RemoteError {
            message: message.into(),
            code,
        }
    }
}

impl From<reqwest::Error> for SpeechToTextError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Serialization(e.to_string())
        } else {
            Self::Http(e.to_string())
        }
    }
}

impl From<serde_json::Error> for SpeechToTextError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

impl From<std::io::Error> for SpeechToTextError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<crate::utils::url::UrlError> for SpeechToTextError {
    fn from(e: crate::utils::url::UrlError) -> Self {
        Self::InvalidConfiguration(e.to_string())
    }
}

impl From<crate::config::ConfigError> for SpeechToTextError {
    fn from(e: crate::config::ConfigError) -> Self {
        Self::InvalidConfiguration(e.to_string())
    }
}

fn format_code(code: &Option<u16>) -> String {
    code.map(|c| format!(" ({c})")).unwrap_or_default()
}

/// Result alias used throughout the crate.
pub type SttResult<T> = Result<T, SpeechToTextError>;
