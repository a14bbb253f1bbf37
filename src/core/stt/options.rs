//! Recognition and request options.
//!
//! [`RecognizeOptions`] is the immutable configuration attached to a
//! streaming session (and to batch `recognize` / job requests). Only the
//! options that are set are sent to the service.

use serde::{Deserialize, Serialize};

use crate::core::media_type::{self, AUDIO_ALAW, AUDIO_FLAC, AUDIO_L16, AUDIO_MP3, AUDIO_MULAW};
use crate::errors::{SpeechToTextError, SttResult};

// =============================================================================
// Constants
// =============================================================================

/// Model used by the service when none is requested.
pub const DEFAULT_MODEL: &str = "en-US_BroadbandModel";

/// Inactivity timeout value that disables server-side idle disconnection.
pub const INACTIVITY_TIMEOUT_DISABLED: i32 = 0;

/// Inactivity timeout value the service interprets as "never time out".
pub const INACTIVITY_TIMEOUT_INFINITE: i32 = -1;

// =============================================================================
// Audio Encoding
// =============================================================================

/// Audio encodings with a canonical content type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AudioEncoding {
    /// Linear PCM 16-bit little-endian signed integer.
    #[default]
    Linear16,
    /// Mu-law encoded audio.
    Mulaw,
    /// A-law encoded audio.
    Alaw,
    /// FLAC encoded audio.
    Flac,
    /// Opus encoded in OGG container.
    OggOpus,
    /// Opus encoded in WebM container.
    WebmOpus,
    /// MP3 encoded audio.
    Mp3,
    /// WAV container (rate and channels come from the header).
    Wav,
}

impl AudioEncoding {
    /// Get the content-type MIME string for this encoding.
    ///
    /// Raw encodings carry the sample rate as a parameter; container formats
    /// ignore `sample_rate`.
    pub fn content_type(&self, sample_rate: u32) -> String {
        match self {
            Self::Linear16 => format!("{AUDIO_L16}; rate={sample_rate}"),
            Self::Mulaw => format!("{AUDIO_MULAW}; rate={sample_rate}"),
            Self::Alaw => format!("{AUDIO_ALAW}; rate={sample_rate}"),
            Self::Flac => AUDIO_FLAC.to_string(),
            Self::OggOpus => media_type::AUDIO_OGG_OPUS.to_string(),
            Self::WebmOpus => media_type::AUDIO_WEBM_OPUS.to_string(),
            Self::Mp3 => AUDIO_MP3.to_string(),
            Self::Wav => media_type::AUDIO_WAV.to_string(),
        }
    }
}

impl std::str::FromStr for AudioEncoding {
    type Err = SpeechToTextError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "linear16" | "pcm" | "l16" => Ok(Self::Linear16),
            "mulaw" | "mu-law" => Ok(Self::Mulaw),
            "alaw" | "a-law" => Ok(Self::Alaw),
            "flac" => Ok(Self::Flac),
            "ogg-opus" | "opus" => Ok(Self::OggOpus),
            "webm-opus" => Ok(Self::WebmOpus),
            "mp3" => Ok(Self::Mp3),
            "wav" => Ok(Self::Wav),
            _ => Err(SpeechToTextError::InvalidConfiguration(format!(
                "Unsupported audio encoding: {s}"
            ))),
        }
    }
}

// =============================================================================
// Recognize Options
// =============================================================================

/// Recognition parameters for one recognition request or streaming session.
///
/// Construct with [`RecognizeOptions::new`] and struct-update syntax:
///
/// ```rust
/// use watson_stt::RecognizeOptions;
///
/// let options = RecognizeOptions {
///     interim_results: Some(true),
///     smart_formatting: Some(true),
///     ..RecognizeOptions::new("audio/l16; rate=16000")
/// };
/// assert!(options.validate().is_ok());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecognizeOptions {
    /// Audio content type, e.g. `audio/l16; rate=44000` or `audio/wav`.
    pub content_type: String,

    /// Recognition model name (sent as a URL parameter).
    #[serde(default)]
    pub model: Option<String>,

    /// Custom language model id (sent as a URL parameter).
    #[serde(default)]
    pub customization_id: Option<String>,

    /// Weight of the custom language model, 0.0 to 1.0.
    #[serde(default)]
    pub customization_weight: Option<f64>,

    /// Deliver interim (partial) results. Streaming only.
    #[serde(default)]
    pub interim_results: Option<bool>,

    /// Per-word start/end times (`timestamps` on the wire).
    #[serde(default)]
    pub word_timestamps: Option<bool>,

    /// Per-word confidence scores.
    #[serde(default)]
    pub word_confidence: Option<bool>,

    /// Maximum number of alternative transcripts, at least 1.
    #[serde(default)]
    pub max_alternatives: Option<u32>,

    #[serde(default)]
    pub profanity_filter: Option<bool>,

    /// Convert dates, times, numbers etc. to conventional forms.
    #[serde(default)]
    pub smart_formatting: Option<bool>,

    /// Speaker diarization.
    #[serde(default)]
    pub speaker_labels: Option<bool>,

    /// Seconds of silence after which the service closes the connection.
    /// `0` disables the timeout, `-1` means infinite. Advisory only: the
    /// client never enforces it.
    #[serde(default)]
    pub inactivity_timeout: Option<i32>,

    /// Keywords to spot in the audio.
    #[serde(default)]
    pub keywords: Option<Vec<String>>,

    /// Minimum confidence for a keyword match, 0.0 to 1.0.
    #[serde(default)]
    pub keywords_threshold: Option<f64>,

    /// Minimum confidence for word alternatives, 0.0 to 1.0.
    #[serde(default)]
    pub word_alternatives_threshold: Option<f64>,
}

impl RecognizeOptions {
    /// Options with only a content type set.
    pub fn new(content_type: impl Into<String>) -> Self {
        Self {
            content_type: content_type.into(),
            ..Default::default()
        }
    }

    /// Options for raw audio in the given encoding.
    pub fn for_encoding(encoding: AudioEncoding, sample_rate: u32) -> Self {
        Self::new(encoding.content_type(sample_rate))
    }

    /// Check that the options can be sent to the service.
    pub fn validate(&self) -> SttResult<()> {
        if self.content_type.trim().is_empty() {
            return Err(invalid("content_type is required"));
        }
        if !media_type::is_valid_media_type(&self.content_type) {
            return Err(invalid(format!(
                "unsupported content type: {}",
                self.content_type
            )));
        }
        if self.max_alternatives == Some(0) {
            return Err(invalid("max_alternatives must be at least 1"));
        }
        if let Some(weight) = self.customization_weight {
            check_unit_range("customization_weight", weight)?;
            if self.customization_id.is_none() {
                return Err(invalid("customization_weight requires a customization_id"));
            }
        }
        if let Some(threshold) = self.keywords_threshold {
            check_unit_range("keywords_threshold", threshold)?;
        }
        if let Some(threshold) = self.word_alternatives_threshold {
            check_unit_range("word_alternatives_threshold", threshold)?;
        }
        let has_keywords = self.keywords.as_ref().is_some_and(|k| !k.is_empty());
        if has_keywords != self.keywords_threshold.is_some() {
            return Err(invalid(
                "keywords and keywords_threshold must be specified together",
            ));
        }
        if let Some(timeout) = self.inactivity_timeout {
            if timeout < INACTIVITY_TIMEOUT_INFINITE {
                return Err(invalid(format!(
                    "inactivity_timeout must be -1 or greater, got {timeout}"
                )));
            }
        }
        Ok(())
    }

    /// URL parameters for the streaming endpoint. Everything else travels in
    /// the start frame.
    pub fn websocket_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(model) = &self.model {
            pairs.push(("model", model.clone()));
        }
        if let Some(id) = &self.customization_id {
            pairs.push(("customization_id", id.clone()));
        }
        pairs
    }

    /// URL parameters for `POST /v1/recognize` and `POST /v1/recognitions`.
    pub fn rest_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = self.websocket_query_pairs();
        push_opt(&mut pairs, "customization_weight", self.customization_weight);
        push_opt(&mut pairs, "inactivity_timeout", self.inactivity_timeout);
        if let Some(keywords) = self.keywords.as_ref().filter(|k| !k.is_empty()) {
            pairs.push(("keywords", keywords.join(",")));
        }
        push_opt(&mut pairs, "keywords_threshold", self.keywords_threshold);
        push_opt(&mut pairs, "max_alternatives", self.max_alternatives);
        push_opt(
            &mut pairs,
            "word_alternatives_threshold",
            self.word_alternatives_threshold,
        );
        push_opt(&mut pairs, "word_confidence", self.word_confidence);
        push_opt(&mut pairs, "timestamps", self.word_timestamps);
        push_opt(&mut pairs, "profanity_filter", self.profanity_filter);
        push_opt(&mut pairs, "smart_formatting", self.smart_formatting);
        push_opt(&mut pairs, "speaker_labels", self.speaker_labels);
        pairs
    }
}

fn push_opt<T: ToString>(pairs: &mut Vec<(&'static str, String)>, key: &'static str, value: Option<T>) {
    if let Some(value) = value {
        pairs.push((key, value.to_string()));
    }
}

fn check_unit_range(name: &str, value: f64) -> SttResult<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(invalid(format!(
            "{name} must be between 0.0 and 1.0, got {value}"
        )));
    }
    Ok(())
}

fn invalid(message: impl Into<String>) -> SpeechToTextError {
    SpeechToTextError::InvalidConfiguration(message.into())
}

// =============================================================================
// Asynchronous Job Options
// =============================================================================

/// Job-level parameters for `POST /v1/recognitions`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobOptions {
    /// Pre-registered callback URL notified on job status changes.
    pub callback_url: Option<String>,
    /// Comma separated list of events to notify (`recognitions.started`, ...).
    pub events: Option<String>,
    /// Opaque token echoed back in callback notifications.
    pub user_token: Option<String>,
    /// Minutes to keep the results after the job completes.
    pub results_ttl: Option<u32>,
}

impl JobOptions {
    pub(crate) fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        push_opt(&mut pairs, "callback_url", self.callback_url.as_ref());
        push_opt(&mut pairs, "events", self.events.as_ref());
        push_opt(&mut pairs, "user_token", self.user_token.as_ref());
        push_opt(&mut pairs, "results_ttl", self.results_ttl);
        pairs
    }
}

// =============================================================================
// Customization Options
// =============================================================================

/// Which words to add to a custom model's vocabulary when training.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WordTypeToAdd {
    All,
    User,
}

impl WordTypeToAdd {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::User => "user",
        }
    }
}

/// Options for `POST /v1/customizations/{id}/train`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainOptions {
    pub word_type_to_add: Option<WordTypeToAdd>,
    pub customization_weight: Option<f64>,
}

impl TrainOptions {
    pub(crate) fn query_pairs(&self) -> SttResult<Vec<(&'static str, String)>> {
        if let Some(weight) = self.customization_weight {
            check_unit_range("customization_weight", weight)?;
        }
        let mut pairs = Vec::new();
        push_opt(
            &mut pairs,
            "word_type_to_add",
            self.word_type_to_add.map(|w| w.as_str()),
        );
        push_opt(&mut pairs, "customization_weight", self.customization_weight);
        Ok(pairs)
    }
}

/// Filter for `GET /v1/customizations/{id}/words`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WordType {
    All,
    User,
    Corpora,
}

impl WordType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::User => "user",
            Self::Corpora => "corpora",
        }
    }
}

/// Sort order for `GET /v1/customizations/{id}/words`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordSort {
    Alphabetical,
    Count,
}

impl WordSort {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Alphabetical => "alphabetical",
            Self::Count => "count",
        }
    }
}

/// Options for listing the words of a custom model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListWordsOptions {
    pub word_type: Option<WordType>,
    pub sort: Option<WordSort>,
}

impl ListWordsOptions {
    pub(crate) fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        push_opt(&mut pairs, "word_type", self.word_type.map(|w| w.as_str()));
        push_opt(&mut pairs, "sort", self.sort.map(|s| s.as_str()));
        pairs
    }
}

// =============================================================================
// Tests
// =============================================================================
