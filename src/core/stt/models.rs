//! Response and request bodies exchanged with the service.
//!
//! Parsing is tolerant: unknown fields are ignored and most fields are
//! optional, so newer service versions keep deserializing.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// =============================================================================
// Recognition Results
// =============================================================================

/// One batch of recognition results, as delivered by a streaming session or
/// returned by `POST /v1/recognize`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpeechRecognitionResults {
    #[serde(default)]
    pub results: Vec<SpeechRecognitionResult>,
    /// Index of the first result in `results` within the whole session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker_labels: Option<Vec<SpeakerLabelsResult>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warnings: Option<Vec<String>>,
}

impl SpeechRecognitionResults {
    /// Whether this batch is final: every result is final, or the batch only
    /// carries final speaker labels.
    pub fn is_final(&self) -> bool {
        if self.results.is_empty() {
            return self
                .speaker_labels
                .as_ref()
                .is_some_and(|labels| !labels.is_empty() && labels.iter().all(|l| l.is_final));
        }
        self.results.iter().all(|r| r.is_final)
    }

    /// Best transcript of the most recent result, trimmed.
    pub fn best_transcript(&self) -> Option<&str> {
        self.results
            .last()
            .and_then(|r| r.alternatives.first())
            .map(|alt| alt.transcript.trim())
    }
}

/// A single utterance hypothesis set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpeechRecognitionResult {
    /// Final results are never revised.
    #[serde(rename = "final", default)]
    pub is_final: bool,
    #[serde(default)]
    pub alternatives: Vec<SpeechRecognitionAlternative>,
    /// Spotted keywords, keyed by the requested keyword.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keywords_result: Option<HashMap<String, Vec<KeywordResult>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word_alternatives: Option<Vec<WordAlternativeResults>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_of_utterance: Option<String>,
}

/// Transcription alternative (hypothesis).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpeechRecognitionAlternative {
    pub transcript: String,
    /// Only present on final results.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    /// `[[word, start_time, end_time], ...]`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamps: Option<Vec<WordTimestamp>>,
    /// `[[word, confidence], ...]`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word_confidence: Option<Vec<WordConfidence>>,
}

/// Word-level timestamp `(word, start_time, end_time)`.
pub type WordTimestamp = (String, f64, f64);

/// Word-level confidence `(word, confidence)`.
pub type WordConfidence = (String, f64);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeywordResult {
    pub normalized_text: String,
    pub start_time: f64,
    pub end_time: f64,
    pub confidence: f64,
}

/// Confusion network entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WordAlternativeResults {
    pub start_time: f64,
    pub end_time: f64,
    #[serde(default)]
    pub alternatives: Vec<WordAlternativeResult>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WordAlternativeResult {
    pub confidence: f64,
    pub word: String,
}

/// Speaker diarization entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpeakerLabelsResult {
    pub from: f64,
    pub to: f64,
    pub speaker: i64,
    #[serde(default)]
    pub confidence: f64,
    #[serde(rename = "final", default)]
    pub is_final: bool,
}

// =============================================================================
// Models
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpeechModel {
    pub name: String,
    #[serde(default)]
    pub language: String,
    /// Sampling rate in Hz.
    #[serde(default)]
    pub rate: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supported_features: Option<SupportedFeatures>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sessions: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SupportedFeatures {
    #[serde(default)]
    pub custom_language_model: bool,
    #[serde(default)]
    pub speaker_labels: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpeechModels {
    #[serde(default)]
    pub models: Vec<SpeechModel>,
}

// =============================================================================
// Sessions
// =============================================================================

/// A session created with `POST /v1/sessions`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpeechSession {
    pub session_id: String,
    #[serde(default)]
    pub new_session_uri: String,
    #[serde(default)]
    pub recognize: String,
    #[serde(default)]
    pub observe_result: String,
    #[serde(rename = "recognizeWS", default)]
    pub recognize_ws: String,
}

// =============================================================================
// Asynchronous Jobs
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Waiting,
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionJob {
    pub id: String,
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_token: Option<String>,
    /// Present once the job has completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<SpeechRecognitionResults>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warnings: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecognitionJobs {
    #[serde(default)]
    pub recognitions: Vec<RecognitionJob>,
}

// =============================================================================
// Custom Language Models
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LanguageModel {
    pub customization_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dialect: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_model_name: Option<String>,
    /// `pending`, `ready`, `training`, `available`, `upgrading` or `failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warnings: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub versions: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LanguageModels {
    #[serde(default)]
    pub customizations: Vec<LanguageModel>,
}

/// Body of `POST /v1/customizations`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateLanguageModel {
    pub name: String,
    pub base_model_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dialect: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Corpus {
    pub name: String,
    #[serde(default)]
    pub total_words: u64,
    #[serde(default)]
    pub out_of_vocabulary_words: u64,
    /// `analyzed`, `being_processed` or `undetermined`.
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Corpora {
    #[serde(default)]
    pub corpora: Vec<Corpus>,
}

/// A word to add to a custom model's vocabulary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomWord {
    /// Omitted from the body of `PUT .../words/{word}`, where it is part of
    /// the path.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub word: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sounds_like: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_as: Option<String>,
}

impl CustomWord {
    pub fn new(word: impl Into<String>) -> Self {
        Self {
            word: word.into(),
            ..Default::default()
        }
    }
}

/// A word in a custom model's vocabulary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Word {
    pub word: String,
    #[serde(default)]
    pub sounds_like: Vec<String>,
    #[serde(default)]
    pub display_as: String,
    #[serde(default)]
    pub count: u64,
    /// `user` and/or the names of the corpora the word came from.
    #[serde(default)]
    pub source: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Vec<HashMap<String, String>>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Words {
    #[serde(default)]
    pub words: Vec<Word>,
}

/// Body of `POST /v1/customizations/{id}/words`.
#[derive(Debug, Serialize)]
pub(crate) struct CustomWords<'a> {
    pub words: &'a [CustomWord],
}
