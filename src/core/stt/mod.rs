//! Speech-to-Text service: REST client, recognition options, result models
//! and streaming recognition.

mod client;
pub mod models;
pub mod options;
pub mod websocket;

pub use client::SpeechToText;
pub use models::{
    Corpora, Corpus, CreateLanguageModel, CustomWord, JobStatus, KeywordResult, LanguageModel,
    LanguageModels, RecognitionJob, RecognitionJobs, SpeakerLabelsResult,
    SpeechRecognitionAlternative, SpeechRecognitionResult, SpeechRecognitionResults,
    SpeechModel, SpeechModels, SpeechSession, SupportedFeatures, Word, WordAlternativeResult,
    WordAlternativeResults, WordConfidence, WordTimestamp, Words,
};
pub use options::{
    AudioEncoding, DEFAULT_MODEL, JobOptions, ListWordsOptions, RecognizeOptions, TrainOptions,
    WordSort, WordType, WordTypeToAdd,
};
pub use websocket::{
    AudioChunk, AudioSource, AudioWriter, BytesAudioSource, ChannelAudioSource, NoopCallback,
    ReaderAudioSource, RecognitionSession, RecognizeCallback, SessionHandle, SessionState,
    audio_channel,
};
