//! Speech-to-Text service client.
//!
//! [`SpeechToText`] wraps the REST interface (models, batch recognition,
//! asynchronous jobs, custom language models) and starts streaming
//! recognition sessions with the same endpoint and credentials.

use bytes::Bytes;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, error, info};
use url::Url;

use super::models::{
    Corpora, Corpus, CreateLanguageModel, CustomWord, CustomWords, LanguageModel,
    LanguageModels, RecognitionJob, RecognitionJobs, SpeechModel, SpeechModels,
    SpeechRecognitionResults, SpeechSession, Word, Words,
};
use super::options::{JobOptions, ListWordsOptions, RecognizeOptions, TrainOptions};
use super::websocket::{AudioSource, RecognitionSession, RecognizeCallback, SessionHandle};
use crate::config::ClientConfig;
use crate::errors::{SpeechToTextError, SttResult};
use crate::utils::tls::install_crypto_provider;
use crate::utils::url::join_segments;

/// Error body returned by the service on non-2xx responses.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ServiceErrorBody {
    error: Option<String>,
    code_description: Option<String>,
    description: Option<String>,
}

/// Client for the Speech-to-Text service.
///
/// Cheap to share behind an `Arc`; the underlying HTTP connection pool is
/// reused across requests.
pub struct SpeechToText {
    http: Client,
    config: ClientConfig,
    service_url: Url,
    request_counter: AtomicU64,
}

impl std::fmt::Debug for SpeechToText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeechToText")
            .field("service_url", &self.service_url.as_str())
            .field("credentials", &self.config.credentials)
            .finish()
    }
}

impl SpeechToText {
    /// Build a client from `config`.
    ///
    /// # Errors
    /// Returns [`SpeechToTextError::InvalidConfiguration`] when the
    /// configuration does not validate or a default header is malformed.
    pub fn new(config: ClientConfig) -> SttResult<Self> {
        config.validate()?;
        let service_url = config.parsed_service_url()?;
        install_crypto_provider();

        let mut headers = HeaderMap::new();
        for (name, value) in &config.default_headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                SpeechToTextError::InvalidConfiguration(format!("Invalid header name {name}: {e}"))
            })?;
            let value = HeaderValue::from_str(value).map_err(|e| {
                SpeechToTextError::InvalidConfiguration(format!(
                    "Invalid value for header {}: {e}",
                    name.as_str()
                ))
            })?;
            headers.insert(name, value);
        }
        if let Some(authorization) = config.credentials.authorization_header() {
            let mut value = HeaderValue::from_str(&authorization).map_err(|_| {
                SpeechToTextError::InvalidConfiguration("Invalid authorization header".into())
            })?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let http = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .default_headers(headers)
            .build()
            .map_err(|e| {
                SpeechToTextError::InvalidConfiguration(format!(
                    "Failed to create HTTP client: {e}"
                ))
            })?;

        info!(service_url = %service_url, "Speech-to-Text client created");

        Ok(Self {
            http,
            config,
            service_url,
            request_counter: AtomicU64::new(0),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn service_url(&self) -> &Url {
        &self.service_url
    }

    // =========================================================================
    // Streaming recognition
    // =========================================================================

    /// Start a streaming recognition session.
    ///
    /// Returns as soon as the session is running; results and lifecycle
    /// events are delivered to `callback`. See [`RecognitionSession::start`]
    /// for the synchronous errors.
    pub fn recognize_using_websocket(
        &self,
        audio: impl AudioSource + 'static,
        options: RecognizeOptions,
        callback: Arc<dyn RecognizeCallback>,
    ) -> SttResult<SessionHandle> {
        RecognitionSession::from_config(&self.config)?
            .audio(audio)
            .options(options)
            .callback(callback)
            .start()
    }

    // =========================================================================
    // Models
    // =========================================================================

    /// `GET /v1/models`
    pub async fn list_models(&self) -> SttResult<SpeechModels> {
        let url = self.endpoint(&["v1", "models"])?;
        self.execute(self.http.get(url)).await
    }

    /// `GET /v1/models/{model_id}`
    pub async fn get_model(&self, model_id: &str) -> SttResult<SpeechModel> {
        require("model_id", model_id)?;
        let url = self.endpoint(&["v1", "models", model_id])?;
        self.execute(self.http.get(url)).await
    }

    // =========================================================================
    // Batch recognition
    // =========================================================================

    /// `POST /v1/recognize` with the whole audio in the request body.
    pub async fn recognize(
        &self,
        audio: impl Into<Bytes>,
        options: &RecognizeOptions,
    ) -> SttResult<SpeechRecognitionResults> {
        options.validate()?;
        let audio = audio.into();
        if audio.is_empty() {
            return Err(SpeechToTextError::InvalidArgument(
                "audio must not be empty".into(),
            ));
        }
        let url = self.endpoint_with_query(&["v1", "recognize"], options.rest_query_pairs())?;
        let request = self
            .http
            .post(url)
            .header(CONTENT_TYPE, options.content_type.as_str())
            .body(audio);
        self.execute(request).await
    }

    /// `POST /v1/sessions`
    pub async fn create_session(&self, model: Option<&str>) -> SttResult<SpeechSession> {
        let pairs = model.map(|m| vec![("model", m.to_string())]).unwrap_or_default();
        let url = self.endpoint_with_query(&["v1", "sessions"], pairs)?;
        self.execute(self.http.post(url)).await
    }

    /// `DELETE /v1/sessions/{session_id}`
    pub async fn delete_session(&self, session_id: &str) -> SttResult<()> {
        require("session_id", session_id)?;
        let url = self.endpoint(&["v1", "sessions", session_id])?;
        self.execute_empty(self.http.delete(url)).await
    }

    // =========================================================================
    // Asynchronous jobs
    // =========================================================================

    /// `POST /v1/recognitions`
    pub async fn create_job(
        &self,
        audio: impl Into<Bytes>,
        options: &RecognizeOptions,
        job: &JobOptions,
    ) -> SttResult<RecognitionJob> {
        options.validate()?;
        let audio = audio.into();
        if audio.is_empty() {
            return Err(SpeechToTextError::InvalidArgument(
                "audio must not be empty".into(),
            ));
        }
        let mut pairs = job.query_pairs();
        pairs.extend(options.rest_query_pairs());
        let url = self.endpoint_with_query(&["v1", "recognitions"], pairs)?;
        let request = self
            .http
            .post(url)
            .header(CONTENT_TYPE, options.content_type.as_str())
            .body(audio);
        self.execute(request).await
    }

    /// `GET /v1/recognitions`
    pub async fn check_jobs(&self) -> SttResult<RecognitionJobs> {
        let url = self.endpoint(&["v1", "recognitions"])?;
        self.execute(self.http.get(url)).await
    }

    /// `GET /v1/recognitions/{id}`
    pub async fn check_job(&self, id: &str) -> SttResult<RecognitionJob> {
        require("id", id)?;
        let url = self.endpoint(&["v1", "recognitions", id])?;
        self.execute(self.http.get(url)).await
    }

    /// `DELETE /v1/recognitions/{id}`
    pub async fn delete_job(&self, id: &str) -> SttResult<()> {
        require("id", id)?;
        let url = self.endpoint(&["v1", "recognitions", id])?;
        self.execute_empty(self.http.delete(url)).await
    }

    // =========================================================================
    // Custom language models
    // =========================================================================

    /// `GET /v1/customizations`, optionally filtered by language.
    pub async fn list_language_models(&self, language: Option<&str>) -> SttResult<LanguageModels> {
        let pairs = language
            .map(|l| vec![("language", l.to_string())])
            .unwrap_or_default();
        let url = self.endpoint_with_query(&["v1", "customizations"], pairs)?;
        self.execute(self.http.get(url)).await
    }

    /// `GET /v1/customizations/{customization_id}`
    pub async fn get_language_model(&self, customization_id: &str) -> SttResult<LanguageModel> {
        require("customization_id", customization_id)?;
        let url = self.endpoint(&["v1", "customizations", customization_id])?;
        self.execute(self.http.get(url)).await
    }

    /// `POST /v1/customizations`
    pub async fn create_language_model(
        &self,
        model: &CreateLanguageModel,
    ) -> SttResult<LanguageModel> {
        require("name", &model.name)?;
        require("base_model_name", &model.base_model_name)?;
        let url = self.endpoint(&["v1", "customizations"])?;
        self.execute(self.http.post(url).json(model)).await
    }

    /// `DELETE /v1/customizations/{customization_id}`
    pub async fn delete_language_model(&self, customization_id: &str) -> SttResult<()> {
        require("customization_id", customization_id)?;
        let url = self.endpoint(&["v1", "customizations", customization_id])?;
        self.execute_empty(self.http.delete(url)).await
    }

    /// `POST /v1/customizations/{customization_id}/train`
    pub async fn train_language_model(
        &self,
        customization_id: &str,
        options: &TrainOptions,
    ) -> SttResult<()> {
        require("customization_id", customization_id)?;
        let url = self.endpoint_with_query(
            &["v1", "customizations", customization_id, "train"],
            options.query_pairs()?,
        )?;
        self.execute_empty(self.http.post(url)).await
    }

    /// `POST /v1/customizations/{customization_id}/reset`
    pub async fn reset_language_model(&self, customization_id: &str) -> SttResult<()> {
        require("customization_id", customization_id)?;
        let url = self.endpoint(&["v1", "customizations", customization_id, "reset"])?;
        self.execute_empty(self.http.post(url)).await
    }

    /// `POST /v1/customizations/{customization_id}/upgrade_model`
    pub async fn upgrade_language_model(&self, customization_id: &str) -> SttResult<()> {
        require("customization_id", customization_id)?;
        let url = self.endpoint(&["v1", "customizations", customization_id, "upgrade_model"])?;
        self.execute_empty(self.http.post(url)).await
    }

    // ----- Corpora -----

    /// `GET /v1/customizations/{customization_id}/corpora`
    pub async fn list_corpora(&self, customization_id: &str) -> SttResult<Corpora> {
        require("customization_id", customization_id)?;
        let url = self.endpoint(&["v1", "customizations", customization_id, "corpora"])?;
        self.execute(self.http.get(url)).await
    }

    /// `GET /v1/customizations/{customization_id}/corpora/{corpus_name}`
    pub async fn get_corpus(&self, customization_id: &str, corpus_name: &str) -> SttResult<Corpus> {
        require("customization_id", customization_id)?;
        require("corpus_name", corpus_name)?;
        let url = self.endpoint(&["v1", "customizations", customization_id, "corpora", corpus_name])?;
        self.execute(self.http.get(url)).await
    }

    /// `POST /v1/customizations/{customization_id}/corpora/{corpus_name}`
    ///
    /// Uploads `text` as the multipart field `corpus_file`.
    pub async fn add_corpus(
        &self,
        customization_id: &str,
        corpus_name: &str,
        text: impl Into<String>,
        allow_overwrite: Option<bool>,
    ) -> SttResult<()> {
        require("customization_id", customization_id)?;
        require("corpus_name", corpus_name)?;
        let text = text.into();
        if text.is_empty() {
            return Err(SpeechToTextError::InvalidArgument(
                "corpus text must not be empty".into(),
            ));
        }
        let pairs = allow_overwrite
            .map(|v| vec![("allow_overwrite", v.to_string())])
            .unwrap_or_default();
        let url = self.endpoint_with_query(
            &["v1", "customizations", customization_id, "corpora", corpus_name],
            pairs,
        )?;
        let part = Part::text(text)
            .file_name(corpus_name.to_string())
            .mime_str("text/plain")
            .map_err(|e| SpeechToTextError::Serialization(e.to_string()))?;
        let form = Form::new().part("corpus_file", part);
        self.execute_empty(self.http.post(url).multipart(form)).await
    }

    /// `DELETE /v1/customizations/{customization_id}/corpora/{corpus_name}`
    pub async fn delete_corpus(&self, customization_id: &str, corpus_name: &str) -> SttResult<()> {
        require("customization_id", customization_id)?;
        require("corpus_name", corpus_name)?;
        let url = self.endpoint(&["v1", "customizations", customization_id, "corpora", corpus_name])?;
        self.execute_empty(self.http.delete(url)).await
    }

    // ----- Words -----

    /// `GET /v1/customizations/{customization_id}/words`
    pub async fn list_words(
        &self,
        customization_id: &str,
        options: &ListWordsOptions,
    ) -> SttResult<Words> {
        require("customization_id", customization_id)?;
        let url = self.endpoint_with_query(
            &["v1", "customizations", customization_id, "words"],
            options.query_pairs(),
        )?;
        self.execute(self.http.get(url)).await
    }

    /// `GET /v1/customizations/{customization_id}/words/{word}`
    pub async fn get_word(&self, customization_id: &str, word: &str) -> SttResult<Word> {
        require("customization_id", customization_id)?;
        require("word", word)?;
        let url = self.endpoint(&["v1", "customizations", customization_id, "words", word])?;
        self.execute(self.http.get(url)).await
    }

    /// `POST /v1/customizations/{customization_id}/words`
    pub async fn add_words(&self, customization_id: &str, words: &[CustomWord]) -> SttResult<()> {
        require("customization_id", customization_id)?;
        if words.is_empty() {
            return Err(SpeechToTextError::InvalidArgument(
                "words must not be empty".into(),
            ));
        }
        if words.iter().any(|w| w.word.trim().is_empty()) {
            return Err(SpeechToTextError::InvalidArgument(
                "every custom word needs a word".into(),
            ));
        }
        let url = self.endpoint(&["v1", "customizations", customization_id, "words"])?;
        let body = CustomWords { words };
        self.execute_empty(self.http.post(url).json(&body)).await
    }

    /// `PUT /v1/customizations/{customization_id}/words/{word}`
    pub async fn add_word(&self, customization_id: &str, word: &CustomWord) -> SttResult<()> {
        require("customization_id", customization_id)?;
        require("word", &word.word)?;
        let url = self.endpoint(&["v1", "customizations", customization_id, "words", &word.word])?;
        let body = CustomWord {
            word: String::new(),
            ..word.clone()
        };
        self.execute_empty(self.http.put(url).json(&body)).await
    }

    /// `DELETE /v1/customizations/{customization_id}/words/{word}`
    pub async fn delete_word(&self, customization_id: &str, word: &str) -> SttResult<()> {
        require("customization_id", customization_id)?;
        require("word", word)?;
        let url = self.endpoint(&["v1", "customizations", customization_id, "words", word])?;
        self.execute_empty(self.http.delete(url)).await
    }

    // =========================================================================
    // Request plumbing
    // =========================================================================

    fn endpoint(&self, segments: &[&str]) -> SttResult<Url> {
        Ok(join_segments(&self.service_url, segments)?)
    }

    fn endpoint_with_query(
        &self,
        segments: &[&str],
        pairs: Vec<(&'static str, String)>,
    ) -> SttResult<Url> {
        let mut url = self.endpoint(segments)?;
        if !pairs.is_empty() {
            url.query_pairs_mut().extend_pairs(pairs);
        }
        Ok(url)
    }

    async fn execute<T: DeserializeOwned>(&self, request: RequestBuilder) -> SttResult<T> {
        let response = self.send(request).await?;
        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| {
            SpeechToTextError::Serialization(format!("Failed to parse response: {e}"))
        })
    }

    async fn execute_empty(&self, request: RequestBuilder) -> SttResult<()> {
        self.send(request).await?;
        Ok(())
    }

    async fn send(&self, request: RequestBuilder) -> SttResult<Response> {
        let request = request.build()?;
        let request_id = self.request_counter.fetch_add(1, Ordering::Relaxed) + 1;
        let method: Method = request.method().clone();
        let url = request.url().clone();

        debug!(request_id = request_id, method = %method, url = %url, "Sending request");

        let response = self.http.execute(request).await.map_err(|e| {
            error!(request_id = request_id, error = %e, "Request failed");
            SpeechToTextError::Http(format!("{method} {url} failed: {e}"))
        })?;

        let status = response.status();
        if status.is_success() {
            debug!(request_id = request_id, status = %status, "Request succeeded");
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        error!(
            request_id = request_id,
            status = %status,
            body = %body,
            "Service returned error"
        );
        Err(service_error(status.as_u16(), status.canonical_reason(), &body))
    }
}

/// Build a [`SpeechToTextError::RemoteError`] from a non-2xx response.
fn service_error(status: u16, reason: Option<&str>, body: &str) -> SpeechToTextError {
    let parsed: ServiceErrorBody = serde_json::from_str(body).unwrap_or_default();
    let message = parsed
        .error
        .or(parsed.code_description)
        .or(parsed.description)
        .or_else(|| (!body.trim().is_empty()).then(|| body.trim().to_string()))
        .or_else(|| reason.map(str::to_string))
        .unwrap_or_else(|| "Unknown error".to_string());
    SpeechToTextError::remote(message, Some(status))
}

fn require(name: &str, value: &str) -> SttResult<()> {
    if value.trim().is_empty() {
        return Err(SpeechToTextError::InvalidArgument(format!(
            "{name} must not be empty"
        )));
    }
    Ok(())
}
