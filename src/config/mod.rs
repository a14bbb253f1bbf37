//! Client configuration
//!
//! Configuration comes from YAML files and environment variables.
//! Priority: YAML > ENV vars > .env values > defaults. The `.env` file is
//! loaded by the binary at startup, so by the time this module runs it is
//! indistinguishable from the real environment.
//!
//! # Example
//! ```rust,no_run
//! use watson_stt::config::ClientConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ClientConfig::from_env()?;
//!
//! // Load from YAML file with environment variables as the base
//! let config = ClientConfig::from_file("stt.yaml")?;
//! println!("Service at {}", config.service_url);
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use thiserror::Error;
use url::Url;

use crate::core::stt::websocket::{DEFAULT_CHUNK_SIZE, DEFAULT_IDLE_TIMEOUT};
use crate::utils::url::{UrlError, parse_service_url};

mod yaml;

pub use yaml::{AuthYaml, TimeoutsYaml, WebSocketYaml, YamlConfig};

/// Public endpoint of the hosted service.
pub const DEFAULT_SERVICE_URL: &str = "https://stream.watsonplatform.net/speech-to-text/api";

/// Timeout applied to every REST request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Timeout for TCP + TLS + WebSocket handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

// ===== Environment variable names =====

pub const ENV_URL: &str = "SPEECH_TO_TEXT_URL";
pub const ENV_USERNAME: &str = "SPEECH_TO_TEXT_USERNAME";
pub const ENV_PASSWORD: &str = "SPEECH_TO_TEXT_PASSWORD";
pub const ENV_APIKEY: &str = "SPEECH_TO_TEXT_APIKEY";
pub const ENV_BEARER_TOKEN: &str = "SPEECH_TO_TEXT_BEARER_TOKEN";
pub const ENV_TIMEOUT_SECS: &str = "SPEECH_TO_TEXT_TIMEOUT_SECS";

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("Failed to parse YAML config: {0}")]
    Parse(String),

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Incomplete credentials: {0}")]
    IncompleteCredentials(String),

    #[error("Invalid service URL: {0}")]
    InvalidUrl(#[from] UrlError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

// =============================================================================
// Credentials
// =============================================================================

/// How requests authenticate against the service.
#[derive(Clone, PartialEq, Eq, Default)]
pub enum Credentials {
    /// No `Authorization` header (e.g. behind an authenticating proxy).
    #[default]
    None,
    /// HTTP basic authentication with service credentials.
    Basic { username: String, password: String },
    /// A pre-obtained bearer token.
    Bearer(String),
    /// An API key, sent as basic authentication with the user `apikey`.
    ApiKey(String),
}

impl Credentials {
    /// Value of the `Authorization` header, if any.
    pub fn authorization_header(&self) -> Option<String> {
        match self {
            Self::None => None,
            Self::Basic { username, password } => Some(basic(username, password)),
            Self::Bearer(token) => Some(format!("Bearer {token}")),
            Self::ApiKey(key) => Some(basic("apikey", key)),
        }
    }

    /// Pick a credential scheme from the individual settings.
    ///
    /// A bearer token wins over an API key, which wins over a
    /// username/password pair.
    fn from_parts(
        username: Option<String>,
        password: Option<String>,
        apikey: Option<String>,
        bearer_token: Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(token) = bearer_token {
            return Ok(Self::Bearer(token));
        }
        if let Some(key) = apikey {
            return Ok(Self::ApiKey(key));
        }
        match (username, password) {
            (Some(username), Some(password)) => Ok(Self::Basic { username, password }),
            (Some(_), None) => Err(ConfigError::IncompleteCredentials(
                "username given without a password".to_string(),
            )),
            (None, Some(_)) => Err(ConfigError::IncompleteCredentials(
                "password given without a username".to_string(),
            )),
            (None, None) => Ok(Self::None),
        }
    }
}

fn basic(username: &str, password: &str) -> String {
    format!("Basic {}", BASE64.encode(format!("{username}:{password}")))
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            Self::Bearer(_) => write!(f, "Bearer(<redacted>)"),
            Self::ApiKey(_) => write!(f, "ApiKey(<redacted>)"),
        }
    }
}

/// Zeroize secrets when credentials are dropped.
impl Drop for Credentials {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        match self {
            Self::None => {}
            Self::Basic { password, .. } => password.zeroize(),
            Self::Bearer(token) => token.zeroize(),
            Self::ApiKey(key) => key.zeroize(),
        }
    }
}

// =============================================================================
// Client Configuration
// =============================================================================

/// Settings shared by the REST client and streaming sessions.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// HTTP(S) base URL; the WebSocket URL is derived from it.
    pub service_url: String,
    pub credentials: Credentials,
    /// Headers added to every request and WebSocket handshake.
    pub default_headers: HashMap<String, String>,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    /// Maximum bytes per binary audio frame.
    pub chunk_size: usize,
    /// Close a streaming session after this long without a server frame.
    pub idle_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            service_url: DEFAULT_SERVICE_URL.to_string(),
            credentials: Credentials::None,
            default_headers: HashMap::new(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            chunk_size: DEFAULT_CHUNK_SIZE,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }
}

impl ClientConfig {
    /// Configuration for `service_url` with the given credentials and
    /// defaults for everything else.
    pub fn new(service_url: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            service_url: service_url.into(),
            credentials,
            ..Default::default()
        }
    }

    /// Load configuration from environment variables, with defaults for
    /// anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(url) = env_var(ENV_URL) {
            config.service_url = url;
        }
        config.credentials = Credentials::from_parts(
            env_var(ENV_USERNAME),
            env_var(ENV_PASSWORD),
            env_var(ENV_APIKEY),
            env_var(ENV_BEARER_TOKEN),
        )?;
        if let Some(raw) = env_var(ENV_TIMEOUT_SECS) {
            let secs: u64 = raw.parse().map_err(|_| ConfigError::InvalidValue {
                key: ENV_TIMEOUT_SECS.to_string(),
                value: raw.clone(),
            })?;
            config.request_timeout = Duration::from_secs(secs);
        }

        config.validate()?;
        Ok(config)
    }

    /// Load a YAML file on top of the environment configuration.
    ///
    /// Values present in the file override environment values; everything
    /// else comes from [`ClientConfig::from_env`].
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let yaml = YamlConfig::from_file(path.as_ref())?;
        let mut config = Self::from_env()?;
        config.apply_yaml(yaml)?;
        config.validate()?;
        Ok(config)
    }

    fn apply_yaml(&mut self, mut yaml: YamlConfig) -> Result<(), ConfigError> {
        if let Some(url) = yaml.service_url.take() {
            self.service_url = url;
        }
        if let Some(auth) = yaml.auth.as_mut() {
            let credentials = Credentials::from_parts(
                auth.username.take(),
                auth.password.take(),
                auth.apikey.take(),
                auth.bearer_token.take(),
            )?;
            if credentials != Credentials::None {
                self.credentials = credentials;
            }
        }
        if let Some(timeouts) = &yaml.timeouts {
            if let Some(secs) = timeouts.request_secs {
                self.request_timeout = Duration::from_secs(secs);
            }
            if let Some(secs) = timeouts.connect_secs {
                self.connect_timeout = Duration::from_secs(secs);
            }
            if let Some(secs) = timeouts.idle_secs {
                self.idle_timeout = Duration::from_secs(secs);
            }
        }
        if let Some(chunk_size) = yaml.websocket.as_ref().and_then(|ws| ws.chunk_size) {
            self.chunk_size = chunk_size;
        }
        if let Some(headers) = yaml.headers.take() {
            self.default_headers.extend(headers);
        }
        Ok(())
    }

    /// Check the configuration is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        parse_service_url(&self.service_url)?;
        if self.chunk_size == 0 {
            return Err(ConfigError::Invalid(
                "chunk_size must be greater than zero".to_string(),
            ));
        }
        if self.request_timeout.is_zero() || self.connect_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "timeouts must be greater than zero".to_string(),
            ));
        }
        if self.idle_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "idle_timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// The parsed service URL.
    pub fn parsed_service_url(&self) -> Result<Url, ConfigError> {
        Ok(parse_service_url(&self.service_url)?)
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
