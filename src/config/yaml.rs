use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

use super::ConfigError;

/// Client configuration as written in a YAML file.
///
/// Every field is optional; whatever is missing falls back to the
/// environment and then to built-in defaults.
///
/// # Example YAML structure
/// ```yaml
/// service_url: "https://stream.watsonplatform.net/speech-to-text/api"
///
/// auth:
///   username: "user"
///   password: "secret"
///   # or: apikey: "..."
///   # or: bearer_token: "..."
///
/// timeouts:
///   request_secs: 60
///   connect_secs: 10
///   idle_secs: 60
///
/// websocket:
///   chunk_size: 4096
///
/// headers:
///   X-Watson-Learning-Opt-Out: "true"
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub service_url: Option<String>,
    pub auth: Option<AuthYaml>,
    pub timeouts: Option<TimeoutsYaml>,
    pub websocket: Option<WebSocketYaml>,
    pub headers: Option<HashMap<String, String>>,
}

/// Credentials from YAML. At most one scheme should be filled in.
///
/// Missing fields deserialize to `None`. No container `#[serde(default)]`
/// here: the type implements `Drop`.
#[derive(Clone, Deserialize, Default)]
pub struct AuthYaml {
    pub username: Option<String>,
    pub password: Option<String>,
    pub apikey: Option<String>,
    pub bearer_token: Option<String>,
}

impl std::fmt::Debug for AuthYaml {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthYaml")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("apikey", &self.apikey.as_ref().map(|_| "<redacted>"))
            .field(
                "bearer_token",
                &self.bearer_token.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

impl Drop for AuthYaml {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        for secret in [&mut self.password, &mut self.apikey, &mut self.bearer_token]
            .into_iter()
            .flatten()
        {
            secret.zeroize();
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TimeoutsYaml {
    pub request_secs: Option<u64>,
    pub connect_secs: Option<u64>,
    pub idle_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct WebSocketYaml {
    pub chunk_size: Option<usize>,
}

impl YamlConfig {
    /// Load a YAML configuration file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or is not valid YAML for
    /// this structure.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_yaml_config_full() {
        let yaml = r#"
service_url: "https://api.us-south.speech-to-text.watson.cloud.ibm.com"
auth:
  username: "user"
  password: "pass"
timeouts:
  request_secs: 30
  connect_secs: 5
  idle_secs: 120
websocket:
  chunk_size: 8192
headers:
  X-Watson-Learning-Opt-Out: "true"
"#;
        let config: YamlConfig = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(
            config.service_url.as_deref(),
            Some("https://api.us-south.speech-to-text.watson.cloud.ibm.com")
        );
        let auth = config.auth.as_ref().unwrap();
        assert_eq!(auth.username.as_deref(), Some("user"));
        assert_eq!(auth.password.as_deref(), Some("pass"));
        assert!(auth.apikey.is_none());

        let timeouts = config.timeouts.as_ref().unwrap();
        assert_eq!(timeouts.request_secs, Some(30));
        assert_eq!(timeouts.connect_secs, Some(5));
        assert_eq!(timeouts.idle_secs, Some(120));
        assert_eq!(config.websocket.as_ref().unwrap().chunk_size, Some(8192));
        assert_eq!(
            config.headers.as_ref().unwrap().get("X-Watson-Learning-Opt-Out"),
            Some(&"true".to_string())
        );
    }

    #[test]
    fn test_yaml_config_empty() {
        let config: YamlConfig = serde_yaml::from_str("{}").unwrap();
        assert!(config.service_url.is_none());
        assert!(config.auth.is_none());
        assert!(config.timeouts.is_none());
    }

    #[test]
    fn test_auth_missing_fields_are_none() {
        let config: YamlConfig =
            serde_yaml::from_str("auth:\n  apikey: \"key-1\"\n").unwrap();
        let auth = config.auth.as_ref().unwrap();
        assert_eq!(auth.apikey.as_deref(), Some("key-1"));
        assert!(auth.username.is_none());
        assert!(auth.password.is_none());
        assert!(auth.bearer_token.is_none());

        let empty: AuthYaml = serde_yaml::from_str("{}").unwrap();
        assert!(empty.apikey.is_none());
    }

    #[test]
    fn test_auth_debug_is_redacted() {
        let auth = AuthYaml {
            username: None,
            password: None,
            apikey: Some("very-secret".into()),
            bearer_token: None,
        };
        let debug = format!("{auth:?}");
        assert!(!debug.contains("very-secret"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("stt.yaml");
        fs::write(&config_path, "service_url: \"http://localhost:9000\"\n").unwrap();

        let config = YamlConfig::from_file(&config_path).unwrap();
        assert_eq!(config.service_url.as_deref(), Some("http://localhost:9000"));
    }

    #[test]
    fn test_from_file_not_found() {
        let result = YamlConfig::from_file(Path::new("/nonexistent/stt.yaml"));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_from_file_invalid_yaml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("invalid.yaml");
        fs::write(&config_path, "invalid: yaml: content:").unwrap();

        let result = YamlConfig::from_file(&config_path);
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }
}
