//! Service endpoint helpers
//!
//! The client is configured with a single HTTP(S) service URL. REST calls
//! append path segments to it; the streaming recognizer derives the matching
//! `ws://` / `wss://` URL from it. This module ensures URLs:
//! - Use an HTTP or HTTPS scheme
//! - Have a host
//! - Can carry path segments

use thiserror::Error;
use url::Url;

/// Errors that can occur while validating or deriving endpoint URLs
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Invalid URL format: {0}")]
    InvalidFormat(#[from] url::ParseError),

    #[error("URL scheme must be http or https, got: {0}")]
    UnsupportedScheme(String),

    #[error("URL must have a host")]
    MissingHost,

    #[error("URL cannot carry path segments: {0}")]
    CannotBeABase(String),
}

/// Parse and validate the configured service URL.
pub fn parse_service_url(raw: &str) -> Result<Url, UrlError> {
    let url = Url::parse(raw.trim())?;

    match url.scheme() {
        "http" | "https" => {}
        other => return Err(UrlError::UnsupportedScheme(other.to_string())),
    }

    if url.host_str().is_none() {
        return Err(UrlError::MissingHost);
    }

    if url.cannot_be_a_base() {
        return Err(UrlError::CannotBeABase(url.to_string()));
    }

    Ok(url)
}

/// Append percent-encoded path segments to a base URL.
///
/// A trailing slash on the base is ignored, so `https://host/api/` and
/// `https://host/api` produce the same result.
pub fn join_segments(base: &Url, segments: &[&str]) -> Result<Url, UrlError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| UrlError::CannotBeABase(base.to_string()))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Derive the WebSocket URL for a service URL (`http` → `ws`, `https` → `wss`).
pub fn websocket_url(service: &Url) -> Result<Url, UrlError> {
    let scheme = match service.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => return Err(UrlError::UnsupportedScheme(other.to_string())),
    };

    // `Url::set_scheme` refuses to switch between special and non-special
    // schemes, so rebuild the URL from its string form.
    let rest = &service.as_str()[service.scheme().len()..];
    Ok(Url::parse(&format!("{scheme}{rest}"))?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_service_url() {
        let url = parse_service_url("https://stream.watsonplatform.net/speech-to-text/api").unwrap();
        assert_eq!(url.host_str(), Some("stream.watsonplatform.net"));

        assert!(matches!(
            parse_service_url("ftp://example.com"),
            Err(UrlError::UnsupportedScheme(s)) if s == "ftp"
        ));
        assert!(matches!(
            parse_service_url("not a url"),
            Err(UrlError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_join_segments() {
        let base = parse_service_url("https://example.com/speech-to-text/api/").unwrap();
        let url = join_segments(&base, &["v1", "customizations", "foo", "words", "bar"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://example.com/speech-to-text/api/v1/customizations/foo/words/bar"
        );

        let root = parse_service_url("http://127.0.0.1:8080").unwrap();
        let url = join_segments(&root, &["v1", "models"]).unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:8080/v1/models");
    }

    #[test]
    fn test_join_segments_encodes() {
        let base = parse_service_url("https://example.com").unwrap();
        let url = join_segments(&base, &["v1", "corpora", "my corpus/1"]).unwrap();
        assert_eq!(url.path(), "/v1/corpora/my%20corpus%2F1");
    }

    #[test]
    fn test_websocket_url() {
        let https = parse_service_url("https://example.com/speech-to-text/api").unwrap();
        assert_eq!(
            websocket_url(&https).unwrap().as_str(),
            "wss://example.com/speech-to-text/api"
        );

        let http = parse_service_url("http://127.0.0.1:9000").unwrap();
        assert_eq!(websocket_url(&http).unwrap().as_str(), "ws://127.0.0.1:9000/");
    }
}
