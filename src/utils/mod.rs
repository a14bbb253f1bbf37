pub mod tls;
pub mod url;
pub use self::url::{UrlError, join_segments, parse_service_url, websocket_url};
