pub mod config;
pub mod core;
pub mod errors;
pub mod utils;

// Re-export commonly used items for convenience
pub use config::{ClientConfig, ConfigError, Credentials};
pub use self::core::*;
pub use errors::{SpeechToTextError, SttResult};
