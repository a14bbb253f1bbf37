pub mod media_type;
pub mod stt;

// Re-export commonly used types for convenience
pub use stt::*;
